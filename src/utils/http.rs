use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::error::ConfigError;

/// Builds a client whose every request is capped at `timeout`.
pub fn build_http_client(timeout: Duration) -> Result<Client, ConfigError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| ConfigError::Invalid {
            name: "HTTP client",
            reason: err.to_string(),
        })
}

pub fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

/// Replaces every occurrence of `secret` in `text`.
pub fn redact(text: &str, secret: &str) -> String {
    let secret = secret.trim();
    if secret.is_empty() {
        return text.to_string();
    }
    text.replace(secret, "[redacted]")
}

/// Pulls a human-readable message out of an error body, plus a bounded
/// summary of the whole body for logs.
pub fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarizes_google_and_plantnet_error_shapes() {
        let (message, _) =
            summarize_error_body(r#"{"error": {"code": 400, "message": "API key not valid"}}"#);
        assert_eq!(message.as_deref(), Some("API key not valid"));

        let (message, _) = summarize_error_body(
            r#"{"statusCode": 404, "error": "Not Found", "message": "Species not found"}"#,
        );
        assert_eq!(message.as_deref(), Some("Species not found"));

        let (message, summary) = summarize_error_body("  ");
        assert!(message.is_none());
        assert_eq!(summary, "empty response body");
    }

    #[test]
    fn redacts_secrets() {
        assert_eq!(
            redact("https://host/path?key=abc123&x=1", "abc123"),
            "https://host/path?key=[redacted]&x=1"
        );
        assert_eq!(redact("nothing to hide", ""), "nothing to hide");
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_for_log("ñandú", 3), "ñan... (truncated)");
        assert_eq!(truncate_for_log("short", 10), "short");
    }
}
