use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::GeminiConfig;
use crate::error::ConfigError;
use crate::utils::http::{build_http_client, redact, summarize_error_body, truncate_for_log};
use crate::utils::timing::log_call_timing;

/// Failures inside the generative clients. These never cross the client
/// boundary; the vision and care clients turn them into absent data.
#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    #[error("Gemini request failed: {0}")]
    Transport(String),
    #[error("Gemini request failed with status {status}: {detail}")]
    Status { status: StatusCode, detail: String },
    #[error("Invalid Gemini response: {0}")]
    Decode(String),
    #[error("Gemini returned an empty reply")]
    EmptyReply,
    #[error("Gemini reply is not the expected JSON: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationConfig {
    pub temperature: f64,
    pub max_output_tokens: u32,
}

pub fn text_part(text: &str) -> Value {
    json!({ "text": text })
}

pub fn inline_image_part(mime_type: &str, bytes: &[u8]) -> Value {
    json!({
        "inlineData": {
            "mimeType": mime_type,
            "data": general_purpose::STANDARD.encode(bytes)
        }
    })
}

fn summarize_parts(parts: &[Value]) -> Vec<Value> {
    parts
        .iter()
        .map(|part| {
            if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
                json!({ "text": truncate_for_log(text, 200) })
            } else if let Some(inline_data) = part.get("inlineData") {
                let mime_type = inline_data
                    .get("mimeType")
                    .and_then(|value| value.as_str())
                    .unwrap_or("unknown");
                let data_len = inline_data
                    .get("data")
                    .and_then(|value| value.as_str())
                    .map(|value| value.len())
                    .unwrap_or(0);
                json!({ "inlineData": { "mimeType": mime_type, "dataLen": data_len } })
            } else {
                json!({ "unknownPart": true })
            }
        })
        .collect()
}

fn summarize_payload(payload: &Value) -> Value {
    let mut summary = Map::new();

    if let Some(contents) = payload.get("contents").and_then(|value| value.as_array()) {
        let summarized: Vec<Value> = contents
            .iter()
            .map(|content| {
                let parts = content
                    .get("parts")
                    .and_then(|value| value.as_array())
                    .map(|parts| summarize_parts(parts))
                    .unwrap_or_default();
                json!({ "parts": parts })
            })
            .collect();
        summary.insert("contents".to_string(), Value::Array(summarized));
    }

    if let Some(config) = payload.get("generationConfig") {
        summary.insert("generationConfig".to_string(), config.clone());
    }

    Value::Object(summary)
}

/// Text of the first candidate; multiple text parts are joined by newlines.
fn extract_text(response: GeminiResponse) -> Option<String> {
    let parts = response
        .candidates?
        .into_iter()
        .next()?
        .content?
        .parts?;
    let text = parts
        .into_iter()
        .filter_map(|part| part.text)
        .filter(|text| !text.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Thin client for the `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, ConfigError> {
        if config.api_key.trim().is_empty() {
            return Err(ConfigError::MissingVar("GEMINI_API_KEY"));
        }
        let http = build_http_client(config.timeout)?;
        Ok(GeminiClient { http, config })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_base, self.config.model
        )
    }

    fn redact(&self, text: &str) -> String {
        redact(text, &self.config.api_key)
    }

    /// Sends one user turn and returns the reply text.
    pub async fn generate_text(
        &self,
        operation: &str,
        parts: Vec<Value>,
        generation: GenerationConfig,
    ) -> Result<String, GeminiError> {
        let payload = json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "temperature": generation.temperature,
                "maxOutputTokens": generation.max_output_tokens,
            },
        });

        log_call_timing("gemini", &self.config.model, operation, || async {
            let response = self.call_api(&payload).await?;
            extract_text(response).ok_or(GeminiError::EmptyReply)
        })
        .await
    }

    async fn call_api(&self, payload: &Value) -> Result<GeminiResponse, GeminiError> {
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(target: "llm.gemini", model = %self.config.model, payload = %summarize_payload(payload));
        }

        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(payload)
            .send()
            .await
            .map_err(|err| {
                let err_text = self.redact(&err.to_string());
                warn!(
                    "Gemini request failed to send: {} (timeout={}, connect={})",
                    err_text,
                    err.is_timeout(),
                    err.is_connect()
                );
                GeminiError::Transport(err_text)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            warn!("Gemini API error: status={}, body={}", status, body_summary);
            return Err(GeminiError::Status {
                status,
                detail: self.redact(&message.unwrap_or(body_summary)),
            });
        }

        response
            .json::<GeminiResponse>()
            .await
            .map_err(|err| GeminiError::Decode(self.redact(&err.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{http::StatusCode as AxumStatus, http::Uri, Json, Router};

    use super::*;
    use crate::test_support::{serve, test_config};

    fn generation() -> GenerationConfig {
        GenerationConfig {
            temperature: 0.1,
            max_output_tokens: 500,
        }
    }

    #[test]
    fn extracts_first_candidate_text() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [
                { "content": { "parts": [{ "text": "first" }, { "text": "second" }] } },
                { "content": { "parts": [{ "text": "other candidate" }] } }
            ]
        }))
        .unwrap();
        assert_eq!(extract_text(response).as_deref(), Some("first\nsecond"));

        let empty: GeminiResponse = serde_json::from_value(json!({ "candidates": [] })).unwrap();
        assert!(extract_text(empty).is_none());
    }

    #[test]
    fn payload_summary_hides_image_bytes() {
        let payload = json!({
            "contents": [{ "parts": [text_part("hi"), inline_image_part("image/jpeg", b"abc")] }]
        });
        let summary = summarize_payload(&payload);
        assert_eq!(summary["contents"][0]["parts"][1]["inlineData"]["dataLen"], 4);
        assert!(summary.to_string().find("YWJj").is_none());
    }

    #[test]
    fn rejects_blank_key() {
        let mut config = test_config("http://unused", "http://unused").gemini;
        config.api_key = " ".into();
        assert!(matches!(
            GeminiClient::new(config),
            Err(ConfigError::MissingVar("GEMINI_API_KEY"))
        ));
    }

    #[tokio::test]
    async fn posts_parts_and_returns_reply_text() {
        let seen: Arc<Mutex<Vec<(String, Value)>>> = Arc::default();
        let recorder = seen.clone();
        let app = Router::new().fallback(move |uri: Uri, Json(body): Json<Value>| {
            let recorder = recorder.clone();
            async move {
                recorder.lock().unwrap().push((uri.to_string(), body));
                Json(json!({
                    "candidates": [{ "content": { "parts": [{ "text": "{\"ok\": true}" }] } }]
                }))
            }
        });
        let base = serve(app).await;
        let client = GeminiClient::new(test_config("http://unused", &base).gemini).unwrap();

        let text = client
            .generate_text("test", vec![text_part("hello")], generation())
            .await
            .unwrap();
        assert_eq!(text, "{\"ok\": true}");

        let seen = seen.lock().unwrap();
        let (uri, body) = &seen[0];
        assert!(uri.starts_with("/v1beta/models/gemini-2.0-flash:generateContent"));
        assert!(uri.contains("key=gm-key"));
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 500);
    }

    #[tokio::test]
    async fn non_success_status_is_an_error_with_redacted_detail() {
        let app = Router::new().fallback(|| async {
            (
                AxumStatus::FORBIDDEN,
                Json(json!({ "error": { "message": "key gm-key is disabled" } })),
            )
        });
        let base = serve(app).await;
        let client = GeminiClient::new(test_config("http://unused", &base).gemini).unwrap();

        match client
            .generate_text("test", vec![text_part("hello")], generation())
            .await
        {
            Err(GeminiError::Status { status, detail }) => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(detail, "key [redacted] is disabled");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_reply_is_empty() {
        let app = Router::new().fallback(|| async {
            Json(json!({ "candidates": [{ "content": { "parts": [{ "text": "  " }] } }] }))
        });
        let base = serve(app).await;
        let client = GeminiClient::new(test_config("http://unused", &base).gemini).unwrap();
        let err = client
            .generate_text("test", vec![text_part("hello")], generation())
            .await
            .unwrap_err();
        assert!(matches!(err, GeminiError::EmptyReply));
    }
}
