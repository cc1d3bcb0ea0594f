use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

use crate::llm::gemini::GeminiError;

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[\w+-]*[ \t]*\r?\n?(.*?)\r?\n?```$").expect("valid code fence regex")
});

/// Removes the markdown code fence a model tends to wrap JSON in, with or
/// without a language tag.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    match CODE_FENCE.captures(trimmed).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}

/// Outermost `{ ... }` span, for replies with prose around the object.
fn outer_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Parses a model reply into `T` after stripping conversational wrapping.
pub fn parse_json_reply<T: DeserializeOwned>(text: &str) -> Result<T, GeminiError> {
    let cleaned = strip_code_fences(text);
    if cleaned.is_empty() {
        return Err(GeminiError::EmptyReply);
    }
    match serde_json::from_str::<T>(cleaned) {
        Ok(value) => Ok(value),
        Err(first_err) => outer_object(cleaned)
            .filter(|object| *object != cleaned)
            .and_then(|object| serde_json::from_str::<T>(object).ok())
            .ok_or_else(|| GeminiError::Parse(first_err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CareInfo, ConfidenceTier, VisionResult};

    const REPLY: &str = r#"{
        "identified": true,
        "commonName": "Costilla de Adán",
        "scientificName": "Monstera deliciosa Liebm.",
        "family": "Araceae",
        "genus": "Monstera",
        "confidence": "alta",
        "description": "Trepadora tropical de hojas perforadas."
    }"#;

    #[test]
    fn fenced_and_plain_replies_parse_identically() {
        let plain: VisionResult = parse_json_reply(REPLY).unwrap();
        let tagged: VisionResult = parse_json_reply(&format!("```json\n{REPLY}\n```")).unwrap();
        let bare: VisionResult = parse_json_reply(&format!("```\n{REPLY}\n```\n")).unwrap();
        assert_eq!(plain, tagged);
        assert_eq!(plain, bare);
        assert_eq!(plain.confidence_tier, ConfidenceTier::High);
        assert_eq!(plain.scientific_name, "Monstera deliciosa Liebm.");
    }

    #[test]
    fn tolerates_prose_around_the_object() {
        let reply = format!("Here is the identification:\n{REPLY}\nHope it helps!");
        let parsed: VisionResult = parse_json_reply(&reply).unwrap();
        assert!(parsed.identified);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = parse_json_reply::<CareInfo>("I cannot help with that.").unwrap_err();
        assert!(matches!(err, GeminiError::Parse(_)));
        let err = parse_json_reply::<CareInfo>("```json\n```").unwrap_err();
        assert!(matches!(err, GeminiError::EmptyReply));
    }

    #[test]
    fn strips_single_line_fences() {
        assert_eq!(strip_code_fences("```{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }
}
