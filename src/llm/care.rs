use async_trait::async_trait;
use tracing::{debug, warn};

use crate::identify::CareAdvisor;
use crate::llm::gemini::{text_part, GeminiClient, GeminiError, GenerationConfig};
use crate::llm::reply::parse_json_reply;
use crate::models::CareInfo;

const CARE_PROMPT: &str = r#"Give me care information for the plant "{plant}".

Reply ONLY with valid JSON (no markdown, no ```) using exactly this shape:
{
    "watering": "short description of watering (frequency and amount)",
    "light": "kind of light it needs",
    "temperature": "ideal temperature range in °C",
    "soil": "recommended soil type",
    "toxicity": "whether it is toxic to pets (cats/dogs) or safe",
    "tips": ["tip 1", "tip 2", "tip 3"]
}

Be concise but informative. Reply in {language}."#;

pub fn care_prompt(plant: &str, language: &str) -> String {
    CARE_PROMPT
        .replace("{plant}", plant)
        .replace("{language}", language)
}

#[derive(Debug, Clone)]
pub struct CareClient {
    gemini: GeminiClient,
}

impl CareClient {
    pub fn new(gemini: GeminiClient) -> Self {
        CareClient { gemini }
    }

    pub async fn try_get_care_info(&self, species_name: &str) -> Result<CareInfo, GeminiError> {
        let config = self.gemini.config();
        let generation = GenerationConfig {
            temperature: config.care_temperature,
            max_output_tokens: config.care_max_output_tokens,
        };
        let reply = self
            .gemini
            .generate_text(
                "get_care_info",
                vec![text_part(&care_prompt(species_name, &config.reply_language))],
                generation,
            )
            .await?;
        parse_json_reply(&reply)
    }
}

#[async_trait]
impl CareAdvisor for CareClient {
    /// `None` means "unknown", never "known to be empty".
    async fn get_care_info(&self, species_name: &str) -> Option<CareInfo> {
        let species_name = species_name.trim();
        if species_name.is_empty() {
            return None;
        }
        match self.try_get_care_info(species_name).await {
            Ok(info) => {
                debug!(species = species_name, tips = info.tips.len(), "Fetched care info");
                Some(info)
            }
            Err(err) => {
                warn!("Care info lookup for {species_name} failed: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use axum::{http::StatusCode, Json, Router};
    use serde_json::{json, Value};

    use super::*;
    use crate::test_support::{serve, stalled_service, test_config};

    async fn client_for(app: Router) -> CareClient {
        let base = serve(app).await;
        CareClient::new(GeminiClient::new(test_config("http://unused", &base).gemini).unwrap())
    }

    fn reply(text: &'static str) -> Router {
        Router::new().fallback(move || async move {
            Json(json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] }))
        })
    }

    #[tokio::test]
    async fn parses_fenced_care_reply() {
        let client = client_for(reply(
            "```json\n{\"watering\": \"Weekly\", \"light\": \"Bright indirect\", \"temperature\": \"18-27 °C\", \"soil\": \"Airy aroid mix\", \"toxicity\": \"Toxic to cats and dogs\", \"tips\": [\"Wipe leaves\", \"Add a moss pole\"]}\n```",
        ))
        .await;
        let info = client.get_care_info("Monstera deliciosa").await.unwrap();
        assert_eq!(info.watering, "Weekly");
        assert_eq!(info.tips, vec!["Wipe leaves", "Add a moss pole"]);
    }

    #[tokio::test]
    async fn empty_fields_are_still_some() {
        let client = client_for(reply(
            r#"{"watering": "", "light": "", "temperature": "", "soil": "", "toxicity": "", "tips": []}"#,
        ))
        .await;
        assert_eq!(
            client.get_care_info("Ficus lyrata").await,
            Some(CareInfo::default())
        );
    }

    #[tokio::test]
    async fn non_success_status_is_none() {
        let client =
            client_for(Router::new().fallback(|| async { StatusCode::SERVICE_UNAVAILABLE })).await;
        assert_eq!(client.get_care_info("Ficus lyrata").await, None);
    }

    #[tokio::test]
    async fn empty_text_is_none() {
        let client = client_for(Router::new().fallback(|| async {
            Json(json!({ "candidates": [{ "content": { "parts": [] } }] }))
        }))
        .await;
        assert_eq!(client.get_care_info("Ficus lyrata").await, None);
    }

    #[tokio::test]
    async fn prompt_names_the_species() {
        let seen: Arc<std::sync::Mutex<Option<Value>>> = Arc::default();
        let recorder = seen.clone();
        let client = client_for(Router::new().fallback(move |Json(body): Json<Value>| {
            let recorder = recorder.clone();
            async move {
                *recorder.lock().unwrap() = Some(body);
                Json(json!({ "candidates": [{ "content": { "parts": [{ "text": "{}" }] } }] }))
            }
        }))
        .await;
        assert_eq!(
            client.get_care_info("Ficus lyrata").await,
            Some(CareInfo::default())
        );
        let body = seen.lock().unwrap().clone().unwrap();
        let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("\"Ficus lyrata\""));
        assert_eq!(body["generationConfig"]["temperature"], json!(0.3));
    }

    #[tokio::test]
    async fn blank_name_skips_the_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let client = client_for(Router::new().fallback(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                StatusCode::OK
            }
        }))
        .await;
        assert_eq!(client.get_care_info("   ").await, None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stalled_service_times_out_as_none() {
        let base = serve(stalled_service(Duration::from_secs(30))).await;
        let mut config = test_config("http://unused", &base).gemini;
        config.timeout = Duration::from_millis(300);
        let client = CareClient::new(GeminiClient::new(config).unwrap());

        let started = Instant::now();
        assert_eq!(client.get_care_info("Monstera deliciosa").await, None);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
