use async_trait::async_trait;
use tracing::{info, warn};

use crate::identify::VisionIdentifier;
use crate::image::LoadedImage;
use crate::llm::gemini::{inline_image_part, text_part, GeminiClient, GeminiError, GenerationConfig};
use crate::llm::reply::parse_json_reply;
use crate::models::VisionResult;

const VISION_PROMPT: &str = r#"Analyze this image and identify the plant in it.

Reply ONLY with valid JSON (no markdown, no ```) using exactly this shape:
{
    "identified": true/false,
    "commonName": "common name in {language}",
    "scientificName": "full scientific name",
    "family": "botanical family",
    "genus": "genus",
    "confidenceTier": "high/medium/low",
    "description": "short description of the plant in {language} (1-2 sentences)"
}

If you cannot identify the plant or the image does not clearly show a plant, reply with:
{"identified": false, "commonName": "", "scientificName": "", "family": "", "genus": "", "confidenceTier": "low", "description": ""}"#;

pub fn vision_prompt(language: &str) -> String {
    VISION_PROMPT.replace("{language}", language)
}

/// Second-opinion identification through the generative vision model.
#[derive(Debug, Clone)]
pub struct VisionClient {
    gemini: GeminiClient,
}

impl VisionClient {
    pub fn new(gemini: GeminiClient) -> Self {
        VisionClient { gemini }
    }

    pub async fn try_identify(&self, image: &LoadedImage) -> Result<VisionResult, GeminiError> {
        let config = self.gemini.config();
        let parts = vec![
            text_part(&vision_prompt(&config.reply_language)),
            inline_image_part(&image.mime_type, &image.bytes),
        ];
        let generation = GenerationConfig {
            temperature: config.vision_temperature,
            max_output_tokens: config.vision_max_output_tokens,
        };
        let reply = self
            .gemini
            .generate_text("identify_by_vision", parts, generation)
            .await?;
        parse_json_reply(&reply)
    }
}

#[async_trait]
impl VisionIdentifier for VisionClient {
    /// Any failure comes back as an unidentified result.
    async fn identify_by_vision(&self, image: &LoadedImage) -> VisionResult {
        match self.try_identify(image).await {
            Ok(result) => {
                info!(
                    identified = result.identified,
                    scientific_name = %result.scientific_name,
                    tier = ?result.confidence_tier,
                    "Vision fallback replied"
                );
                result
            }
            Err(err) => {
                warn!("Vision fallback failed, treating as unidentified: {err}");
                VisionResult::unidentified()
            }
        }
    }
}
