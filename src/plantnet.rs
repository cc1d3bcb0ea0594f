use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::PlantNetConfig;
use crate::error::{ConfigError, IdentifyError};
use crate::identify::PrimaryClassifier;
use crate::image::LoadedImage;
use crate::models::{IdentificationResult, SpeciesCandidate, QUOTA_NOT_APPLICABLE};
use crate::utils::http::{build_http_client, redact, summarize_error_body};
use crate::utils::timing::log_call_timing;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlantNetResponse {
    #[serde(default)]
    best_match: String,
    #[serde(default)]
    results: Vec<PlantNetMatch>,
    remaining_identification_requests: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PlantNetMatch {
    #[serde(default)]
    score: f64,
    species: PlantNetSpecies,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlantNetSpecies {
    #[serde(default)]
    scientific_name: String,
    #[serde(default)]
    scientific_name_without_author: String,
    #[serde(default)]
    scientific_name_authorship: String,
    #[serde(default)]
    genus: PlantNetTaxon,
    #[serde(default)]
    family: PlantNetTaxon,
    #[serde(default)]
    common_names: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PlantNetTaxon {
    #[serde(default)]
    scientific_name: String,
}

impl From<PlantNetMatch> for SpeciesCandidate {
    fn from(item: PlantNetMatch) -> Self {
        let species = item.species;
        SpeciesCandidate {
            score: item.score.clamp(0.0, 1.0),
            scientific_name: species.scientific_name,
            scientific_name_without_author: species.scientific_name_without_author,
            scientific_name_authorship: species.scientific_name_authorship,
            genus: species.genus.scientific_name,
            family: species.family.scientific_name,
            common_names: species.common_names,
        }
    }
}

impl From<PlantNetResponse> for IdentificationResult {
    fn from(response: PlantNetResponse) -> Self {
        IdentificationResult::primary(
            response.best_match,
            response.results.into_iter().map(SpeciesCandidate::from).collect(),
            response
                .remaining_identification_requests
                .unwrap_or(QUOTA_NOT_APPLICABLE),
        )
    }
}

/// Client for the Pl@ntNet multi-species identification endpoint.
#[derive(Debug, Clone)]
pub struct PlantNetClient {
    http: Client,
    config: PlantNetConfig,
}

impl PlantNetClient {
    pub fn new(config: PlantNetConfig) -> Result<Self, ConfigError> {
        if config.api_key.trim().is_empty() {
            return Err(ConfigError::MissingVar("PLANTNET_API_KEY"));
        }
        let http = build_http_client(config.timeout)?;
        Ok(PlantNetClient { http, config })
    }

    fn redact(&self, text: &str) -> String {
        redact(text, &self.config.api_key)
    }

    fn build_form(image: &LoadedImage) -> Result<Form, IdentifyError> {
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime_type)
            .map_err(|err| {
                IdentifyError::image_access(format!("bad MIME type {}: {err}", image.mime_type))
            })?;
        Ok(Form::new().part("images", part).text("organs", "auto"))
    }

    async fn send(&self, image: &LoadedImage) -> Result<IdentificationResult, IdentifyError> {
        let max_results = self.config.max_results.to_string();
        let response = self
            .http
            .post(&self.config.api_url)
            .query(&[
                ("api-key", self.config.api_key.as_str()),
                ("lang", self.config.language.as_str()),
                ("nb-results", max_results.as_str()),
            ])
            .multipart(Self::build_form(image)?)
            .send()
            .await
            .map_err(|err| {
                let err_text = self.redact(&err.to_string());
                warn!(
                    "Pl@ntNet request failed to send: {} (timeout={}, connect={})",
                    err_text,
                    err.is_timeout(),
                    err.is_connect()
                );
                IdentifyError::Network(err_text)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            warn!("Pl@ntNet API error: status={}, body={}", status, body_summary);
            return Err(IdentifyError::from_status(
                status,
                self.redact(&message.unwrap_or(body_summary)),
            ));
        }

        let payload = response.json::<PlantNetResponse>().await.map_err(|err| {
            IdentifyError::Service {
                status: status.as_u16(),
                message: format!("invalid response body: {}", self.redact(&err.to_string())),
            }
        })?;
        Ok(payload.into())
    }
}

#[async_trait]
impl PrimaryClassifier for PlantNetClient {
    async fn identify(&self, image: &LoadedImage) -> Result<IdentificationResult, IdentifyError> {
        let result = log_call_timing("plantnet", "identify/all", "identify", || {
            self.send(image)
        })
        .await?;
        info!(
            best_match = %result.best_match,
            candidates = result.candidates.len(),
            top_score = result.top().map(|top| top.score).unwrap_or_default(),
            remaining_quota = result.remaining_quota(),
            "Pl@ntNet identification finished"
        );
        Ok(result)
    }
}
