use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::error::ConfigError;
use crate::identify::fallback::{FallbackPolicy, DEFAULT_FALLBACK_THRESHOLD};
use crate::models::TierScores;

pub const DEFAULT_PLANTNET_API_URL: &str = "https://my-api.plantnet.org/v2/identify/all";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone)]
pub struct PlantNetConfig {
    pub api_key: String,
    pub api_url: String,
    pub language: String,
    pub max_results: usize,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub timeout: Duration,
    pub reply_language: String,
    pub vision_temperature: f64,
    pub vision_max_output_tokens: u32,
    pub care_temperature: f64,
    pub care_max_output_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub plantnet: PlantNetConfig,
    pub gemini: GeminiConfig,
    pub image_cache_dir: PathBuf,
    pub fallback: FallbackPolicy,
    pub tier_scores: TierScores,
}

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn env_string(lookup: Lookup, name: &str, default: &str) -> String {
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_required(lookup: Lookup, name: &'static str) -> Result<String, ConfigError> {
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingVar(name))
}

fn env_parsed<T: std::str::FromStr + Copy + std::fmt::Display>(
    lookup: Lookup,
    name: &str,
    default: T,
) -> T {
    let Some(raw) = lookup(name) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!("Ignoring unparseable {}='{}', using {}", name, raw, default);
            default
        }
    }
}

fn env_unit_interval(lookup: Lookup, name: &'static str, default: f64) -> Result<f64, ConfigError> {
    let value = env_parsed(lookup, name, default);
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::Invalid {
            name,
            reason: format!("{value} is outside [0, 1]"),
        });
    }
    Ok(value)
}

fn default_cache_dir() -> PathBuf {
    env::temp_dir().join("plant_identifier")
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// Both service credentials are required; a blank key is reported here
    /// instead of turning into an opaque 401 on the first request.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: Lookup) -> Result<Self, ConfigError> {
        let plantnet = PlantNetConfig {
            api_key: env_required(lookup, "PLANTNET_API_KEY")?,
            api_url: env_string(lookup, "PLANTNET_API_URL", DEFAULT_PLANTNET_API_URL),
            language: env_string(lookup, "PLANTNET_LANGUAGE", "es"),
            max_results: env_parsed(lookup, "PLANTNET_MAX_RESULTS", 5usize).max(1),
            timeout: Duration::from_secs(env_parsed(lookup, "PLANTNET_TIMEOUT_SECS", 30u64)),
        };

        let gemini = GeminiConfig {
            api_key: env_required(lookup, "GEMINI_API_KEY")?,
            api_base: env_string(lookup, "GEMINI_API_BASE", DEFAULT_GEMINI_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            model: env_string(lookup, "GEMINI_MODEL", "gemini-2.0-flash"),
            timeout: Duration::from_secs(env_parsed(lookup, "GEMINI_TIMEOUT_SECS", 20u64)),
            reply_language: env_string(lookup, "GEMINI_REPLY_LANGUAGE", "Spanish"),
            vision_temperature: env_parsed(lookup, "GEMINI_VISION_TEMPERATURE", 0.1f64),
            vision_max_output_tokens: env_parsed(lookup, "GEMINI_VISION_MAX_OUTPUT_TOKENS", 500u32),
            care_temperature: env_parsed(lookup, "GEMINI_CARE_TEMPERATURE", 0.3f64),
            care_max_output_tokens: env_parsed(lookup, "GEMINI_CARE_MAX_OUTPUT_TOKENS", 500u32),
        };

        let defaults = TierScores::default();
        let tier_scores = TierScores {
            high: env_unit_interval(lookup, "TIER_SCORE_HIGH", defaults.high)?,
            medium: env_unit_interval(lookup, "TIER_SCORE_MEDIUM", defaults.medium)?,
            low: env_unit_interval(lookup, "TIER_SCORE_LOW", defaults.low)?,
        };

        let image_cache_dir = lookup("IMAGE_CACHE_DIR")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_cache_dir);

        Ok(Config {
            log_level: env_string(lookup, "LOG_LEVEL", "info").to_lowercase(),
            plantnet,
            gemini,
            image_cache_dir,
            fallback: FallbackPolicy::new(env_unit_interval(
                lookup,
                "FALLBACK_SCORE_THRESHOLD",
                DEFAULT_FALLBACK_THRESHOLD,
            )?),
            tier_scores,
        })
    }
}
