use serde::{Deserialize, Deserializer, Serialize};

/// One ranked species guess.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesCandidate {
    pub score: f64,
    pub scientific_name: String,
    pub scientific_name_without_author: String,
    pub scientific_name_authorship: String,
    pub genus: String,
    pub family: String,
    pub common_names: Vec<String>,
}

impl SpeciesCandidate {
    pub fn is_identified(&self) -> bool {
        !self.scientific_name.trim().is_empty()
    }

    /// Name used to key the care lookup.
    pub fn lookup_name(&self) -> &str {
        let without_author = self.scientific_name_without_author.trim();
        if without_author.is_empty() {
            self.scientific_name.trim()
        } else {
            without_author
        }
    }
}

/// Where an [`IdentificationResult`] came from. Fields that only make sense
/// for one service live on its variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum ResultSource {
    #[serde(rename_all = "camelCase")]
    Primary { remaining_quota: i64 },
    #[serde(rename_all = "camelCase")]
    Fallback { description: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentificationResult {
    pub best_match: String,
    pub candidates: Vec<SpeciesCandidate>,
    #[serde(flatten)]
    pub source: ResultSource,
}

/// Marker quota for sources that do not report one.
pub const QUOTA_NOT_APPLICABLE: i64 = -1;

impl IdentificationResult {
    /// Builds a primary result, ordering candidates by descending score.
    pub fn primary(
        best_match: String,
        mut candidates: Vec<SpeciesCandidate>,
        remaining_quota: i64,
    ) -> Self {
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        IdentificationResult {
            best_match,
            candidates,
            source: ResultSource::Primary { remaining_quota },
        }
    }

    /// The terminal "nothing identified" result.
    pub fn unidentified() -> Self {
        IdentificationResult {
            best_match: String::new(),
            candidates: Vec::new(),
            source: ResultSource::Fallback {
                description: String::new(),
            },
        }
    }

    pub fn top(&self) -> Option<&SpeciesCandidate> {
        self.candidates.first()
    }

    pub fn remaining_quota(&self) -> i64 {
        match self.source {
            ResultSource::Primary { remaining_quota } => remaining_quota,
            ResultSource::Fallback { .. } => QUOTA_NOT_APPLICABLE,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.source, ResultSource::Fallback { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CareInfo {
    #[serde(default)]
    pub watering: String,
    #[serde(default)]
    pub light: String,
    #[serde(default)]
    pub temperature: String,
    #[serde(default)]
    pub soil: String,
    #[serde(default)]
    pub toxicity: String,
    #[serde(default)]
    pub tips: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    #[default]
    Low,
}

impl ConfidenceTier {
    /// Accepts the English tiers and the Spanish labels the model was
    /// originally prompted with. Anything else is `Low`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "high" | "alta" => ConfidenceTier::High,
            "medium" | "media" => ConfidenceTier::Medium,
            _ => ConfidenceTier::Low,
        }
    }
}

impl<'de> Deserialize<'de> for ConfidenceTier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = Option::<String>::deserialize(deserializer)?;
        Ok(label
            .as_deref()
            .map(ConfidenceTier::from_label)
            .unwrap_or_default())
    }
}

/// Numeric scores assigned to each confidence tier. These are product
/// choices, not calibrated probabilities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierScores {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for TierScores {
    fn default() -> Self {
        TierScores {
            high: 0.9,
            medium: 0.6,
            low: 0.3,
        }
    }
}

impl TierScores {
    pub fn score(&self, tier: ConfidenceTier) -> f64 {
        match tier {
            ConfidenceTier::High => self.high,
            ConfidenceTier::Medium => self.medium,
            ConfidenceTier::Low => self.low,
        }
    }
}

/// Parsed reply of the vision fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", from = "VisionReply")]
pub struct VisionResult {
    pub identified: bool,
    pub common_name: String,
    pub scientific_name: String,
    pub family: String,
    pub genus: String,
    pub confidence_tier: ConfidenceTier,
    pub description: String,
}

/// Wire shape of the vision reply. Models name the tier either
/// `confidenceTier` or `confidence`, sometimes both.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisionReply {
    #[serde(default)]
    identified: bool,
    #[serde(default)]
    common_name: String,
    #[serde(default)]
    scientific_name: String,
    #[serde(default)]
    family: String,
    #[serde(default)]
    genus: String,
    #[serde(default)]
    confidence_tier: Option<ConfidenceTier>,
    #[serde(default)]
    confidence: Option<ConfidenceTier>,
    #[serde(default)]
    description: String,
}

impl From<VisionReply> for VisionResult {
    fn from(reply: VisionReply) -> Self {
        VisionResult {
            identified: reply.identified,
            common_name: reply.common_name,
            scientific_name: reply.scientific_name,
            family: reply.family,
            genus: reply.genus,
            confidence_tier: reply
                .confidence_tier
                .or(reply.confidence)
                .unwrap_or_default(),
            description: reply.description,
        }
    }
}

impl VisionResult {
    pub fn unidentified() -> Self {
        VisionResult::default()
    }

    /// `identified` alone is not enough: a match needs a scientific name.
    pub fn has_match(&self) -> bool {
        self.identified && !self.scientific_name.trim().is_empty()
    }
}

/// What the core hands back to the caller for one photo.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentificationOutcome {
    pub result: IdentificationResult,
    pub care: Option<CareInfo>,
}

impl IdentificationOutcome {
    pub fn is_identified(&self) -> bool {
        self.result.top().is_some_and(SpeciesCandidate::is_identified)
    }
}
