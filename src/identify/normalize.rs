use crate::models::{IdentificationResult, ResultSource, SpeciesCandidate, TierScores, VisionResult};

/// Genus plus species epithet: the first two whitespace-separated tokens.
///
/// This is a heuristic. It does not parse taxonomic authorship, so infraspecific
/// names ("Ficus benjamina var. variegata") lose everything past the epithet.
pub fn binomial(scientific_name: &str) -> String {
    scientific_name
        .split_whitespace()
        .take(2)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Converts the single-candidate, tiered vision reply into the ranked-list
/// shape the primary classifier produces.
pub fn normalize(vision: &VisionResult, scores: &TierScores) -> IdentificationResult {
    let scientific_name = vision.scientific_name.trim().to_string();
    let common_name = vision.common_name.trim();
    let common_names = if common_name.is_empty() {
        Vec::new()
    } else {
        vec![common_name.to_string()]
    };

    let candidate = SpeciesCandidate {
        score: scores.score(vision.confidence_tier),
        scientific_name_without_author: binomial(&scientific_name),
        scientific_name_authorship: String::new(),
        genus: vision.genus.trim().to_string(),
        family: vision.family.trim().to_string(),
        common_names,
        scientific_name: scientific_name.clone(),
    };

    IdentificationResult {
        best_match: scientific_name,
        candidates: vec![candidate],
        source: ResultSource::Fallback {
            description: vision.description.trim().to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConfidenceTier, QUOTA_NOT_APPLICABLE};

    fn vision(scientific_name: &str, common_name: &str, tier: ConfidenceTier) -> VisionResult {
        VisionResult {
            identified: true,
            common_name: common_name.into(),
            scientific_name: scientific_name.into(),
            family: "Moraceae".into(),
            genus: "Ficus".into(),
            confidence_tier: tier,
            description: "A fig with violin-shaped leaves.".into(),
        }
    }

    #[test]
    fn keeps_plain_binomials() {
        let result = normalize(
            &vision("Monstera deliciosa", "Costilla de Adán", ConfidenceTier::High),
            &TierScores::default(),
        );
        assert_eq!(
            result.candidates[0].scientific_name_without_author,
            "Monstera deliciosa"
        );
    }

    #[test]
    fn drops_authorship_tokens() {
        let result = normalize(
            &vision("Ficus lyrata Warb.", "Ficus lira", ConfidenceTier::Medium),
            &TierScores::default(),
        );
        let top = &result.candidates[0];
        assert_eq!(top.scientific_name_without_author, "Ficus lyrata");
        assert_eq!(top.scientific_name, "Ficus lyrata Warb.");
        assert_eq!(result.best_match, "Ficus lyrata Warb.");
    }

    #[test]
    fn maps_every_tier_to_its_fixed_score() {
        let scores = TierScores::default();
        for (tier, expected) in [
            (ConfidenceTier::High, 0.9),
            (ConfidenceTier::Medium, 0.6),
            (ConfidenceTier::Low, 0.3),
        ] {
            let result = normalize(&vision("Ficus lyrata", "", tier), &scores);
            assert_eq!(result.candidates.len(), 1);
            assert_eq!(result.candidates[0].score, expected);
        }
    }

    #[test]
    fn builds_fallback_shape() {
        let result = normalize(
            &vision("Ficus lyrata Warb.", "", ConfidenceTier::Low),
            &TierScores::default(),
        );
        let top = &result.candidates[0];
        assert!(top.common_names.is_empty());
        assert!(top.scientific_name_authorship.is_empty());
        assert_eq!(top.genus, "Ficus");
        assert_eq!(top.family, "Moraceae");
        assert_eq!(result.remaining_quota(), QUOTA_NOT_APPLICABLE);
        assert_eq!(
            result.source,
            ResultSource::Fallback {
                description: "A fig with violin-shaped leaves.".into()
            }
        );
    }

    #[test]
    fn common_name_becomes_single_entry() {
        let result = normalize(
            &vision("Monstera deliciosa", " Monstera ", ConfidenceTier::High),
            &TierScores::default(),
        );
        assert_eq!(result.candidates[0].common_names, vec!["Monstera".to_string()]);
    }

    #[test]
    fn binomial_handles_short_names() {
        assert_eq!(binomial("Ficus"), "Ficus");
        assert_eq!(binomial("  Ficus   lyrata  "), "Ficus lyrata");
        assert_eq!(binomial(""), "");
    }
}
