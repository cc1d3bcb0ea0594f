//! Display helpers for whatever renders an [`IdentificationOutcome`].
//!
//! [`IdentificationOutcome`]: crate::models::IdentificationOutcome

use serde::Serialize;

use crate::models::SpeciesCandidate;

/// Whole-number percentage shown next to a candidate.
pub fn confidence_percent(score: f64) -> u8 {
    if !score.is_finite() {
        return 0;
    }
    (score.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// First common name, else the binomial, else the full scientific name.
pub fn display_name(candidate: &SpeciesCandidate) -> &str {
    candidate
        .common_names
        .iter()
        .map(|name| name.trim())
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| candidate.lookup_name())
}

/// Guidance shown instead of an error when nothing was identified.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PhotoTips {
    pub title: &'static str,
    pub good_practices: &'static [&'static str],
    pub avoid: &'static [&'static str],
    pub hint: &'static str,
}

pub const PHOTO_TIPS: PhotoTips = PhotoTips {
    title: "We couldn't identify the plant",
    good_practices: &[
        "Get close to the leaves or flowers",
        "Use good natural light",
        "Hold the camera steady",
        "Show distinctive details",
    ],
    avoid: &[
        "Photos taken from far away",
        "Blurry or shaky images",
        "Several plants in the same photo",
        "Poor lighting",
    ],
    hint: "The best photo shows a single plant with visible, well-lit leaves or flowers",
};

impl PhotoTips {
    pub fn render(&self) -> String {
        let mut out = format!("{}\n\nDo:\n", self.title);
        for tip in self.good_practices {
            out.push_str(&format!("  - {tip}\n"));
        }
        out.push_str("\nAvoid:\n");
        for tip in self.avoid {
            out.push_str(&format!("  - {tip}\n"));
        }
        out.push_str(&format!("\n{}\n", self.hint));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentages_round_and_clamp() {
        assert_eq!(confidence_percent(0.854), 85);
        assert_eq!(confidence_percent(0.856), 86);
        assert_eq!(confidence_percent(1.7), 100);
        assert_eq!(confidence_percent(-0.2), 0);
        assert_eq!(confidence_percent(f64::NAN), 0);
    }

    #[test]
    fn display_name_prefers_common_names() {
        let mut candidate = SpeciesCandidate {
            scientific_name: "Ficus lyrata Warb.".into(),
            scientific_name_without_author: "Ficus lyrata".into(),
            common_names: vec![" ".into(), "Fiddle-leaf fig".into()],
            ..Default::default()
        };
        assert_eq!(display_name(&candidate), "Fiddle-leaf fig");
        candidate.common_names.clear();
        assert_eq!(display_name(&candidate), "Ficus lyrata");
        candidate.scientific_name_without_author.clear();
        assert_eq!(display_name(&candidate), "Ficus lyrata Warb.");
    }

    #[test]
    fn tips_render_both_lists() {
        let text = PHOTO_TIPS.render();
        assert!(text.contains("Hold the camera steady"));
        assert!(text.contains("Poor lighting"));
    }
}
