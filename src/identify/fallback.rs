use crate::models::IdentificationResult;

/// Top-candidate score below which the primary result is not trusted.
pub const DEFAULT_FALLBACK_THRESHOLD: f64 = 0.4;

/// Decides whether the vision fallback should run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackPolicy {
    threshold: f64,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        FallbackPolicy {
            threshold: DEFAULT_FALLBACK_THRESHOLD,
        }
    }
}

impl FallbackPolicy {
    pub fn new(threshold: f64) -> Self {
        FallbackPolicy { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// `None` stands for "the primary call failed". A top score equal to the
    /// threshold is sufficient.
    pub fn needs_fallback(&self, result: Option<&IdentificationResult>) -> bool {
        match result.and_then(IdentificationResult::top) {
            None => true,
            Some(top) => top.score < self.threshold,
        }
    }
}

/// [`FallbackPolicy::needs_fallback`] with the default threshold.
pub fn needs_fallback(result: Option<&IdentificationResult>) -> bool {
    FallbackPolicy::default().needs_fallback(result)
}
