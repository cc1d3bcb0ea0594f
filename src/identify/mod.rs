pub mod cancel;
pub mod fallback;
pub mod normalize;
pub mod orchestrator;

use async_trait::async_trait;

use crate::error::IdentifyError;
use crate::image::LoadedImage;
use crate::models::{CareInfo, IdentificationResult, VisionResult};

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use fallback::{needs_fallback, FallbackPolicy};
pub use normalize::normalize;
pub use orchestrator::{Orchestrator, RunState};

/// The first-tier species classifier.
#[async_trait]
pub trait PrimaryClassifier: Send + Sync {
    async fn identify(&self, image: &LoadedImage) -> Result<IdentificationResult, IdentifyError>;
}

/// The generative fallback. Failures are reported as an unidentified result.
#[async_trait]
pub trait VisionIdentifier: Send + Sync {
    async fn identify_by_vision(&self, image: &LoadedImage) -> VisionResult;
}

#[async_trait]
pub trait CareAdvisor: Send + Sync {
    async fn get_care_info(&self, species_name: &str) -> Option<CareInfo>;
}
