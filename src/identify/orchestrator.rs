use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{ConfigError, IdentifyError};
use crate::identify::cancel::CancelSignal;
use crate::identify::fallback::FallbackPolicy;
use crate::identify::normalize::normalize;
use crate::identify::{CareAdvisor, PrimaryClassifier, VisionIdentifier};
use crate::image::{ImageHandle, ImageLoader};
use crate::llm::care::CareClient;
use crate::llm::gemini::GeminiClient;
use crate::llm::vision::VisionClient;
use crate::models::{IdentificationOutcome, IdentificationResult, TierScores};
use crate::plantnet::PlantNetClient;
use crate::utils::http::build_http_client;
use crate::utils::timing::RunTimer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    PrimaryAttempted,
    FallbackAttempted,
    CareEnriched,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunState::Idle => "idle",
            RunState::PrimaryAttempted => "primary_attempted",
            RunState::FallbackAttempted => "fallback_attempted",
            RunState::CareEnriched => "care_enriched",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Runs one photo through primary classification, the optional vision
/// fallback and the care lookup. The three calls are strictly sequential.
#[derive(Clone)]
pub struct Orchestrator {
    loader: ImageLoader,
    primary: Arc<dyn PrimaryClassifier>,
    vision: Arc<dyn VisionIdentifier>,
    care: Arc<dyn CareAdvisor>,
    policy: FallbackPolicy,
    tier_scores: TierScores,
    fetch_care: bool,
}

impl Orchestrator {
    pub fn new(
        loader: ImageLoader,
        primary: Arc<dyn PrimaryClassifier>,
        vision: Arc<dyn VisionIdentifier>,
        care: Arc<dyn CareAdvisor>,
    ) -> Self {
        Orchestrator {
            loader,
            primary,
            vision,
            care,
            policy: FallbackPolicy::default(),
            tier_scores: TierScores::default(),
            fetch_care: true,
        }
    }

    /// Wires the Pl@ntNet and Gemini clients from configuration.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let gemini = GeminiClient::new(config.gemini.clone())?;
        let loader = ImageLoader::new(
            build_http_client(config.plantnet.timeout)?,
            config.image_cache_dir.clone(),
        );
        Ok(Orchestrator::new(
            loader,
            Arc::new(PlantNetClient::new(config.plantnet.clone())?),
            Arc::new(VisionClient::new(gemini.clone())),
            Arc::new(CareClient::new(gemini)),
        )
        .with_policy(config.fallback, config.tier_scores))
    }

    pub fn with_policy(mut self, policy: FallbackPolicy, tier_scores: TierScores) -> Self {
        self.policy = policy;
        self.tier_scores = tier_scores;
        self
    }

    pub fn with_care_lookup(mut self, enabled: bool) -> Self {
        self.fetch_care = enabled;
        self
    }

    pub async fn identify(
        &self,
        handle: &ImageHandle,
    ) -> Result<IdentificationOutcome, IdentifyError> {
        self.identify_with_cancel(handle, CancelSignal::never())
            .await
    }

    /// Like [`Orchestrator::identify`], but gives up with
    /// [`IdentifyError::Cancelled`] as soon as `cancel` fires.
    pub async fn identify_with_cancel(
        &self,
        handle: &ImageHandle,
        mut cancel: CancelSignal,
    ) -> Result<IdentificationOutcome, IdentifyError> {
        let mut timer = RunTimer::start(&handle.to_string());
        let outcome = self.run(handle, &mut cancel, &timer).await;
        match &outcome {
            Ok(outcome) => {
                let detail = outcome
                    .result
                    .top()
                    .map(|top| format!("{} ({:.2})", top.scientific_name, top.score))
                    .unwrap_or_else(|| "not identified".to_string());
                timer.complete(RunState::Done, &detail);
            }
            Err(err) => timer.complete(RunState::Failed, &err.to_string()),
        }
        outcome
    }

    async fn run(
        &self,
        handle: &ImageHandle,
        cancel: &mut CancelSignal,
        timer: &RunTimer,
    ) -> Result<IdentificationOutcome, IdentifyError> {
        timer.transition(RunState::Idle);
        let image = guard(cancel, self.loader.load(handle)).await??;

        let primary = match guard(cancel, self.primary.identify(&image)).await? {
            Ok(result) => Some(result),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(run_id = timer.run_id(), "Primary identification failed: {err}");
                None
            }
        };
        timer.transition(RunState::PrimaryAttempted);

        let mut working = primary;
        if self.policy.needs_fallback(working.as_ref()) {
            info!(
                run_id = timer.run_id(),
                threshold = self.policy.threshold(),
                "Primary result insufficient, asking the vision fallback"
            );
            let vision = guard(cancel, self.vision.identify_by_vision(&image)).await?;
            timer.transition(RunState::FallbackAttempted);
            if vision.has_match() {
                working = Some(normalize(&vision, &self.tier_scores));
            }
        }

        let result = working.unwrap_or_else(IdentificationResult::unidentified);

        let care = match result.top() {
            Some(top) if self.fetch_care => {
                guard(cancel, self.care.get_care_info(top.lookup_name())).await?
            }
            _ => None,
        };
        timer.transition(RunState::CareEnriched);

        if cancel.is_cancelled() {
            return Err(IdentifyError::Cancelled);
        }
        timer.transition(RunState::Done);
        Ok(IdentificationOutcome { result, care })
    }
}

/// Runs `future` unless cancellation fires first.
async fn guard<F: Future>(cancel: &mut CancelSignal, future: F) -> Result<F::Output, IdentifyError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(IdentifyError::Cancelled),
        output = future => Ok(output),
    }
}
