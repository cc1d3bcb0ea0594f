//! Plant identification core: Pl@ntNet first, Gemini vision when the
//! classifier is unsure, then a Gemini care lookup for the winner.

pub mod config;
pub mod error;
pub mod identify;
pub mod image;
pub mod llm;
pub mod models;
pub mod plantnet;
pub mod presentation;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use error::{ConfigError, IdentifyError};
pub use identify::{cancel_pair, CancelHandle, CancelSignal, Orchestrator};
pub use image::ImageHandle;
pub use models::{CareInfo, IdentificationOutcome, IdentificationResult, SpeciesCandidate};
