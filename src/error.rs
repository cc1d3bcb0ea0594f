use reqwest::StatusCode;
use thiserror::Error;

/// Failures surfaced by the identification core.
///
/// Only [`IdentifyError::ImageAccess`] and [`IdentifyError::Cancelled`] ever
/// leave the orchestrator. The transport variants are produced by the primary
/// classifier and degrade to "no primary result" one level up.
#[derive(Debug, Error)]
pub enum IdentifyError {
    #[error("Could not read the selected image: {0}")]
    ImageAccess(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid API key: {0}")]
    Auth(String),
    #[error("No species matched the image. Try another photo.")]
    NotFound,
    #[error("Identification service returned {status}: {message}")]
    Service { status: u16, message: String },
    #[error("Identification cancelled")]
    Cancelled,
}

impl IdentifyError {
    pub fn image_access(detail: impl Into<String>) -> Self {
        IdentifyError::ImageAccess(detail.into())
    }

    /// Maps a non-success HTTP status from the classification service.
    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => IdentifyError::Auth(message),
            StatusCode::NOT_FOUND => IdentifyError::NotFound,
            _ => IdentifyError::Service {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Errors that end a run instead of degrading to absent data.
    pub fn is_fatal(&self) -> bool {
        matches!(self, IdentifyError::ImageAccess(_) | IdentifyError::Cancelled)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not configured")]
    MissingVar(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}
