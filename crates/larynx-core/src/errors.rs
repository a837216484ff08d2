use std::path::PathBuf;

use crate::health::HealthDetail;

/// Per-request failures surfaced by the generation endpoint.
#[derive(Clone, Debug, thiserror::Error)]
pub enum GenerationError {
    /// No usable strategy is ready. Never retried.
    #[error("Model not initialized or not available ({0})")]
    BackendUnavailable(HealthDetail),
    /// The strategy raised during generation.
    #[error("Generation failed: {0}")]
    GenerationFailure(String),
    /// Rejected at the request boundary before any strategy ran.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl GenerationError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::BackendUnavailable(_) => "backend_unavailable",
            Self::GenerationFailure(_) => "generation_failure",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }

    /// HTTP status code equivalent.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BackendUnavailable(_) => 503,
            Self::GenerationFailure(_) => 500,
            Self::InvalidRequest(_) => 400,
        }
    }
}

/// Startup-time failure to bring a backend up.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("inference engine not compiled into this build")]
    BackendMissing,
    #[error("model weights not found at {}", .0.display())]
    WeightsMissing(PathBuf),
    #[error("tokenizer not found at {}", .0.display())]
    TokenizerMissing(PathBuf),
    #[error("failed to load model: {0}")]
    LoadFailed(String),
}

impl LoadError {
    /// Health detail reported while the service stays up without this backend.
    pub fn detail(&self) -> HealthDetail {
        match self {
            Self::BackendMissing => HealthDetail::BackendMissing,
            Self::WeightsMissing(_) | Self::TokenizerMissing(_) => HealthDetail::WeightsMissing,
            Self::LoadFailed(_) => HealthDetail::LoadFailed,
        }
    }
}
