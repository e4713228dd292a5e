use serde::{Deserialize, Serialize};

/// Classified failure of a single inference call or of its response.
///
/// The orchestrator never lets one of these escape to its caller; each is
/// converted into a skipped image or a fallback diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Image not analyzable: {0}")]
    NotAnalyzable(String),

    #[error("Analysis cancelled")]
    Cancelled,
}

/// Serializable discriminant of [`AnalysisError`], used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Auth,
    RateLimit,
    Network,
    MalformedResponse,
    Validation,
    NotAnalyzable,
    Cancelled,
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth(_) => ErrorKind::Auth,
            Self::RateLimit(_) => ErrorKind::RateLimit,
            Self::Network(_) => ErrorKind::Network,
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotAnalyzable(_) => ErrorKind::NotAnalyzable,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Fatal errors abort the remaining batch instead of skipping one image.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::RateLimit(_) | Self::Cancelled)
    }

    /// Transient errors that may succeed on another attempt.
    ///
    /// Validation failures and explicit refusals are deterministic for a
    /// given image, so repeating the call would not change the outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::MalformedResponse(_))
    }
}
