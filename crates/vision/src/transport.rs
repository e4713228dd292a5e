//! Transport abstraction over the inference service.
//!
//! Production code uses [`crate::http::HttpTransport`]; tests substitute
//! scripted implementations so no network access is needed.

use async_trait::async_trait;
use dermascan_core::error::AnalysisError;
use dermascan_core::request::InferenceRequest;

/// One round-trip to the inference service.
///
/// Implementations classify failures into [`AnalysisError`] variants and
/// perform no retries of their own.
#[async_trait]
pub trait InferenceTransport: Send + Sync {
    /// Send one image and prompt; return the raw text answer.
    async fn analyze(&self, request: &InferenceRequest) -> Result<String, AnalysisError>;

    /// Lightweight reachability check issued once before a batch.
    async fn probe(&self) -> Result<(), AnalysisError>;
}
