//! The value returned by every analysis, successful or degraded.

use std::fmt;

use dermascan_core::error::{AnalysisError, ErrorKind};
use dermascan_core::report::AnalysisReport;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a report is a fallback, or why its confidence is reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Remote analysis was disabled by configuration or by the caller.
    SkippedByRequest,
    /// No usable credential is configured.
    NoCredential,
    /// The batch contained no images.
    EmptyBatch,
    /// The reachability probe failed.
    Unreachable,
    /// The service rejected the credential mid-batch.
    AuthFailed,
    /// The service quota was exhausted mid-batch.
    RateLimited,
    /// The analysis was cancelled before it finished.
    Cancelled,
    /// Every image failed with a non-fatal error.
    AllCallsFailed,
    /// Some images failed; the report is built from the rest.
    PartialFailure,
}

impl DiagnosticKind {
    /// Diagnostic for a batch aborted by a fatal error, if `err` is one.
    pub fn for_fatal(err: &AnalysisError) -> Option<Self> {
        match err {
            AnalysisError::Auth(_) => Some(Self::AuthFailed),
            AnalysisError::RateLimit(_) => Some(Self::RateLimited),
            AnalysisError::Cancelled => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Human-readable explanation attached to a degraded outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// One image that did not contribute to the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFailure {
    /// Zero-based position in the capture batch.
    pub index: usize,
    pub kind: ErrorKind,
    pub message: String,
}

impl ImageFailure {
    pub fn from_error(index: usize, err: &AnalysisError) -> Self {
        Self {
            index,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result of one analysis. Always present; never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    /// Identifier of the invocation, also recorded on its tracing span.
    pub analysis_id: Uuid,
    pub report: AnalysisReport,
    pub diagnostic: Option<Diagnostic>,
    /// Images that were attempted but did not contribute.
    pub failures: Vec<ImageFailure>,
    /// Whether the report was served from the cache.
    #[serde(default)]
    pub cached: bool,
}

impl AnalysisOutcome {
    pub fn is_fallback(&self) -> bool {
        self.report.is_fallback()
    }

    pub fn source_count(&self) -> usize {
        self.report.source_count
    }

    pub fn diagnostic_kind(&self) -> Option<DiagnosticKind> {
        self.diagnostic.as_ref().map(|d| d.kind)
    }
}
