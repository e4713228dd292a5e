//! The consolidated report handed back to consumers.
//!
//! Aggregated and fallback reports share one shape; [`ReportSource`] and
//! `source_count` tell them apart.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::AnalysisKind;
use crate::types::{Score, Timestamp};

/// Where a report's numbers came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSource {
    /// Merged from one or more validated service responses.
    Aggregated,
    /// Generated from static baselines without any service call.
    Fallback,
}

/// One consolidated skin or hair assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub kind: AnalysisKind,
    pub scores: BTreeMap<String, Score>,
    pub categories: BTreeMap<String, String>,
    /// Always exactly [`REPORT_CONCERN_COUNT`] entries.
    pub concerns: Vec<String>,
    /// 0..=100.
    pub confidence: Score,
    /// Number of contributing images; 0 for fallback reports.
    pub source_count: usize,
    pub source: ReportSource,
    pub generated_at: Timestamp,
}

/// Number of concerns surfaced in every report.
pub const REPORT_CONCERN_COUNT: usize = 3;

/// Filler used when fewer distinct concerns were reported.
pub const CONCERN_PLACEHOLDER: &str = "Keine weiteren Auffälligkeiten";

impl AnalysisReport {
    pub fn is_fallback(&self) -> bool {
        self.source == ReportSource::Fallback
    }

    /// Convenience accessor for a named score.
    pub fn score(&self, field: &str) -> Option<Score> {
        self.scores.get(field).copied()
    }

    /// Convenience accessor for a named categorical value.
    pub fn category(&self, field: &str) -> Option<&str> {
        self.categories.get(field).map(String::as_str)
    }
}
