//! Baseline report used whenever no real assessment is available.
//!
//! Values come from fixed per-kind baselines. With jitter enabled every
//! numeric field, and the confidence, is shifted by a uniform integer in
//! `-FALLBACK_JITTER..=FALLBACK_JITTER` and clamped to `0..=100`, so repeated
//! fallbacks in a UI do not look frozen.

use std::collections::BTreeMap;

use chrono::Utc;
use rand::Rng;

use crate::report::{AnalysisReport, ReportSource};
use crate::schema::AnalysisKind;
use crate::types::{clamp_score, Score};

/// Maximum absolute jitter applied to each value.
pub const FALLBACK_JITTER: i64 = 5;

/// Fallback confidence before jitter. With jitter it spans 55..=65, which
/// never coincides with an aggregated confidence (50, 70, 90).
pub const FALLBACK_CONFIDENCE: Score = 60;

/// Static baseline for one [`AnalysisKind`].
pub struct Baseline {
    pub scores: &'static [(&'static str, Score)],
    pub categories: &'static [(&'static str, &'static str)],
    pub concerns: [&'static str; 3],
}

pub static SKIN_BASELINE: Baseline = Baseline {
    scores: &[
        ("hydration", 62),
        ("oiliness", 45),
        ("elasticity", 70),
        ("pigmentation", 35),
        ("pore_visibility", 40),
        ("redness", 25),
        ("wrinkles", 30),
    ],
    categories: &[("skin_type", "Mischhaut"), ("texture", "Glatt")],
    concerns: ["Leichte Trockenheit", "Erweiterte Poren", "Feine Linien"],
};

pub static HAIR_BASELINE: Baseline = Baseline {
    scores: &[
        ("moisture", 58),
        ("shine", 64),
        ("density", 70),
        ("damage", 35),
        ("scalp_health", 72),
        ("split_ends", 30),
        ("elasticity", 66),
    ],
    categories: &[("hair_type", "Wellig"), ("scalp_condition", "Normal")],
    concerns: ["Spliss", "Trockene Spitzen", "Frizz"],
};

pub fn baseline(kind: AnalysisKind) -> &'static Baseline {
    match kind {
        AnalysisKind::Skin => &SKIN_BASELINE,
        AnalysisKind::Hair => &HAIR_BASELINE,
    }
}

/// Builds fallback reports; holds no state besides the jitter switch.
#[derive(Debug, Clone, Copy)]
pub struct FallbackGenerator {
    jitter: bool,
}

impl FallbackGenerator {
    pub fn new(jitter: bool) -> Self {
        Self { jitter }
    }

    /// Report with exact baseline values.
    pub fn exact() -> Self {
        Self::new(false)
    }

    pub fn jitter_enabled(&self) -> bool {
        self.jitter
    }

    /// Generate a report using the thread-local RNG.
    pub fn generate(&self, kind: AnalysisKind) -> AnalysisReport {
        self.generate_with(kind, &mut rand::rng())
    }

    /// Generate a report drawing jitter from `rng`.
    pub fn generate_with<R: Rng>(&self, kind: AnalysisKind, rng: &mut R) -> AnalysisReport {
        let base = baseline(kind);

        let scores: BTreeMap<String, Score> = base
            .scores
            .iter()
            .map(|&(field, value)| (field.to_string(), self.perturb(value, rng)))
            .collect();

        let categories = base
            .categories
            .iter()
            .map(|&(field, value)| (field.to_string(), value.to_string()))
            .collect();

        AnalysisReport {
            kind,
            scores,
            categories,
            concerns: base.concerns.iter().map(|c| c.to_string()).collect(),
            confidence: self.perturb(FALLBACK_CONFIDENCE, rng),
            source_count: 0,
            source: ReportSource::Fallback,
            generated_at: Utc::now(),
        }
    }

    fn perturb<R: Rng>(&self, value: Score, rng: &mut R) -> Score {
        if !self.jitter {
            return value;
        }
        let delta = rng.random_range(-FALLBACK_JITTER..=FALLBACK_JITTER);
        clamp_score(i64::from(value) + delta)
    }
}

impl Default for FallbackGenerator {
    fn default() -> Self {
        Self::new(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
