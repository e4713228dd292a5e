//! Multi-image analysis orchestration.
//!
//! [`engine::AnalysisEngine`] creates one [`orchestrator::AnalysisOrchestrator`]
//! per request. The orchestrator checks eligibility, calls the inference
//! service image by image through the rate-limited caller, validates and
//! aggregates the answers, and falls back to a baseline report when no real
//! answer is available. Its result is always an [`outcome::AnalysisOutcome`].

pub mod cache;
pub mod engine;
pub mod orchestrator;
pub mod outcome;
pub mod progress;
pub mod settings;
