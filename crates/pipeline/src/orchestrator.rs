//! Top-level analysis state machine.
//!
//! ```text
//! Idle -> CheckingEligibility -> Calling(0) -> Calling(1) -> ... -> Aggregating -> Done
//!                 |                   |                               |
//!                 +-------------------+------------> FallingBack <----+
//!                                                        |
//!                                                        +-> Done
//! ```
//!
//! Every route to a fallback report passes through the single
//! `FallingBack` state, which is also the only place a fallback diagnostic
//! is attached. [`AnalysisOrchestrator::run`] consumes the orchestrator and
//! always returns an [`AnalysisOutcome`].

use std::sync::Arc;

use dermascan_core::aggregation::aggregate;
use dermascan_core::credential::{check_credential, CredentialState};
use dermascan_core::error::AnalysisError;
use dermascan_core::fallback::FallbackGenerator;
use dermascan_core::hashing::batch_key;
use dermascan_core::request::{CaptureBatch, ImagePayload, InferenceRequest};
use dermascan_core::schema::AnalysisKind;
use dermascan_core::validation::{validate_response, PartialResult};
use dermascan_vision::caller::RateLimitedCaller;
use dermascan_vision::transport::InferenceTransport;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::cache::ReportCache;
use crate::outcome::{AnalysisOutcome, Diagnostic, DiagnosticKind, ImageFailure};
use crate::progress::{ImageStatus, ProgressReporter};
use crate::settings::AnalysisSettings;

/// States after `Idle`; `Idle` is the freshly built orchestrator.
enum State {
    CheckingEligibility,
    Calling(usize),
    Aggregating,
    FallingBack(Diagnostic),
    Done(Box<AnalysisOutcome>),
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            Self::CheckingEligibility => "checking_eligibility",
            Self::Calling(_) => "calling",
            Self::Aggregating => "aggregating",
            Self::FallingBack(_) => "falling_back",
            Self::Done(_) => "done",
        }
    }
}

/// Result of the eligibility checks.
enum Eligibility {
    Proceed { cache_key: Option<String> },
    Cached(AnalysisOutcome),
    Fallback(Diagnostic),
}

/// Runs one analysis request from eligibility check to final report.
///
/// Not reusable: [`run`](Self::run) takes `self`.
pub struct AnalysisOrchestrator {
    analysis_id: Uuid,
    kind: AnalysisKind,
    transport: Arc<dyn InferenceTransport>,
    settings: AnalysisSettings,
    fallback: FallbackGenerator,
    progress: ProgressReporter,
    cancel: CancellationToken,
    cache: Option<Arc<ReportCache>>,
}

impl AnalysisOrchestrator {
    pub fn new(
        kind: AnalysisKind,
        transport: Arc<dyn InferenceTransport>,
        settings: AnalysisSettings,
    ) -> Self {
        let fallback = FallbackGenerator::new(settings.fallback_jitter);
        Self {
            analysis_id: Uuid::new_v4(),
            kind,
            transport,
            settings,
            fallback,
            progress: ProgressReporter::disabled(),
            cancel: CancellationToken::new(),
            cache: None,
        }
    }

    /// Send per-image progress to `progress`.
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Abort remaining work when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Look up and store real reports in `cache`.
    pub fn with_cache(mut self, cache: Arc<ReportCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replace the fallback generator (e.g. to disable jitter).
    pub fn with_fallback(mut self, fallback: FallbackGenerator) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn analysis_id(&self) -> Uuid {
        self.analysis_id
    }

    /// Analyse `batch`. Never fails; degraded results carry a diagnostic.
    pub async fn run(self, batch: CaptureBatch) -> AnalysisOutcome {
        let span = tracing::info_span!(
            "analysis",
            analysis_id = %self.analysis_id,
            kind = %self.kind,
            images = batch.len(),
        );
        self.execute(batch).instrument(span).await
    }

    async fn execute(self, batch: CaptureBatch) -> AnalysisOutcome {
        let caller = RateLimitedCaller::new(
            Arc::clone(&self.transport),
            self.settings.retry.clone(),
            self.cancel.clone(),
        );
        let images = batch.limited(self.settings.max_batch.max(1));
        let total = images.len();
        if batch.len() > total {
            tracing::info!(captured = batch.len(), analysed = total, "Batch truncated to limit");
        }

        let mut successes: Vec<PartialResult> = Vec::with_capacity(total);
        let mut failures: Vec<ImageFailure> = Vec::new();
        let mut aborted: Option<Diagnostic> = None;
        let mut cache_key: Option<String> = None;
        let mut state = State::CheckingEligibility;

        loop {
            tracing::debug!(state = state.name(), "Orchestrator state");

            state = match state {
                State::CheckingEligibility => match self.check_eligibility(&batch, &caller).await {
                    Eligibility::Proceed { cache_key: key } => {
                        cache_key = key;
                        State::Calling(0)
                    }
                    Eligibility::Cached(outcome) => State::Done(Box::new(outcome)),
                    Eligibility::Fallback(diagnostic) => State::FallingBack(diagnostic),
                },

                State::Calling(index) if index >= total => State::Aggregating,

                State::Calling(index) => {
                    match self.analyse_image(&caller, index, &images[index]).await {
                        Ok(partial) => {
                            tracing::info!(index, "Image analysed");
                            successes.push(partial);
                            self.progress.image(index, total, ImageStatus::Analyzed);
                            State::Calling(index + 1)
                        }
                        Err(err) => {
                            if err != AnalysisError::Cancelled {
                                failures.push(ImageFailure::from_error(index, &err));
                                self.progress.image(index, total, ImageStatus::Skipped);
                            }
                            if err.is_fatal() {
                                aborted = Some(self.abort_diagnostic(&err, index, total));
                                State::Aggregating
                            } else {
                                tracing::warn!(index, error = %err, "Skipping image");
                                State::Calling(index + 1)
                            }
                        }
                    }
                }

                State::Aggregating => match aggregate(&successes) {
                    Some(report) => {
                        let diagnostic = aborted.take().or_else(|| {
                            (!failures.is_empty()).then(|| {
                                Diagnostic::new(
                                    DiagnosticKind::PartialFailure,
                                    format!(
                                        "{} of {total} images could not be analysed; \
                                         report is based on {}",
                                        failures.len(),
                                        successes.len()
                                    ),
                                )
                            })
                        });
                        tracing::info!(
                            sources = report.source_count,
                            confidence = report.confidence,
                            "Aggregated report",
                        );
                        let outcome = AnalysisOutcome {
                            analysis_id: self.analysis_id,
                            report,
                            diagnostic,
                            failures: std::mem::take(&mut failures),
                            cached: false,
                        };
                        if let (Some(cache), Some(key)) = (&self.cache, cache_key.take()) {
                            cache.insert(key, &outcome).await;
                        }
                        State::Done(Box::new(outcome))
                    }
                    None => State::FallingBack(aborted.take().unwrap_or_else(|| {
                        Diagnostic::new(
                            DiagnosticKind::AllCallsFailed,
                            format!("none of the {total} images could be analysed"),
                        )
                    })),
                },

                State::FallingBack(diagnostic) => {
                    tracing::warn!(
                        reason = ?diagnostic.kind,
                        message = %diagnostic.message,
                        "Using fallback report",
                    );
                    State::Done(Box::new(AnalysisOutcome {
                        analysis_id: self.analysis_id,
                        report: self.fallback.generate(self.kind),
                        diagnostic: Some(diagnostic),
                        failures: std::mem::take(&mut failures),
                        cached: false,
                    }))
                }

                State::Done(outcome) => {
                    self.progress.finished(outcome.is_fallback());
                    return *outcome;
                }
            };
        }
    }

    /// Pace, call and validate image `index`.
    async fn analyse_image(
        &self,
        caller: &RateLimitedCaller,
        index: usize,
        image: &ImagePayload,
    ) -> Result<PartialResult, AnalysisError> {
        if index > 0 {
            caller.pace().await?;
        }
        let request = InferenceRequest::new(index, self.kind, image.clone());
        let kind = self.kind;
        caller.call(&request, |raw| validate_response(kind, raw)).await
    }

    async fn check_eligibility(
        &self,
        batch: &CaptureBatch,
        caller: &RateLimitedCaller,
    ) -> Eligibility {
        if self.settings.skip_remote {
            return Eligibility::Fallback(Diagnostic::new(
                DiagnosticKind::SkippedByRequest,
                "remote analysis is disabled",
            ));
        }

        let credential = check_credential(self.settings.api_key.as_deref());
        if !credential.is_usable() {
            let detail = match credential {
                CredentialState::Missing => "no API key configured",
                CredentialState::Placeholder => "API key is a placeholder value",
                _ => "API key is malformed",
            };
            return Eligibility::Fallback(Diagnostic::new(DiagnosticKind::NoCredential, detail));
        }

        if batch.is_empty() {
            return Eligibility::Fallback(Diagnostic::new(
                DiagnosticKind::EmptyBatch,
                "no images were captured",
            ));
        }

        let cache_key = self.cache.as_ref().map(|_| batch_key(self.kind, batch));
        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(mut hit) = cache.get(key).await {
                tracing::info!(cache_key = %key, "Serving cached report");
                hit.analysis_id = self.analysis_id;
                hit.cached = true;
                return Eligibility::Cached(hit);
            }
        }

        if let Err(err) = caller.probe().await {
            let kind = DiagnosticKind::for_fatal(&err).unwrap_or(DiagnosticKind::Unreachable);
            return Eligibility::Fallback(Diagnostic::new(
                kind,
                format!("inference service unavailable: {err}"),
            ));
        }

        Eligibility::Proceed { cache_key }
    }

    fn abort_diagnostic(&self, err: &AnalysisError, index: usize, total: usize) -> Diagnostic {
        let kind = DiagnosticKind::for_fatal(err).unwrap_or(DiagnosticKind::Cancelled);
        tracing::warn!(index, error = %err, "Aborting remaining batch");
        Diagnostic::new(
            kind,
            format!("stopped at image {} of {total}: {err}", index + 1),
        )
    }
}
