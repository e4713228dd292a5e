//! Sequential, rate-limit-aware calls against the inference service.
//!
//! [`RateLimitedCaller`] wraps an [`InferenceTransport`] with the
//! [`RetryPolicy`]: every attempt is bounded by a timeout, transient
//! failures are retried with linear backoff, and fatal failures (auth,
//! rate limit) are returned at once so the orchestrator can stop the batch.
//! Every wait observes the [`CancellationToken`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dermascan_core::error::AnalysisError;
use dermascan_core::request::InferenceRequest;
use tokio_util::sync::CancellationToken;

use crate::policy::RetryPolicy;
use crate::transport::InferenceTransport;

/// Issues one inference request at a time according to a [`RetryPolicy`].
///
/// Holds no state between calls; one caller is created per analysis.
pub struct RateLimitedCaller {
    transport: Arc<dyn InferenceTransport>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl RateLimitedCaller {
    pub fn new(
        transport: Arc<dyn InferenceTransport>,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            policy,
            cancel,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `request` and return the raw response text.
    pub async fn call_raw(&self, request: &InferenceRequest) -> Result<String, AnalysisError> {
        self.call(request, |raw| Ok(raw.to_string())).await
    }

    /// Send `request` and convert the response with `accept`.
    ///
    /// Errors returned by `accept` take part in the retry decision just like
    /// transport errors, so a malformed answer is retried while a
    /// validation failure is not.
    pub async fn call<T, F>(
        &self,
        request: &InferenceRequest,
        accept: F,
    ) -> Result<T, AnalysisError>
    where
        F: Fn(&str) -> Result<T, AnalysisError>,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let result = self
                .attempt(request)
                .await
                .and_then(|raw| accept(&raw));

            let err = match result {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(
                            index = request.index(),
                            attempt,
                            "Inference call succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !self.policy.should_retry(&err, attempt) {
                if self.policy.is_fatal(&err) {
                    tracing::warn!(
                        index = request.index(),
                        attempt,
                        error = %err,
                        "Fatal inference failure"
                    );
                } else {
                    tracing::warn!(
                        index = request.index(),
                        attempt,
                        error = %err,
                        "Inference call failed"
                    );
                }
                return Err(err);
            }

            let delay = self.policy.backoff(attempt);
            tracing::warn!(
                index = request.index(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Inference attempt {attempt} failed, retrying",
            );
            self.sleep(delay).await?;
        }
    }

    /// Run the reachability probe under the request timeout.
    pub async fn probe(&self) -> Result<(), AnalysisError> {
        self.bounded(self.transport.probe()).await
    }

    /// Wait out the fixed gap between calls for different images.
    pub async fn pace(&self) -> Result<(), AnalysisError> {
        self.sleep(self.policy.inter_call_delay).await
    }

    // ---- private helpers ----

    async fn attempt(&self, request: &InferenceRequest) -> Result<String, AnalysisError> {
        self.bounded(self.transport.analyze(request)).await
    }

    /// Apply the request timeout and cancellation to one transport future.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, AnalysisError>>,
    ) -> Result<T, AnalysisError> {
        let timeout = self.policy.request_timeout;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AnalysisError::Cancelled),
            result = tokio::time::timeout(timeout, fut) => match result {
                Ok(inner) => inner,
                Err(_) => Err(AnalysisError::Network(format!(
                    "request timed out after {} ms",
                    timeout.as_millis()
                ))),
            },
        }
    }

    async fn sleep(&self, delay: Duration) -> Result<(), AnalysisError> {
        if self.cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        if delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AnalysisError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
