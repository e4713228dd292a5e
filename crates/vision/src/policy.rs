//! Retry and pacing parameters for calls against the rate-limited service.

use std::time::Duration;

use dermascan_core::error::AnalysisError;

/// Tunable parameters for the linear-backoff strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per image, including the first (at least 1).
    pub max_attempts: u32,
    /// Backoff unit; the wait after attempt `n` is `n * base_delay`.
    pub base_delay: Duration,
    /// Fixed pause between calls for different images of one batch.
    pub inter_call_delay: Duration,
    /// Upper bound on a single attempt.
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            inter_call_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy with no waiting at all, for tests and local tooling.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            inter_call_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Errors that must stop the whole batch immediately.
    pub fn is_fatal(&self, err: &AnalysisError) -> bool {
        err.is_fatal()
    }

    /// Whether another attempt should follow a failed attempt `attempt`.
    pub fn should_retry(&self, err: &AnalysisError, attempt: u32) -> bool {
        !self.is_fatal(err) && err.is_retryable() && attempt < self.max_attempts.max(1)
    }
}
