//! Retry Mechanism Module
//!
//! Bounded exponential backoff for provider calls, keyed on the failure
//! taxonomy: only reasons in the policy's retryable set are replayed, and
//! the final failure after exhaustion is returned unchanged.

use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::debug;

use crate::cancel::CancelHandle;
use crate::error::{FailureReason, SearchError};

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay before the first replay.
    pub initial_delay: Duration,
    /// Cap applied to the exponential schedule.
    pub max_delay: Duration,
    /// Backoff multiplier per attempt.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub use_jitter: bool,
    /// Maximum jitter fraction (0.0 to 1.0).
    pub jitter_factor: f64,
    /// Failure reasons that are worth replaying.
    pub retry_on: Vec<FailureReason>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            backoff_multiplier: 2.0,
            use_jitter: false,
            jitter_factor: 0.1,
            retry_on: vec![
                FailureReason::NetworkError,
                FailureReason::ApiError,
                FailureReason::RateLimit,
                FailureReason::NoResults,
            ],
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub const fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub const fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    pub fn with_retry_on(mut self, reasons: Vec<FailureReason>) -> Self {
        self.retry_on = reasons;
        self
    }

    /// Check whether an error should be replayed.
    pub fn should_retry(&self, error: &SearchError) -> bool {
        self.retry_on.contains(&error.reason())
    }

    /// Delay for a given zero-based attempt index.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(base_delay as u64).min(self.max_delay);

        if self.use_jitter {
            self.add_jitter(delay)
        } else {
            delay
        }
    }

    fn add_jitter(&self, delay: Duration) -> Duration {
        let mut rng = rand::thread_rng();
        let jitter_range = delay.as_millis() as f64 * self.jitter_factor;
        let jitter = rng.gen_range(-jitter_range..=jitter_range);
        let new_delay = delay.as_millis() as f64 + jitter;
        Duration::from_millis(new_delay.max(0.0) as u64)
    }
}

/// Retry executor that runs an operation under a policy.
pub struct RetryExecutor {
    policy: RetryPolicy,
    cancel: Option<CancelHandle>,
}

impl RetryExecutor {
    pub const fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            cancel: None,
        }
    }

    /// Abort backoff sleeps when the handle is cancelled.
    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Execute `operation` with retries, attributing log lines to
    /// `engine_id`.
    pub async fn execute<F, Fut, T>(
        &self,
        engine_id: &str,
        mut operation: F,
    ) -> Result<T, SearchError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, SearchError>>,
    {
        let mut last_error = None;

        for attempt in 0..self.policy.max_attempts {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if !self.policy.should_retry(&error) {
                        return Err(error);
                    }

                    last_error = Some(error);

                    if attempt == self.policy.max_attempts - 1 {
                        break;
                    }

                    let delay = self.policy.calculate_delay(attempt);
                    debug!(
                        engine = engine_id,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after failure: {}",
                        last_error.as_ref().map(|e| e.to_string()).unwrap_or_default()
                    );
                    if let Some(cancel) = &self.cancel {
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                return Err(SearchError::network(engine_id, "cancelled during retry backoff"));
                            }
                            _ = sleep(delay) => {}
                        }
                    } else {
                        sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            SearchError::Internal("retry executor exhausted without an error".to_string())
        }))
    }
}
