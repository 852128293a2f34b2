//! Bounded retry with exponential backoff for transient failures.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::{InsightError, Result};

/// How often, and how patiently, a request is retried.
///
/// [`RetryPolicy::run`] retries errors for which
/// [`InsightError::is_transient`] holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    /// Returns the backoff before retry number `attempt` (zero-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Runs `operation`, retrying transient failures.
    ///
    /// A rate limit carrying a `retry_after` hint waits for that hint (capped
    /// at `max_delay`) instead of the computed backoff.
    ///
    /// # Errors
    /// Returns the first non-transient error, or the last transient error
    /// once retries are exhausted.
    pub async fn run<T, F, Fut>(&self, label: &str, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_when(label, InsightError::is_transient, operation)
            .await
    }

    /// Like [`RetryPolicy::run`], but only errors accepted by `retryable`
    /// are retried.
    ///
    /// Used for requests that are unsafe to resend once the server may have
    /// acted on them.
    ///
    /// # Errors
    /// Returns the first error `retryable` rejects, or the last accepted
    /// error once retries are exhausted.
    pub async fn run_when<T, R, F, Fut>(
        &self,
        label: &str,
        retryable: R,
        mut operation: F,
    ) -> Result<T>
    where
        R: Fn(&InsightError) -> bool,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if retryable(&e) && attempt < self.max_retries => {
                    let delay = match &e {
                        InsightError::RateLimited {
                            retry_after: Some(hint),
                            ..
                        } => (*hint).min(self.max_delay),
                        _ => self.delay_for(attempt),
                    };
                    warn!(
                        request = label,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    /// Two retries, starting at 500ms, never waiting longer than 10s.
    fn default() -> Self {
        Self::new(2, Duration::from_millis(500), Duration::from_secs(10))
    }
}
