// Retry combinator for per-item store calls
use crate::port::StoreError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::application::worker::constants::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY, MAX_RETRY_DELAY,
};

/// Errors that know whether another attempt can help
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for StoreError {
    fn is_retryable(&self) -> bool {
        StoreError::is_retryable(self)
    }
}

/// Final failure of an attempted operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure<E> {
    /// Attempts made, including the failing one
    pub attempts: u32,
    pub error: E,
}

/// Bounded retry policy
///
/// Backoff formula: `delay = base_delay * backoff_factor ^ (attempt - 1)`,
/// capped at `max_delay`. A zero base delay retries immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
            backoff_factor: 2.0,
            max_delay: MAX_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Arguments
    /// * `max_attempts` - Total attempts per operation (at least 1)
    /// * `base_delay` - Delay after the first failure
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Default::default()
        }
    }

    /// Retry without sleeping between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(16) as i32;
        let secs = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::from_secs_f64(secs).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt bound is reached.
    ///
    /// `on_retry` is awaited after each retryable failure that will be
    /// followed by another attempt, with the 1-based number of the failed
    /// attempt. The caller decides what a final failure means for the
    /// surrounding iteration.
    ///
    /// # Example
    /// ```text
    /// let id = policy
    ///     .attempt(|| store.create(&candidate), |n, err| report(n, err.to_string()))
    ///     .await?;
    /// ```
    pub async fn attempt<T, E, Op, Fut, OnRetry, RetryFut>(
        &self,
        mut op: Op,
        mut on_retry: OnRetry,
    ) -> Result<T, AttemptFailure<E>>
    where
        E: Retryable + std::fmt::Display,
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        OnRetry: FnMut(u32, &E) -> RetryFut,
        RetryFut: Future<Output = ()>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    warn!(
                        attempt = attempt,
                        max_attempts = max_attempts,
                        error = %error,
                        "Attempt failed, retrying"
                    );
                    on_retry(attempt, &error).await;

                    let delay = self.delay_for(attempt);
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(error) => {
                    return Err(AttemptFailure {
                        attempts: attempt,
                        error,
                    })
                }
            }
        }
    }
}
