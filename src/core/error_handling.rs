// Retry mechanism with exponential backoff and failure classification

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, warn};

/// How a failed remote call should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Timeout, refused or reset connection
    Transport,
    /// Venue overloaded or briefly unavailable (429, 5xx)
    Transient,
    /// The venue rejected the request itself (400/401/403/404)
    ClientRequest,
    /// The call went through but the answer was unusable
    Application,
}

impl ErrorClass {
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorClass::Transport | ErrorClass::Transient)
    }
}

/// Errors a `RetryPolicy` can drive
pub trait RetryableError: Display + Sized {
    fn class(&self) -> ErrorClass;

    /// Wrap the last failure once the attempt budget is spent
    fn exhausted(operation: &str, attempts: u32, last: Self) -> Self;
}

/// Exponential backoff: the wait after attempt `k` (0-indexed) is `backoff_base * 2^k`
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            max_retries,
            backoff_base,
        }
    }

    /// A policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget runs out.
    pub async fn execute<F, Fut, T, E>(&self, operation_name: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 0;

        loop {
            let err = match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => err,
            };

            let class = err.class();
            if !class.is_retryable() {
                error!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    ?class,
                    "❌ {} failed, not retrying: {}",
                    operation_name,
                    err
                );
                return Err(err);
            }

            if attempt + 1 >= max_attempts {
                error!(
                    operation = operation_name,
                    attempts = max_attempts,
                    "❌ {} failed after {} attempts: {}",
                    operation_name,
                    max_attempts,
                    err
                );
                return Err(E::exhausted(operation_name, max_attempts, err));
            }

            let wait = self.delay_for(attempt);
            warn!(
                operation = operation_name,
                attempt = attempt + 1,
                max_attempts,
                wait_secs = wait.as_secs_f64(),
                "⚠️  {} failed (attempt {}/{}): {}. Retrying in {:.1}s",
                operation_name,
                attempt + 1,
                max_attempts,
                err,
                wait.as_secs_f64()
            );
            sleep(wait).await;
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}
