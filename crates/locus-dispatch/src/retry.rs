//! Quadratic backoff for provider calls.

use crate::error::ProviderError;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            base: Duration::ZERO,
            max_attempts: 1,
        }
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(attempt.saturating_mul(attempt))
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or
    /// runs out of attempts.
    pub async fn run<T, F, Fut>(&self, label: &str, mut call: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.delay(attempt);
                    tracing::warn!(label, attempt, ?delay, %err, "retrying provider call");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
