//! Bounded exponential-backoff retry for embedding calls.

use crate::error::Result;
use std::future::Future;
use std::time::Duration;

const BASE_BACKOFF_SECS: u64 = 1;

/// How many times to attempt a call and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_retries: u32,
    /// Wait after the first failed attempt; doubles on every further failure
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries: max_retries.max(1),
            base_delay: Duration::from_secs(BASE_BACKOFF_SECS),
        }
    }

    /// Delay after failed attempt `attempt` (1-indexed): `base * 2^(attempt - 1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(31))
    }
}

/// Run `f` until it succeeds, fails permanently, or the attempt budget is spent.
///
/// Only errors for which [`crate::EmbedError::is_transient`] is true are
/// retried. Attempt *n* that fails transiently is followed by a sleep of
/// [`RetryPolicy::delay_for`]`(n)`; the error of the final attempt is returned
/// as-is.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_retries = policy.max_retries.max(1);
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!("{operation} succeeded on attempt {attempt}/{max_retries}");
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() && attempt < max_retries => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "{operation} failed ({err}), retrying in {}s ({attempt}/{max_retries})",
                    delay.as_secs_f32()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                if err.is_transient() {
                    tracing::error!("{operation} failed after {attempt} attempts: {err}");
                }
                return Err(err);
            }
        }
    }
}
