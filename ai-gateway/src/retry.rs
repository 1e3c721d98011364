//! Retry-with-backoff combinator.
//!
//! Every AI call goes through [`retry`]: the operation is attempted once and
//! then retried up to `max_retries` more times, sleeping `base_delay`,
//! `2 * base_delay`, `4 * base_delay`, ... between attempts.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one (0 = no retries).
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each subsequent one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before the given retry (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// Total number of attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Run `op` until it succeeds or the policy is exhausted.
///
/// Returns the first success, or the error from the final attempt.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut retries = 0;
    loop {
        match op().await {
            Ok(value) => {
                if retries > 0 {
                    tracing::info!(
                        attempt = retries + 1,
                        operation,
                        "AI request succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(e) if retries < policy.max_retries => {
                retries += 1;
                let delay = policy.delay_for(retries);
                tracing::warn!(
                    attempt = retries,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    operation,
                    "AI request failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                tracing::error!(
                    attempts = retries + 1,
                    error = %e,
                    operation,
                    "AI request failed after all retry attempts"
                );
                return Err(e);
            }
        }
    }
}
