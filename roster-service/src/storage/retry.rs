//! Retry executor for remote storage calls.
//!
//! Wraps a single store operation in bounded retry-with-backoff. Transient
//! connectivity failures are re-attempted on a doubling schedule; permission
//! failures abort on the first attempt.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use rand::Rng;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::RetryConfig;

use super::error::StorageError;

/// Bounds for the retry loop and its backoff schedule.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total invocations, including the first attempt.
    pub max_attempts: u32,
    /// Delay before the first re-attempt.
    pub initial_delay: Duration,
    /// Ceiling for the doubling schedule.
    pub max_delay: Duration,
    /// Upper bound (exclusive) of the uniform jitter added to every delay.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        jitter: Duration,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            jitter,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: config.initial_delay(),
            max_delay: config.max_delay(),
            jitter: config.jitter(),
        }
    }

    /// Deterministic doubling schedule capped at `max_delay`. Jitter is added
    /// separately at sleep time so the schedule itself stays testable.
    pub fn schedule(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_delay,
            current_interval: self.initial_delay,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: self.max_delay,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Delay before re-attempt number `attempt` (1-based), without jitter:
    /// `initial_delay * 2^(attempt-1)`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64;
        let uncapped = base * 2f64.powi(attempt.saturating_sub(1) as i32);
        let capped = uncapped.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    fn jitter_amount(&self) -> Duration {
        let cap = self.jitter.as_millis() as u64;
        if cap == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..cap))
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// the attempt budget is spent.
///
/// Exhaustion surfaces as [`StorageError::RetriesExhausted`] wrapping the
/// last failure; the queue decision belongs to the caller, so `queued` is
/// always false here.
pub async fn execute_with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    operation: F,
) -> Result<T, StorageError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    let mut schedule = policy.schedule();
    let mut attempt: u32 = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(
                        operation = operation_name,
                        attempt, "Storage call succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) if !err.is_retryable() => {
                warn!(
                    operation = operation_name,
                    attempt,
                    error = %err,
                    "Storage call failed with non-retryable error"
                );
                return Err(err);
            }
            Err(err) if attempt >= policy.max_attempts => {
                error!(
                    operation = operation_name,
                    attempts = attempt,
                    error = %err,
                    "Storage call failed after max attempts"
                );
                metrics::counter!(
                    "storage_retry_exhausted_total",
                    "operation" => operation_name.to_string()
                )
                .increment(1);
                return Err(StorageError::RetriesExhausted {
                    attempts: attempt,
                    queued: false,
                    source: Box::new(err),
                });
            }
            Err(err) => {
                let delay =
                    schedule.next_backoff().unwrap_or(policy.max_delay) + policy.jitter_amount();
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "Storage call failed, retrying after backoff"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
