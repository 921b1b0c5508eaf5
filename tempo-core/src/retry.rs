//! Bounded retry with exponential backoff.
//!
//! Only failures whose [`ErrorKind`](crate::ErrorKind) is retryable
//! (network failures and rate limiting) are attempted again. Everything else
//! returns after the first attempt.

use std::{fmt::Debug, future::Future, time::Duration};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;

pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for every further retry.
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRIES, DEFAULT_BACKOFF_BASE_MS)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base_ms: u64) -> Self {
        Self { max_retries, backoff_base: Duration::from_millis(backoff_base_ms) }
    }

    /// Total number of requests the policy allows.
    pub fn max_attempts(&self) -> u64 {
        u64::from(self.max_retries) + 1
    }

    /// Delay before retry number `retry` (0-based): `backoff_base * 2^retry`,
    /// or `Duration::MAX` once that no longer fits.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if self.backoff_base.is_zero() {
            return Duration::ZERO;
        }
        1u32.checked_shl(retry)
            .and_then(|factor| self.backoff_base.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }
}

/// Attempts spent so far by one logical call.
///
/// A call that needs several requests (a geocoding lookup followed by the
/// forecast) shares one budget, so the whole call makes at most
/// [`RetryPolicy::max_attempts`] requests and the backoff keeps doubling
/// across requests instead of starting over.
#[derive(Debug)]
pub struct RetryBudget {
    policy: RetryPolicy,
    attempts: u64,
    retries: u32,
    last_error: Option<ClientError>,
}

impl RetryBudget {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, attempts: 0, retries: 0, last_error: None }
    }

    /// Requests sent so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    fn is_exhausted(&self) -> bool {
        self.attempts >= self.policy.max_attempts()
    }
}

/// Waits out a backoff delay.
#[async_trait]
pub trait Sleeper: Send + Sync + Debug {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, the
/// budget is exhausted, or `cancel` fires.
///
/// `operation` receives the 0-based attempt number within the budget. On
/// exhaustion the last retryable failure is returned unchanged.
pub async fn run<T, F, Fut>(
    budget: &mut RetryBudget,
    sleeper: &dyn Sleeper,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, ClientError>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut failed = false;

    loop {
        if budget.is_exhausted() {
            tracing::error!(attempts = budget.attempts, "all attempts exhausted");
            return Err(budget
                .last_error
                .take()
                .unwrap_or_else(|| ClientError::network("No request attempt was made")));
        }

        if failed {
            let delay = budget.policy.delay_for_retry(budget.retries);
            budget.retries += 1;
            tracing::debug!(
                retry = budget.retries,
                max_retries = budget.policy.max_retries,
                ?delay,
                "backing off"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::cancelled()),
                _ = sleeper.sleep(delay) => {}
            }
        }

        if cancel.is_cancelled() {
            return Err(ClientError::cancelled());
        }

        let attempt = budget.attempts;
        budget.attempts += 1;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::cancelled()),
            outcome = operation(attempt) => outcome,
        };

        match outcome {
            Ok(value) => {
                if failed {
                    tracing::info!(retries = budget.retries, "request succeeded after retrying");
                }
                return Ok(value);
            }
            Err(err) if !err.is_retryable() => {
                tracing::debug!(kind = %err.kind, "non-retryable failure: {err}");
                return Err(err);
            }
            Err(err) => {
                tracing::warn!(
                    attempt = budget.attempts,
                    max_attempts = budget.policy.max_attempts(),
                    kind = %err.kind,
                    "retryable failure: {err}"
                );
                budget.last_error = Some(err);
                failed = true;
            }
        }
    }
}
