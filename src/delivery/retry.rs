//! Retry with capped exponential backoff for platform calls.
//!
//! Throttling and internal failures are retried; any other error, or running
//! out of attempts, is returned to the caller. With `n` attempts the total
//! time spent backing off never exceeds `(n - 1) * max_backoff`.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use furnace_shared::SinkError;
use serde::Serialize;
use thiserror::Error;
use tokio::time::sleep;

use crate::config::RetryConfig;

#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    #[error("{operation} failed: {source}")]
    Fatal { operation: String, source: SinkError },
    #[error("{operation} gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last: SinkError,
    },
}

impl DeliveryError {
    /// The sink error that ended the call.
    pub fn sink_error(&self) -> &SinkError {
        match self {
            DeliveryError::Fatal { source, .. } => source,
            DeliveryError::RetriesExhausted { last, .. } => last,
        }
    }
}

/// Attempt bookkeeping shared by every caller of a policy.
#[derive(Debug, Default)]
struct RetryStats {
    attempts: AtomicU64,
    retries: AtomicU64,
    fatal: AtomicU64,
    exhausted: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetryStatsSnapshot {
    pub attempts: u64,
    pub retries: u64,
    pub fatal: u64,
    pub exhausted: u64,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    stats: Arc<RetryStats>,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: config.initial_backoff(),
            max_backoff: config.max_backoff(),
            stats: Arc::new(RetryStats::default()),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait after the `failed`-th consecutive failure (1-based).
    pub fn backoff(&self, failed: u32) -> Duration {
        let exp = failed.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff)
    }

    pub fn stats(&self) -> RetryStatsSnapshot {
        RetryStatsSnapshot {
            attempts: self.stats.attempts.load(Ordering::Relaxed),
            retries: self.stats.retries.load(Ordering::Relaxed),
            fatal: self.stats.fatal.load(Ordering::Relaxed),
            exhausted: self.stats.exhausted.load(Ordering::Relaxed),
        }
    }

    /// Call `call` until it succeeds, fails fatally or the attempt cap is hit.
    /// `call` is invoked once per attempt, so anything it wraps (a rate
    /// limiter slot, a fresh copy of the request) is taken again per retry.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, DeliveryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SinkError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            self.stats.attempts.fetch_add(1, Ordering::Relaxed);

            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                self.stats.fatal.fetch_add(1, Ordering::Relaxed);
                return Err(DeliveryError::Fatal {
                    operation: operation.to_string(),
                    source: err,
                });
            }

            if attempt >= self.max_attempts {
                self.stats.exhausted.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    "{} failed {} times, giving up: {}",
                    operation,
                    attempt,
                    err
                );
                return Err(DeliveryError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    last: err,
                });
            }

            self.stats.retries.fetch_add(1, Ordering::Relaxed);
            let delay = self.backoff(attempt);
            tracing::warn!(
                "{} attempt {}/{} failed ({}), retrying in {:?}",
                operation,
                attempt,
                self.max_attempts,
                err,
                delay
            );
            sleep(delay).await;
        }
    }
}
