//! Bounded retry of optimistic transactions.
//!
//! Each attempt runs on the blocking pool (RocksDB calls block). A conflict
//! means the attempt wrote nothing, so it is safe to run it again from a fresh
//! read. Anything else is returned as is.

use crate::config::RetryConfig;
use crate::errors::{BingoError, BingoResult};
use crate::metrics::EngineMetrics;
use rand::{Rng, RngCore};
use std::sync::Arc;
use std::time::Duration;

/// "Equal jitter": the delay lands in [backoff/2, backoff]
pub(crate) fn jittered_backoff(rng: &mut impl RngCore, backoff: Duration) -> Duration {
    let backoff_ms = backoff.as_millis() as u64;
    if backoff_ms <= 1 {
        return backoff;
    }

    let half_ms = backoff_ms / 2;
    let jitter_ms = rng.gen_range(0..=half_ms);
    Duration::from_millis(half_ms.saturating_add(jitter_ms))
}

/// Run `attempt` until it stops conflicting or `max_attempts` is reached.
/// Exhaustion is reported as `TransactionConflict`.
pub(crate) async fn with_conflict_retry<T, F>(
    retry: &RetryConfig,
    metrics: &EngineMetrics,
    operation: &'static str,
    attempt: F,
) -> BingoResult<T>
where
    T: Send + 'static,
    F: Fn() -> BingoResult<T> + Send + Sync + 'static,
{
    let attempt = Arc::new(attempt);
    let max_backoff = Duration::from_millis(retry.max_backoff_ms);
    let mut backoff = Duration::from_millis(retry.base_backoff_ms);
    let max_attempts = retry.max_attempts.max(1);

    for n in 1..=max_attempts {
        let run = attempt.clone();
        let result = tokio::task::spawn_blocking(move || run())
            .await
            .map_err(|e| BingoError::Storage(format!("{} task failed: {}", operation, e)))?;

        match result {
            Err(BingoError::TransactionConflict(reason)) => {
                metrics.record_conflict(operation);
                tracing::debug!(operation, attempt = n, %reason, "Transaction conflict");
                if n == max_attempts {
                    break;
                }
                let delay = jittered_backoff(&mut rand::thread_rng(), backoff);
                tokio::time::sleep(delay).await;
                backoff = (backoff * 2).min(max_backoff);
            }
            other => return other,
        }
    }

    Err(BingoError::TransactionConflict(format!(
        "{} gave up after {} attempts",
        operation, max_attempts
    )))
}
