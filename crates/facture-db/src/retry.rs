//! # Transaction Retry
//!
//! Re-runs a whole transaction when SQLite reports busy/locked or the pool
//! times out.
//!
//! ```text
//!   attempt 1 ──► Busy ──► sleep 50ms ──► attempt 2 ──► Busy ──► sleep 100ms
//!        ──► attempt 3 ──► Ok / non-transient error ──► return
//!                     └──► Busy and attempts exhausted ──► return Busy
//! ```
//!
//! An attempt that failed never committed, so re-running it leaves no trace.
//! An attempt that did commit is never re-run: only transient errors retry,
//! and a later duplicate call is caught by the status guard.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::{debug, warn};

use crate::error::DbResult;

/// How hard to retry a transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retry.
    pub fn none() -> Self {
        RetryPolicy {
            max_attempts: 1,
            ..Default::default()
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            // Bounded by max_attempts instead
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Runs `operation` until it succeeds, fails with a non-transient error, or
/// `policy.max_attempts` is reached.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, name: &str, mut operation: F) -> DbResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let mut backoff = policy.create_backoff();
    let mut attempt: u32 = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = name, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let Some(delay) = backoff.next_backoff() else {
                    return Err(err);
                };
                warn!(
                    operation = name,
                    attempt,
                    ?delay,
                    error = %err,
                    "Transient database error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = with_retry(fast(5), "test", move || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(DbError::Busy("database is locked".to_string()))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: DbResult<()> = with_retry(fast(3), "test", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(DbError::Busy("database is locked".to_string()))
        })
        .await;

        assert!(matches!(result, Err(DbError::Busy(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_permanent_errors() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: DbResult<()> = with_retry(fast(5), "test", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(DbError::stale("payment", "p1"))
        })
        .await;

        assert!(matches!(result, Err(DbError::StaleState { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
