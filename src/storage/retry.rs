//! Bounded exponential retry for blocking storage work.
//!
//! SQLite calls are synchronous, so each attempt runs on the blocking pool.
//! Only lock contention (`RegenError::is_transient`) is retried; anything
//! else surfaces on the first failure.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::constants::retry as retry_constants;
use crate::types::{RegenError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub factor: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: retry_constants::MAX_RETRIES,
            min_delay: Duration::from_millis(retry_constants::MIN_DELAY_MS),
            max_delay: Duration::from_millis(retry_constants::MAX_DELAY_MS),
            factor: retry_constants::FACTOR,
        }
    }
}

impl RetryPolicy {
    /// Fail on the first error.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_factor(self.factor)
            .with_max_times(self.max_retries)
    }
}

/// Run blocking `work` with retries on transient failures.
pub async fn with_retry<T, F>(policy: &RetryPolicy, operation: &str, work: F) -> Result<T>
where
    F: Fn() -> Result<T> + Clone + Send + 'static,
    T: Send + 'static,
{
    let attempt = || {
        let work = work.clone();
        async move { tokio::task::spawn_blocking(work).await? }
    };

    attempt
        .retry(policy.backoff())
        .when(RegenError::is_transient)
        .notify(|err: &RegenError, delay: Duration| {
            tracing::warn!("{} hit lock contention ({}), retrying in {:?}", operation, err, delay);
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            factor: 2.0,
        }
    }

    fn busy() -> RegenError {
        RegenError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        ))
    }

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.min_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let value = with_retry(&fast_policy(3), "test write", move || {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(busy())
            } else {
                Ok(42)
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<()> = with_retry(&fast_policy(2), "test write", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(busy())
        })
        .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<()> = with_retry(&fast_policy(3), "test write", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(RegenError::Storage("constraint".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
