//! Bounded retry for optimistic-concurrency write conflicts.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Errors that can report whether they were caused by a concurrent write.
pub trait Retryable {
    fn is_write_conflict(&self) -> bool;
}

/// Retries an operation while it fails with a write conflict.
///
/// Any other failure is returned immediately. Once `max_attempts` is
/// exhausted the last write conflict is returned.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_write_conflict() && attempt < self.max_attempts => {
                    debug!(attempt, error = %e, "Write conflict, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_succeeds_after_conflicts() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, Error> = policy()
            .run(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(Error::WriteConflict("version changed".to_string()))
                } else {
                    Ok(n)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_return_last_conflict() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Error> = policy()
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::WriteConflict("still racing".to_string()))
            })
            .await;
        assert!(matches!(result, Err(Error::WriteConflict(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Error> = policy()
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::NotFound("build".to_string()))
            })
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
