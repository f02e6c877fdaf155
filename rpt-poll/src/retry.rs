//! Bounded retry for one station attempt
//!
//! Transient faults (a dropped stream read, a recognizer hiccup) get
//! one more try within the cycle; auth failures do not, since retrying
//! the credential exchange immediately would not help.

use crate::error::PollError;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Run `operation`, retrying retryable errors up to
    /// `max_attempts` total attempts with a fixed backoff between.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, PollError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PollError>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    tracing::warn!(attempt, error = %e, "Attempt failed, retrying");
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_transient_error_is_retried_once() {
        let calls = AtomicU32::new(0);

        let result = policy()
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(PollError::StreamUnavailable("reset".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy()
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(PollError::RemoteUnavailable("503".into())) }
            })
            .await;

        assert!(matches!(result, Err(PollError::RemoteUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy()
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(PollError::AuthFailure("bad credentials".into())) }
            })
            .await;

        assert!(matches!(result, Err(PollError::AuthFailure(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
