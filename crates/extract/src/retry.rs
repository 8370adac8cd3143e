use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::OracleError;

/// Errors that may succeed when the same call is repeated.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for OracleError {
    fn is_retryable(&self) -> bool {
        match self {
            OracleError::Http(_) | OracleError::EmptyResponse | OracleError::Timeout(_) => true,
            OracleError::Status { status, .. } => *status == 429 || *status >= 500,
            OracleError::Cancelled | OracleError::Config(_) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: usize,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: usize, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms),
        }
    }

    pub fn none() -> Self {
        Self::new(0, 0, 0)
    }

    /// Retry a future with exponential backoff while the error is retryable
    pub async fn retry<F, Fut, T, E>(&self, operation_name: &str, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display + Retryable,
    {
        let mut attempt = 0;
        let mut backoff = self.initial_backoff;

        loop {
            match f().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!(
                            operation = operation_name,
                            attempts = attempt + 1,
                            "Operation succeeded after retries"
                        );
                    }
                    return Ok(result);
                }
                Err(e) => {
                    attempt += 1;
                    if !e.is_retryable() || attempt > self.max_retries {
                        if e.is_retryable() {
                            warn!(
                                operation = operation_name,
                                attempts = attempt,
                                error = %e,
                                "Operation failed after max retries"
                            );
                        }
                        return Err(e);
                    }

                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Operation failed, retrying"
                    );

                    sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, self.max_backoff);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let policy = RetryPolicy::new(3, 1, 2);
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let result: Result<&str, OracleError> = policy
            .retry("test", move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(OracleError::EmptyResponse)
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_cancellation() {
        let policy = RetryPolicy::new(5, 1, 2);
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let result: Result<(), OracleError> = policy
            .retry("test", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(OracleError::Cancelled)
            })
            .await;

        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn client_errors_are_final() {
        let policy = RetryPolicy::new(2, 1, 2);
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let result: Result<(), OracleError> = policy
            .retry("test", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(OracleError::Status {
                    provider: "ollama",
                    status: 400,
                    body: "bad request".into(),
                })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
