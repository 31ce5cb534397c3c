//! Timeout and retry helpers
//!
//! Exponential backoff for transient failures, used when probing external
//! dependencies at startup and for fire-and-forget persistence paths.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Retry-related errors
#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("Failed after {attempts} attempts: {source}")]
    Exhausted { attempts: u32, source: E },
}

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: u32,
    /// Per-attempt timeout; None disables the timeout wrapper
    pub timeout: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2,
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Run a future with a timeout
pub async fn with_timeout<F, T>(fut: F, timeout: Duration) -> Result<T, RetryError<std::convert::Infallible>>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| RetryError::Timeout(timeout))
}

/// Execute an operation with exponential backoff.
///
/// `op` is a closure producing a fresh future per attempt. Delay doubles per
/// attempt (capped at `max_delay`); a per-attempt timeout counts as a failure.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut op: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut delay = config.initial_delay;
    let mut last_error: Option<E> = None;

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying operation");
            tokio::time::sleep(delay).await;
            delay = (delay * config.backoff_multiplier).min(config.max_delay);
        }

        let result = match config.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, op()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(attempt, timeout_ms = timeout.as_millis() as u64, "Attempt timed out");
                    continue;
                }
            },
            None => op().await,
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt < max_attempts {
                    warn!(attempt, max_attempts, error = %e, "Attempt failed");
                }
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(source) => Err(RetryError::Exhausted {
            attempts: max_attempts,
            source,
        }),
        // Every attempt timed out before producing an error
        None => Err(RetryError::Timeout(config.timeout.unwrap_or_default())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            backoff_multiplier: 2,
            timeout: None,
        }
    }

    #[tokio::test]
    async fn succeeds_first_try() {
        let result: Result<i32, RetryError<&str>> =
            with_retry(&fast_config(3), || async { Ok::<_, &str>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_config(5), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient")
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_config(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("always fails") }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(RetryError::Exhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected Exhausted, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn per_attempt_timeout_is_enforced() {
        let config = RetryConfig {
            timeout: Some(Duration::from_millis(5)),
            ..fast_config(2)
        };

        let result: Result<(), RetryError<&str>> = with_retry(&config, || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(RetryError::Timeout(_))));
    }

    #[test]
    fn with_timeout_passes_through_fast_futures() {
        let value = tokio_test::block_on(with_timeout(async { 42 }, Duration::from_millis(50)));
        assert_eq!(value.unwrap(), 42);
    }
}
