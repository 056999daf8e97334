//! Retry with Exponential Backoff
//!
//! Thin wrapper over `backon` that pins the delay schedule to
//! `min(base_delay * exponential_base^(k-1), max_delay)` before the k-th retry.
//! No jitter is applied so the schedule stays deterministic.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::debug;

use crate::constants::retry as retry_constants;

/// Retry policy for a single agent invocation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: retry_constants::MAX_ATTEMPTS,
            base_delay: Duration::from_millis(retry_constants::BASE_DELAY_MS),
            max_delay: Duration::from_millis(retry_constants::MAX_DELAY_MS),
            exponential_base: retry_constants::EXPONENTIAL_BASE,
        }
    }
}

impl RetryConfig {
    /// Delay slept before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let scaled = self.base_delay.as_secs_f64() * self.exponential_base.powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_factor(self.exponential_base as f32)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize)
    }
}

/// Run `operation` up to `config.max_attempts` times.
///
/// Returns the first success, or the error from the final attempt once
/// attempts are exhausted. Every error is treated as retryable.
pub async fn retry_with_backoff<T, E, F, Fut>(
    config: &RetryConfig,
    label: &str,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_with_backoff_when(config, label, operation, |_: &E| true).await
}

/// Like [`retry_with_backoff`], but stops at the first error for which
/// `should_retry` returns false and returns it unchanged.
pub async fn retry_with_backoff_when<T, E, F, Fut, P>(
    config: &RetryConfig,
    label: &str,
    operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: FnMut(&E) -> bool,
{
    if config.max_attempts <= 1 {
        let mut operation = operation;
        return operation().await;
    }

    operation
        .retry(config.backoff())
        .sleep(tokio::time::sleep)
        .when(should_retry)
        .notify(|err: &E, delay: Duration| {
            debug!(
                target_name = label,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Attempt failed, retrying after backoff"
            );
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            exponential_base: 2.0,
        }
    }

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(60));
    }

    #[test]
    fn test_delay_schedule() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for(1), Duration::from_secs(1));
        assert_eq!(config.delay_for(2), Duration::from_secs(2));
        assert_eq!(config.delay_for(3), Duration::from_secs(4));
        // Capped at max_delay
        assert_eq!(config.delay_for(10), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_fail_fail_succeed() {
        let calls = &AtomicU32::new(0);

        let result = retry_with_backoff(&fast_config(3), "test", move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(format!("failure {}", n))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_returns_last_error() {
        let calls = &AtomicU32::new(0);

        let result: Result<(), String> =
            retry_with_backoff(&fast_config(3), "test", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("failure {}", n))
            })
            .await;

        assert_eq!(result.unwrap_err(), "failure 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_single_attempt_does_not_retry() {
        let calls = &AtomicU32::new(0);

        let result: Result<(), String> =
            retry_with_backoff(&fast_config(1), "test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("nope".to_string())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = &AtomicU32::new(0);

        let result = retry_with_backoff(&fast_config(5), "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(7)
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let calls = &AtomicU32::new(0);

        let result: Result<(), String> = retry_with_backoff_when(
            &fast_config(5),
            "test",
            move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n == 1 {
                    Err("transient".to_string())
                } else {
                    Err("fatal".to_string())
                }
            },
            |err: &String| err != "fatal",
        )
        .await;

        assert_eq!(result.unwrap_err(), "fatal");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
