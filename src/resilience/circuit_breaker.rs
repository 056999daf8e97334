//! Circuit Breaker Pattern for Agent Resilience
//!
//! Guards calls to an unreliable agent so that a target that keeps failing
//! is rejected immediately for a cooldown period instead of being hammered.
//!
//! ## States
//!
//! - **Closed**: Normal operation, calls flow through
//! - **Open**: Agent is failing, calls are rejected without running
//! - **HalfOpen**: Trial call allowed to test recovery
//!
//! ## Transitions
//!
//! ```text
//! Closed   --[failure_count >= failure_threshold]--> Open
//! Open     --[recovery_timeout elapsed, next call]--> HalfOpen
//! HalfOpen --[success]--> Closed (failure_count = 0)
//! HalfOpen --[failure, count still >= threshold]--> Open
//! ```

use std::future::Future;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::circuit_breaker as cb_constants;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - calls flow through
    Closed,
    /// Agent is failing - calls rejected immediately
    Open,
    /// Testing recovery - next call is a trial
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Failures counted before opening the circuit
    pub failure_threshold: u32,
    /// Time since the last failure before a trial call is allowed
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: cb_constants::FAILURE_THRESHOLD,
            recovery_timeout: Duration::from_secs(cb_constants::RECOVERY_TIMEOUT_SECS),
        }
    }
}

/// Outcome of a guarded call that did not succeed.
///
/// Keeps fail-fast rejection apart from failures of the operation itself so
/// callers can branch without inspecting messages.
#[derive(Debug, Error)]
pub enum CircuitError<E> {
    /// Circuit was open; the operation was not invoked
    #[error("Circuit breaker is OPEN")]
    Open,
    /// The operation ran and failed; bookkeeping has already been applied
    #[error(transparent)]
    Operation(E),
}

impl<E> CircuitError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// The operation error, if the operation ran
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Open => None,
            Self::Operation(e) => Some(e),
        }
    }
}

/// All mutable state in a single struct so transitions stay atomic
#[derive(Debug)]
struct CircuitBreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    rejected_count: u64,
}

impl CircuitBreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure: None,
            rejected_count: 0,
        }
    }
}

/// Per-agent circuit breaker.
///
/// State lives behind one `RwLock`; the lock is never held across an
/// `.await`, so the breaker can be shared by concurrent callers.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    name: String,
    inner: RwLock<CircuitBreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            name: name.into(),
            inner: RwLock::new(CircuitBreakerInner::new()),
        }
    }

    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current stored state. Pure read: an expired Open circuit is only
    /// moved to HalfOpen by the next call attempt.
    pub fn state(&self) -> CircuitState {
        self.read().state
    }

    pub fn failure_count(&self) -> u32 {
        self.read().failure_count
    }

    /// Run `operation` under the breaker.
    ///
    /// Rejects with [`CircuitError::Open`] while the circuit is open and the
    /// recovery timeout has not elapsed. Operation failures are counted and
    /// returned unchanged inside [`CircuitError::Operation`].
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.allow_request() {
            return Err(CircuitError::Open);
        }

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(CircuitError::Operation(e))
            }
        }
    }

    /// Check whether a call may proceed, moving Open to HalfOpen once the
    /// recovery timeout has elapsed since the last failure.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.write();

        if inner.state != CircuitState::Open {
            return true;
        }

        let recovered = inner
            .last_failure
            .is_none_or(|at| at.elapsed() >= self.config.recovery_timeout);

        if recovered {
            inner.state = CircuitState::HalfOpen;
            tracing::info!(
                "Circuit breaker [{}]: Transitioning to HALF_OPEN (testing recovery)",
                self.name
            );
            true
        } else {
            inner.rejected_count += 1;
            tracing::debug!("Circuit breaker [{}]: Call rejected (circuit OPEN)", self.name);
            false
        }
    }

    /// Record a successful call. Only a half-open trial clears the failure
    /// count; while closed, intermittent failures keep accumulating.
    pub fn record_success(&self) {
        let mut inner = self.write();

        if inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Closed;
            inner.failure_count = 0;
            tracing::info!(
                "Circuit breaker [{}]: Closed (agent recovered)",
                self.name
            );
        }
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        let mut inner = self.write();

        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());

        if inner.failure_count >= self.config.failure_threshold
            && inner.state != CircuitState::Open
        {
            let reopened = inner.state == CircuitState::HalfOpen;
            inner.state = CircuitState::Open;

            if reopened {
                tracing::warn!(
                    "Circuit breaker [{}]: Re-opened after failure in half-open state",
                    self.name
                );
            } else {
                tracing::warn!(
                    "Circuit breaker [{}]: Opened after {} failures (recovery: {:?})",
                    self.name,
                    inner.failure_count,
                    self.config.recovery_timeout
                );
            }
        }
    }

    /// Statistics for monitoring
    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.read();

        CircuitBreakerStats {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            rejected_count: inner.rejected_count,
            since_last_failure: inner.last_failure.map(|t| t.elapsed()),
        }
    }

    /// Force reset to closed state (for manual intervention)
    pub fn reset(&self) {
        let mut inner = self.write();
        *inner = CircuitBreakerInner::new();

        tracing::info!("Circuit breaker [{}]: Manually reset to CLOSED", self.name);
    }

    fn read(&self) -> RwLockReadGuard<'_, CircuitBreakerInner> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CircuitBreakerInner> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Statistics for monitoring circuit breaker state
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub rejected_count: u64,
    pub since_last_failure: Option<Duration>,
}

impl CircuitBreakerStats {
    /// Format as human-readable summary
    pub fn summary(&self) -> String {
        let time_str = self
            .since_last_failure
            .map(|d| format!(" last failure {:.1}s ago", d.as_secs_f64()))
            .unwrap_or_default();

        format!(
            "[{}] {} | failures={} rejected={}{}",
            self.name, self.state, self.failure_count, self.rejected_count, time_str
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn breaker(threshold: u32, recovery: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                recovery_timeout: recovery,
            },
        )
    }

    async fn fail(cb: &CircuitBreaker, calls: &AtomicU32) -> Result<(), CircuitError<String>> {
        cb.call(move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>("Operation failed".to_string())
        })
        .await
    }

    async fn succeed(
        cb: &CircuitBreaker,
        calls: &AtomicU32,
    ) -> Result<&'static str, CircuitError<String>> {
        cb.call(move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>("success")
        })
        .await
    }

    #[tokio::test]
    async fn test_closed_state_passes_through() {
        let cb = breaker(3, Duration::from_secs(60));
        let calls = AtomicU32::new(0);

        assert_eq!(succeed(&cb, &calls).await.unwrap(), "success");
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_operation_error_returned_unchanged() {
        let cb = breaker(3, Duration::from_secs(60));
        let calls = AtomicU32::new(0);

        let err = fail(&cb, &calls).await.unwrap_err();
        assert_eq!(err.into_operation().as_deref(), Some("Operation failed"));
        assert_eq!(cb.failure_count(), 1);
        assert!(cb.stats().since_last_failure.is_some());
    }

    #[tokio::test]
    async fn test_opens_after_threshold_and_rejects_without_invoking() {
        let cb = breaker(2, Duration::from_secs(60));
        let calls = AtomicU32::new(0);

        assert!(fail(&cb, &calls).await.is_err());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(fail(&cb, &calls).await.is_err());
        assert_eq!(cb.state(), CircuitState::Open);

        let err = succeed(&cb, &calls).await.unwrap_err();
        assert!(err.is_open());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cb.stats().rejected_count, 1);
    }

    #[tokio::test]
    async fn test_threshold_three_recovery_scenario() {
        let cb = breaker(3, Duration::from_millis(20));
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            assert!(!fail(&cb, &calls).await.unwrap_err().is_open());
        }
        assert_eq!(cb.state(), CircuitState::Open);

        // 4th call: rejected, operation not invoked
        assert!(succeed(&cb, &calls).await.unwrap_err().is_open());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        tokio::time::sleep(Duration::from_millis(40)).await;

        // 5th call: half-open trial succeeds and closes the circuit
        assert_eq!(succeed(&cb, &calls).await.unwrap(), "success");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let cb = breaker(1, Duration::from_millis(10));
        let calls = AtomicU32::new(0);

        assert!(fail(&cb, &calls).await.is_err());
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(cb.allow_request());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());
    }

    #[test]
    fn test_state_is_pure_read() {
        let cb = breaker(1, Duration::from_millis(1));
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(10));

        // Timeout elapsed but no call attempted yet
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_closed_success_keeps_failure_count() {
        let cb = breaker(3, Duration::from_secs(60));

        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 2);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.failure_count(), 3);
    }

    #[test]
    fn test_manual_reset() {
        let cb = breaker(1, Duration::from_secs(60));

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow_request());
        assert_eq!(cb.stats().failure_count, 0);
    }

    #[test]
    fn test_stats_summary() {
        let cb = breaker(5, Duration::from_secs(60));
        cb.record_failure();
        let summary = cb.stats().summary();
        assert!(summary.starts_with("[test] closed | failures=1 rejected=0"));
    }
}
