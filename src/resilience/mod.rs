//! Resilience primitives wrapped around every agent invocation.
//!
//! Layering, outermost first: circuit breaker, retry with backoff, then a
//! per-attempt timeout.

pub mod circuit_breaker;
pub mod retry;
pub mod timeout;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitError, CircuitState,
};
pub use retry::{RetryConfig, retry_with_backoff, retry_with_backoff_when};
pub use timeout::with_timeout;
