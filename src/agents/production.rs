//! Production Agent Wrapper
//!
//! Runs a specialized agent behind the resilience stack:
//!
//! ```text
//! CircuitBreaker -> retry_with_backoff -> with_timeout -> Agent::analyze
//! ```
//!
//! This is the recovery boundary: `analyze_with_resilience` never returns an
//! error. Only recoverable errors are retried. Exhausted retries, permanent
//! errors and open circuits all become a degraded fallback result carrying
//! the original error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use super::{Agent, AgentConfig, AgentInput, AgentMessage, AnalysisResult};
use crate::constants::network as net_constants;
use crate::metrics::{AGENT_CIRCUIT_OPEN, AGENT_FALLBACKS, MetricsCollector, PerformanceSummary};
use crate::resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitError, CircuitState, RetryConfig,
    retry_with_backoff_when, with_timeout,
};
use crate::types::PalmerError;

/// Resilience settings applied to every wrapped agent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResilienceConfig {
    pub circuit_breaker: CircuitBreakerConfig,
    pub retry: RetryConfig,
    /// Upper bound for a single `analyze` attempt
    pub attempt_timeout: Duration,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            circuit_breaker: CircuitBreakerConfig::default(),
            retry: RetryConfig::default(),
            attempt_timeout: Duration::from_secs(net_constants::AGENT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Point-in-time health of one agent
#[derive(Debug, Clone, Serialize)]
pub struct AgentHealth {
    pub agent_id: String,
    pub status: HealthStatus,
    pub circuit_breaker_state: CircuitState,
    pub failure_count: u32,
    pub performance_summary: PerformanceSummary,
}

/// Specialized agent wrapped with circuit breaker, retry and fallback
pub struct ProductionAgent {
    agent: Arc<dyn Agent>,
    breaker: CircuitBreaker,
    retry: RetryConfig,
    attempt_timeout: Duration,
    metrics: Arc<MetricsCollector>,
}

impl ProductionAgent {
    pub fn new(
        agent: Arc<dyn Agent>,
        resilience: ResilienceConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let breaker = CircuitBreaker::new(
            agent.config().agent_id.clone(),
            resilience.circuit_breaker,
        );
        Self {
            agent,
            breaker,
            retry: resilience.retry,
            attempt_timeout: resilience.attempt_timeout,
            metrics,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        self.agent.config()
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Analyze with circuit breaker, retry and timeout. Never fails.
    pub async fn analyze_with_resilience(&self, input: &AgentInput) -> AnalysisResult {
        let agent_id = self.config().agent_id.as_str();
        let agent = &self.agent;
        let retry = &self.retry;
        let timeout = self.attempt_timeout;
        let start = Instant::now();

        let outcome = self
            .breaker
            .call(move || {
                retry_with_backoff_when(
                    retry,
                    agent_id,
                    move || with_timeout(timeout, agent.analyze(input), agent_id),
                    PalmerError::is_recoverable,
                )
            })
            .await;

        let elapsed = start.elapsed();
        let open = self.breaker.state() == CircuitState::Open;
        self.metrics.set_gauge(
            AGENT_CIRCUIT_OPEN,
            if open { 1.0 } else { 0.0 },
            &[("agent", agent_id)],
        );

        match outcome {
            Ok(result) => {
                debug!(
                    agent = agent_id,
                    success = result.success,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Agent analysis finished"
                );
                self.metrics
                    .record_agent_call(agent_id, elapsed, result.success);
                result
            }
            Err(err) => {
                let err = match err {
                    CircuitError::Open => PalmerError::CircuitOpen {
                        agent: agent_id.to_string(),
                    },
                    CircuitError::Operation(e) => e,
                };
                self.metrics.record_agent_call(agent_id, elapsed, false);
                self.fallback(&err)
            }
        }
    }

    /// Degraded result used when the agent could not produce one
    fn fallback(&self, err: &PalmerError) -> AnalysisResult {
        let agent_id = self.config().agent_id.as_str();
        let message = err.to_string();

        if matches!(err, PalmerError::CircuitOpen { .. }) {
            warn!(agent = agent_id, "Circuit open, returning fallback result");
        } else {
            error!(
                agent = agent_id,
                category = %err.category(),
                "Agent entering fallback mode: {}",
                message
            );
        }

        self.metrics
            .increment_counter(AGENT_FALLBACKS, 1, &[("agent", agent_id)]);

        AnalysisResult::failure(format!("Agent temporarily unavailable: {}", message))
            .with_metadata("fallback_triggered", true)
            .with_metadata("original_error", message)
            .with_metadata("error_category", err.category().to_string())
            .with_metadata("fallback_timestamp", Utc::now().to_rfc3339())
    }

    /// Health report; reads state only
    pub fn health_check(&self) -> AgentHealth {
        let state = self.breaker.state();
        AgentHealth {
            agent_id: self.config().agent_id.clone(),
            status: if state == CircuitState::Closed {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            circuit_breaker_state: state,
            failure_count: self.breaker.failure_count(),
            performance_summary: self.performance_summary(),
        }
    }

    pub fn performance_summary(&self) -> PerformanceSummary {
        self.metrics.agent_performance(&self.config().agent_id)
    }

    /// Forward an inter-agent message to the wrapped agent
    pub async fn collaborate(&self, message: &AgentMessage) -> Option<AgentMessage> {
        self.agent.collaborate(message).await
    }

    /// Serialized health, for JSON status endpoints
    pub fn health_json(&self) -> Value {
        serde_json::to_value(self.health_check()).unwrap_or(Value::Null)
    }
}
