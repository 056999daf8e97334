//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/palmer/) and project (.palmer/) level configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::agents::ResilienceConfig;
use crate::agents::fetch::FetchConfig;
use crate::cache::CacheConfig;
use crate::constants::{cache as cache_constants, circuit_breaker, network, retry};
use crate::coordinator::{AnalysisType, ExecutionStrategy};
use crate::resilience::{CircuitBreakerConfig, RetryConfig};
use crate::types::{PalmerError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Resilience settings shared by every agent
    pub agents: AgentsConfig,

    /// Coordinator defaults
    pub coordinator: CoordinatorConfig,

    /// Site fetch settings
    pub http: HttpConfig,

    /// LLM provider settings (conversational agent)
    pub llm: LlmConfig,

    /// Page response cache
    pub cache: CacheSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            agents: AgentsConfig::default(),
            coordinator: CoordinatorConfig::default(),
            http: HttpConfig::default(),
            llm: LlmConfig::default(),
            cache: CacheSettings::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `PalmerError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if self.agents.circuit_breaker.failure_threshold == 0 {
            return Err(PalmerError::Config(
                "agents.circuit_breaker.failure_threshold must be greater than 0".to_string(),
            ));
        }

        if self.agents.retry.max_attempts == 0 {
            return Err(PalmerError::Config(
                "agents.retry.max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.agents.retry.exponential_base < 1.0 {
            return Err(PalmerError::Config(format!(
                "agents.retry.exponential_base must be at least 1.0, got {}",
                self.agents.retry.exponential_base
            )));
        }

        if self.agents.retry.base_delay_ms > self.agents.retry.max_delay_ms {
            return Err(PalmerError::Config(format!(
                "agents.retry.base_delay_ms ({}) exceeds max_delay_ms ({})",
                self.agents.retry.base_delay_ms, self.agents.retry.max_delay_ms
            )));
        }

        if self.http.timeout_secs == 0 || self.agents.attempt_timeout_secs == 0 {
            return Err(PalmerError::Config(
                "Timeouts must be greater than 0".to_string(),
            ));
        }

        // LLM temperature validation
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(PalmerError::Config(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        crate::cache::ttl_duration(self.cache.ttl_hours)?;

        if self.llm.timeout_secs == 0 {
            return Err(PalmerError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Agent Resilience
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub circuit_breaker: CircuitBreakerSettings,
    pub retry: RetrySettings,
    /// Upper bound for one agent attempt in seconds
    pub attempt_timeout_secs: u64,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            circuit_breaker: CircuitBreakerSettings::default(),
            retry: RetrySettings::default(),
            attempt_timeout_secs: network::AGENT_TIMEOUT_SECS,
        }
    }
}

impl AgentsConfig {
    pub fn resilience(&self) -> ResilienceConfig {
        ResilienceConfig {
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: self.circuit_breaker.failure_threshold,
                recovery_timeout: Duration::from_secs(self.circuit_breaker.recovery_timeout_secs),
            },
            retry: RetryConfig {
                max_attempts: self.retry.max_attempts,
                base_delay: Duration::from_millis(self.retry.base_delay_ms),
                max_delay: Duration::from_millis(self.retry.max_delay_ms),
                exponential_base: self.retry.exponential_base,
            },
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub recovery_timeout_secs: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: circuit_breaker::FAILURE_THRESHOLD,
            recovery_timeout_secs: circuit_breaker::RECOVERY_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: retry::MAX_ATTEMPTS,
            base_delay_ms: retry::BASE_DELAY_MS,
            max_delay_ms: retry::MAX_DELAY_MS,
            exponential_base: retry::EXPONENTIAL_BASE,
        }
    }
}

// =============================================================================
// Coordinator
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub default_strategy: ExecutionStrategy,
    pub default_analysis_type: AnalysisType,
}

// =============================================================================
// HTTP
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: network::REQUEST_TIMEOUT_SECS,
            user_agent: network::USER_AGENT.to_string(),
            max_body_bytes: network::MAX_BODY_BYTES,
        }
    }
}

impl HttpConfig {
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            user_agent: self.user_agent.clone(),
            max_body_bytes: self.max_body_bytes,
        }
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (`openai` or `none`)
    pub provider: String,

    /// Model name
    pub model: String,

    /// OpenAI-compatible API base URL
    pub api_base: Option<String>,

    /// API key; falls back to `OPENAI_API_KEY`. Never written back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Temperature for LLM generation
    pub temperature: f32,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_base: None,
            api_key: None,
            timeout_secs: network::LLM_TIMEOUT_SECS,
            temperature: 0.2,
        }
    }
}

// =============================================================================
// Cache Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_hours: u64,
    /// Directory for persisted pages; memory-only when unset
    pub dir: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_hours: cache_constants::CACHE_EXPIRATION_HOURS,
            dir: None,
        }
    }
}

impl CacheSettings {
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            enabled: self.enabled,
            ttl_hours: self.ttl_hours,
            dir: self.dir.clone(),
            max_content_size: cache_constants::MAX_CACHED_CONTENT_SIZE,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
