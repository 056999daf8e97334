//! Palmer - Multi-Agent Site Intelligence Coordinator
//!
//! Analyzes a target website with specialized agents and synthesizes their
//! results into a confidence-scored intelligence summary.
//!
//! ## Core Features
//!
//! - **Coordinated Agents**: reconnaissance, competitive intelligence,
//!   content extraction and conversational briefing agents
//! - **Execution Strategies**: parallel, sequential and adaptive runs
//! - **Resilience**: circuit breaker, retry with backoff and per-attempt
//!   timeouts around every agent, degrading to fallback results
//! - **Evidence Model**: weighted confidence, triangulation and calibration
//!
//! ## Quick Start
//!
//! ```ignore
//! use palmer::{AgentCoordinator, AnalysisRequest, ConfigLoader};
//!
//! let config = ConfigLoader::load()?;
//! let coordinator = AgentCoordinator::from_config(&config)?;
//! let analysis = coordinator
//!     .coordinate_analysis(AnalysisRequest::new("https://example.com"))
//!     .await?;
//! println!("{}", analysis.confidence);
//! ```
//!
//! ## Modules
//!
//! - [`agents`]: agent contract, production wrapper, specialized agents
//! - [`coordinator`]: registry, strategies, synthesis, sessions
//! - [`evidence`]: evidence validation, confidence, triangulation
//! - [`resilience`]: circuit breaker, retry, timeouts
//! - [`config`]: layered configuration

pub mod agents;
pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod evidence;
pub mod metrics;
pub mod resilience;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{ErrorCategory, PalmerError, Result};
pub use types::AnalysisId;

// =============================================================================
// Coordination Re-exports
// =============================================================================

pub use coordinator::{
    AgentCoordinator, AgentRegistry, AnalysisRequest, AnalysisType, CoordinatedAnalysis,
    ExecutionStrategy, SessionStatus, Synthesis,
};

pub use agents::{
    Agent, AgentConfig, AgentInput, AgentMessage, AgentRole, AnalysisResult, MessageType,
    ProductionAgent, ResilienceConfig,
};

// =============================================================================
// Evidence & Resilience Re-exports
// =============================================================================

pub use evidence::{ConfidenceLevel, Evidence, EvidenceLevel};
pub use metrics::MetricsCollector;
pub use resilience::{CircuitBreaker, CircuitState, RetryConfig, retry_with_backoff};
