//! Agent Coordinator
//!
//! Selects agents for an analysis type, runs them under an execution
//! strategy, and synthesizes their results into one confidence-scored
//! analysis.
//!
//! ## Flow
//!
//! ```text
//! AnalysisRequest
//!   -> session begin (InProgress)
//!   -> registry.select(analysis_type)
//!   -> Execution::run(strategy)      [results recorded as they finish]
//!   -> synthesize + overall_confidence
//!   -> session complete | fail
//! ```
//!
//! Agent failures degrade into unsuccessful results and never fail the
//! session. Coordinator errors (unregistered role, empty registry) mark
//! the session failed and propagate.

pub mod registry;
pub mod session;
pub mod strategy;
pub mod synthesis;

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

pub use registry::{AgentRegistry, default_registry};
pub use session::{AnalysisSession, AnalysisStatus, Progress, SessionStatus, SessionStore};
pub use synthesis::{KeyFinding, Synthesis, overall_confidence, synthesize};

use crate::agents::{
    AgentHealth, AgentInput, AgentMessage, AgentRole, AnalysisResult, HealthStatus,
};
use crate::config::Config;
use crate::evidence::ConfidenceLevel;
use crate::metrics::{ACTIVE_ANALYSES, ANALYSES_TOTAL, MetricsCollector, PerformanceSummary};
use crate::types::{AnalysisId, PalmerError, Result};
use strategy::Execution;

// =============================================================================
// Analysis Type & Strategy
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    /// Every registered agent
    #[default]
    Comprehensive,
    Competitive,
    Technical,
    Content,
}

impl AnalysisType {
    pub const ALL: [AnalysisType; 4] = [
        Self::Comprehensive,
        Self::Competitive,
        Self::Technical,
        Self::Content,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Comprehensive => "comprehensive",
            Self::Competitive => "competitive",
            Self::Technical => "technical",
            Self::Content => "content",
        }
    }

    /// The single role this type needs; `None` means all registered roles
    pub fn required_role(self) -> Option<AgentRole> {
        match self {
            Self::Comprehensive => None,
            Self::Competitive => Some(AgentRole::CompetitiveIntelligence),
            Self::Technical => Some(AgentRole::Reconnaissance),
            Self::Content => Some(AgentRole::ContentExtraction),
        }
    }
}

impl std::fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AnalysisType {
    type Err = PalmerError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| {
                PalmerError::Coordinator(format!(
                    "Unknown analysis type: {}. Valid values: comprehensive, competitive, technical, content",
                    s
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStrategy {
    #[default]
    Parallel,
    Sequential,
    Adaptive,
}

impl ExecutionStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parallel => "parallel",
            Self::Sequential => "sequential",
            Self::Adaptive => "adaptive",
        }
    }
}

impl std::fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExecutionStrategy {
    type Err = PalmerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "parallel" => Ok(Self::Parallel),
            "sequential" => Ok(Self::Sequential),
            "adaptive" => Ok(Self::Adaptive),
            _ => Err(PalmerError::Coordinator(format!(
                "Unknown execution strategy: {}. Valid values: parallel, sequential, adaptive",
                s
            ))),
        }
    }
}

// =============================================================================
// Request / Response
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub target_url: String,
    #[serde(default)]
    pub analysis_type: AnalysisType,
    #[serde(default)]
    pub strategy: ExecutionStrategy,
    /// Extra agent input (industry, competitors, question, ...)
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl AnalysisRequest {
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
            analysis_type: AnalysisType::default(),
            strategy: ExecutionStrategy::default(),
            options: Map::new(),
        }
    }

    /// Build from untyped names, rejecting unknown types and strategies
    pub fn parse(target_url: impl Into<String>, analysis_type: &str, strategy: &str) -> Result<Self> {
        Ok(Self::new(target_url)
            .with_type(analysis_type.parse()?)
            .with_strategy(strategy.parse()?))
    }

    pub fn with_type(mut self, analysis_type: AnalysisType) -> Self {
        self.analysis_type = analysis_type;
        self
    }

    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Agent input: options, then `url` and `analysis_id`
    fn agent_input(&self, analysis_id: &AnalysisId) -> AgentInput {
        let mut input = self.options.clone();
        input.insert("url".into(), Value::String(self.target_url.clone()));
        input.insert(
            "analysis_id".into(),
            Value::String(analysis_id.to_string()),
        );
        input
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub duration_secs: f64,
    pub agent_count: usize,
    pub successful_agents: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatedAnalysis {
    pub analysis_id: AnalysisId,
    pub target_url: String,
    pub analysis_type: AnalysisType,
    pub execution_strategy: ExecutionStrategy,
    pub agent_results: BTreeMap<AgentRole, AnalysisResult>,
    pub synthesis: Synthesis,
    pub confidence: ConfidenceLevel,
    pub metadata: AnalysisMetadata,
}

/// Aggregate health across registered agents
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorHealth {
    pub status: HealthStatus,
    pub agents: Vec<AgentHealth>,
    pub active_analyses: usize,
    pub total_analyses: usize,
}

// =============================================================================
// Coordinator
// =============================================================================

/// Decrements the active-analysis gauge however the analysis ends
struct ActiveAnalysis<'a>(&'a MetricsCollector);

impl<'a> ActiveAnalysis<'a> {
    fn start(metrics: &'a MetricsCollector) -> Self {
        metrics.adjust_gauge(ACTIVE_ANALYSES, 1.0, &[]);
        Self(metrics)
    }
}

impl Drop for ActiveAnalysis<'_> {
    fn drop(&mut self) {
        self.0.adjust_gauge(ACTIVE_ANALYSES, -1.0, &[]);
    }
}

pub struct AgentCoordinator {
    registry: AgentRegistry,
    sessions: SessionStore,
}

impl AgentCoordinator {
    pub fn new(registry: AgentRegistry) -> Self {
        Self {
            registry,
            sessions: SessionStore::new(),
        }
    }

    /// Coordinator over the standard agents
    pub fn from_config(config: &Config) -> Result<Self> {
        let metrics = Arc::new(MetricsCollector::new());
        Ok(Self::new(default_registry(config, metrics)?))
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        self.registry.metrics()
    }

    /// Run a full analysis and record it as a session
    #[instrument(
        skip(self, request),
        fields(
            url = %request.target_url,
            analysis_type = %request.analysis_type,
            strategy = %request.strategy
        )
    )]
    pub async fn coordinate_analysis(&self, request: AnalysisRequest) -> Result<CoordinatedAnalysis> {
        let analysis_id = self.sessions.begin(&request);
        let _active = ActiveAnalysis::start(self.metrics());
        info!("Analysis {} started", analysis_id);

        match self.run_session(&analysis_id, &request).await {
            Ok(analysis) => {
                self.sessions.complete(
                    &analysis_id,
                    analysis.synthesis.clone(),
                    analysis.confidence,
                );
                info!(
                    "Analysis {} completed: {}/{} agents succeeded, confidence {}",
                    analysis_id,
                    analysis.metadata.successful_agents,
                    analysis.metadata.agent_count,
                    analysis.confidence
                );
                Ok(analysis)
            }
            Err(e) => {
                warn!("Analysis {} failed: {}", analysis_id, e);
                self.sessions.fail(&analysis_id, e.to_string());
                Err(e)
            }
        }
    }

    async fn run_session(
        &self,
        analysis_id: &AnalysisId,
        request: &AnalysisRequest,
    ) -> Result<CoordinatedAnalysis> {
        let start = Instant::now();

        let selected = self.registry.select(request.analysis_type)?;
        self.sessions.set_expected_agents(
            analysis_id,
            selected.iter().map(|(role, _)| *role).collect(),
        );

        let input = request.agent_input(analysis_id);
        let execution = Execution {
            sessions: &self.sessions,
            analysis_id,
        };
        let agent_results = execution.run(request.strategy, &selected, &input).await;

        let synthesis = synthesize(&agent_results);
        let confidence = overall_confidence(&agent_results);

        let elapsed = start.elapsed();
        self.metrics().record_analysis_duration(elapsed);
        self.metrics().increment_counter(
            ANALYSES_TOTAL,
            1,
            &[
                ("type", request.analysis_type.as_str()),
                ("strategy", request.strategy.as_str()),
            ],
        );

        Ok(CoordinatedAnalysis {
            analysis_id: analysis_id.clone(),
            target_url: request.target_url.clone(),
            analysis_type: request.analysis_type,
            execution_strategy: request.strategy,
            metadata: AnalysisMetadata {
                duration_secs: elapsed.as_secs_f64(),
                agent_count: agent_results.len(),
                successful_agents: agent_results.values().filter(|r| r.success).count(),
                timestamp: Utc::now(),
            },
            agent_results,
            synthesis,
            confidence,
        })
    }

    pub fn analysis_status(&self, analysis_id: &AnalysisId) -> Option<AnalysisStatus> {
        self.sessions.status(analysis_id)
    }

    /// Route a message to its recipient (agent id or role name)
    pub async fn send_message(&self, message: &AgentMessage) -> Result<Option<AgentMessage>> {
        let agent = self.registry.find(&message.recipient).ok_or_else(|| {
            PalmerError::Coordinator(format!("Unknown message recipient: {}", message.recipient))
        })?;
        Ok(agent.collaborate(message).await)
    }

    /// Performance per agent id
    pub fn agent_performance(&self) -> BTreeMap<String, PerformanceSummary> {
        self.registry
            .iter()
            .map(|(_, agent)| (agent.config().agent_id.clone(), agent.performance_summary()))
            .collect()
    }

    pub fn health(&self) -> CoordinatorHealth {
        let agents: Vec<AgentHealth> = self
            .registry
            .iter()
            .map(|(_, agent)| agent.health_check())
            .collect();
        let status = if agents.iter().all(|a| a.status == HealthStatus::Healthy) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        CoordinatorHealth {
            status,
            agents,
            active_analyses: self.sessions.in_progress(),
            total_analyses: self.sessions.len(),
        }
    }
}
