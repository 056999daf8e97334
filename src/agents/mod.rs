//! Agent contract and shared agent types.
//!
//! Every specialized agent implements [`Agent`]; [`ProductionAgent`] wraps one
//! with a circuit breaker, retry and fallback so the coordinator only ever
//! sees [`AnalysisResult`]s.

pub mod fetch;
pub mod production;
pub mod specialized;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::evidence::{ConfidenceLevel, Evidence, ReasoningStep};
use crate::types::Result;

pub use fetch::PageFetcher;
pub use production::{AgentHealth, HealthStatus, ProductionAgent, ResilienceConfig};

/// Free-form agent input (`url`, `analysis_id`, options, upstream data)
pub type AgentInput = Map<String, Value>;

// =============================================================================
// Roles
// =============================================================================

/// Agent specializations. Declaration order is the canonical execution and
/// synthesis order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Reconnaissance,
    CompetitiveIntelligence,
    ContentExtraction,
    Conversational,
}

impl AgentRole {
    pub const ALL: [AgentRole; 4] = [
        Self::Reconnaissance,
        Self::CompetitiveIntelligence,
        Self::ContentExtraction,
        Self::Conversational,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reconnaissance => "reconnaissance",
            Self::CompetitiveIntelligence => "competitive_intelligence",
            Self::ContentExtraction => "content_extraction",
            Self::Conversational => "conversational",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AgentRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("Unknown agent role: {}", s))
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Immutable identity and capabilities of an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub agent_id: String,
    pub name: String,
    pub role: AgentRole,
    pub description: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Reasoning technique tags the agent applies
    #[serde(default)]
    pub reasoning_techniques: Vec<String>,
}

impl AgentConfig {
    pub fn new(agent_id: impl Into<String>, name: impl Into<String>, role: AgentRole) -> Self {
        Self {
            agent_id: agent_id.into(),
            name: name.into(),
            role,
            description: String::new(),
            capabilities: Vec::new(),
            reasoning_techniques: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_capabilities(mut self, capabilities: &[&str]) -> Self {
        self.capabilities = capabilities.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_techniques(mut self, techniques: &[&str]) -> Self {
        self.reasoning_techniques = techniques.iter().map(|s| s.to_string()).collect();
        self
    }
}

// =============================================================================
// Analysis Result
// =============================================================================

/// Outcome of one agent's analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub success: bool,
    pub data: Option<Map<String, Value>>,
    #[serde(default)]
    pub errors: Vec<String>,
    pub confidence: ConfidenceLevel,
    #[serde(default)]
    pub evidence_trail: Vec<Evidence>,
    #[serde(default)]
    pub reasoning_path: Vec<ReasoningStep>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl AnalysisResult {
    pub fn success(data: Map<String, Value>, confidence: ConfidenceLevel) -> Self {
        Self {
            success: true,
            data: Some(data),
            errors: Vec::new(),
            confidence,
            evidence_trail: Vec::new(),
            reasoning_path: Vec::new(),
            metadata: Map::new(),
        }
    }

    /// Unsuccessful result with LOW confidence
    pub fn failure(error: impl Into<String>) -> Self {
        Self::failures(vec![error.into()])
    }

    pub fn failures(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            errors,
            confidence: ConfidenceLevel::Low,
            evidence_trail: Vec::new(),
            reasoning_path: Vec::new(),
            metadata: Map::new(),
        }
    }

    pub fn with_evidence(mut self, evidence: Vec<Evidence>) -> Self {
        self.evidence_trail = evidence;
        self
    }

    pub fn with_reasoning(mut self, steps: Vec<ReasoningStep>) -> Self {
        self.reasoning_path = steps;
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn data_field(&self, key: &str) -> Option<&Value> {
        self.data.as_ref()?.get(key)
    }

    pub fn is_fallback(&self) -> bool {
        self.metadata
            .get("fallback_triggered")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

// =============================================================================
// Inter-agent Messaging
// =============================================================================

/// Request/response message kinds understood by agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    RequestSiteData,
    SiteDataResponse,
    RequestTechStack,
    TechStackResponse,
    RequestCompetitorData,
    CompetitorDataResponse,
    RequestMarketAnalysis,
    MarketAnalysisResponse,
}

impl MessageType {
    /// Matching response kind for a request, `None` for responses
    pub fn response_type(self) -> Option<Self> {
        match self {
            Self::RequestSiteData => Some(Self::SiteDataResponse),
            Self::RequestTechStack => Some(Self::TechStackResponse),
            Self::RequestCompetitorData => Some(Self::CompetitorDataResponse),
            Self::RequestMarketAnalysis => Some(Self::MarketAnalysisResponse),
            Self::SiteDataResponse
            | Self::TechStackResponse
            | Self::CompetitorDataResponse
            | Self::MarketAnalysisResponse => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Sender agent id
    pub sender: String,
    /// Recipient agent id or role name
    pub recipient: String,
    pub message_type: MessageType,
    pub content: Value,
    pub timestamp: DateTime<Utc>,
}

impl AgentMessage {
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        message_type: MessageType,
        content: Value,
    ) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            message_type,
            content,
            timestamp: Utc::now(),
        }
    }

    /// Build the response to this request from `responder`.
    ///
    /// Returns `None` when this message is itself a response.
    pub fn reply(&self, responder: &str, content: Value) -> Option<AgentMessage> {
        let message_type = self.message_type.response_type()?;
        Some(AgentMessage::new(
            responder,
            self.sender.clone(),
            message_type,
            content,
        ))
    }

    pub fn content_str(&self, key: &str) -> Option<&str> {
        self.content.get(key).and_then(Value::as_str)
    }
}

// =============================================================================
// Agent Trait
// =============================================================================

/// Uniform contract for specialized agents
#[async_trait]
pub trait Agent: Send + Sync {
    fn config(&self) -> &AgentConfig;

    /// Run the agent's analysis.
    ///
    /// Transient failures (network, upstream errors) are returned as `Err`
    /// so the resilience layer can retry them; bad input yields an
    /// unsuccessful `Ok` result.
    async fn analyze(&self, input: &AgentInput) -> Result<AnalysisResult>;

    /// Answer a request from another agent
    async fn collaborate(&self, _message: &AgentMessage) -> Option<AgentMessage> {
        None
    }
}

/// Target URL from agent input
pub fn input_url(input: &AgentInput) -> Option<&str> {
    input
        .get("url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_order_and_names() {
        let mut roles = vec![
            AgentRole::Conversational,
            AgentRole::Reconnaissance,
            AgentRole::ContentExtraction,
            AgentRole::CompetitiveIntelligence,
        ];
        roles.sort();
        assert_eq!(roles, AgentRole::ALL.to_vec());
        assert_eq!(
            "competitive_intelligence".parse::<AgentRole>().unwrap(),
            AgentRole::CompetitiveIntelligence
        );
        assert!("scraper".parse::<AgentRole>().is_err());
        assert_eq!(
            serde_json::to_value(AgentRole::ContentExtraction).unwrap(),
            json!("content_extraction")
        );
    }

    #[test]
    fn test_failure_result_is_low_confidence() {
        let r = AnalysisResult::failure("URL is required");
        assert!(!r.success);
        assert_eq!(r.confidence, ConfidenceLevel::Low);
        assert_eq!(r.errors, vec!["URL is required"]);
        assert!(r.data.is_none());
        assert!(!r.is_fallback());
    }

    #[test]
    fn test_message_reply() {
        let request = AgentMessage::new(
            "competitive_001",
            "reconnaissance",
            MessageType::RequestTechStack,
            json!({"url": "https://acme.com"}),
        );
        let reply = request.reply("recon_001", json!({"tech_stack": null})).unwrap();
        assert_eq!(reply.message_type, MessageType::TechStackResponse);
        assert_eq!(reply.recipient, "competitive_001");
        assert_eq!(reply.sender, "recon_001");

        assert!(reply.reply("x", json!({})).is_none());
        assert_eq!(request.content_str("url"), Some("https://acme.com"));
    }

    #[test]
    fn test_input_url() {
        let input: AgentInput = json!({"url": "  https://acme.com "}).as_object().cloned().unwrap();
        assert_eq!(input_url(&input), Some("https://acme.com"));

        let empty: AgentInput = json!({"url": ""}).as_object().cloned().unwrap();
        assert_eq!(input_url(&empty), None);
    }
}
