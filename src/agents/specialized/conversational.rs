//! Conversational Agent
//!
//! Answers a free-form question about the target using upstream agent data.
//! With an API key it asks an OpenAI-compatible chat endpoint; without one
//! it returns an offline digest of whatever context it was given.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::agents::{Agent, AgentConfig, AgentInput, AgentRole, AnalysisResult, input_url};
use crate::config::LlmConfig;
use crate::evidence::{Evidence, EvidenceLevel, ReasoningStep, calculate_confidence};
use crate::types::{ErrorClassifier, PalmerError, Result};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_QUESTION: &str = "Summarize what is known about this site.";
const MAX_CONTEXT_CHARS: usize = 12_000;

/// Input keys that carry upstream agent output
const CONTEXT_KEYS: &[&str] = &["recon_data", "previous_results"];

/// Minimal OpenAI-compatible chat client
pub struct ChatClient {
    api_key: SecretString,
    api_base: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl ChatClient {
    /// Build from config; `None` when no API key is configured or the
    /// provider is disabled.
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>> {
        if config.provider.eq_ignore_ascii_case("none") {
            return Ok(None);
        }
        let Some(key) = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
        else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PalmerError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Some(Self {
            api_key: SecretString::from(key),
            api_base: config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model: config.model.clone(),
            temperature: config.temperature,
            client,
        }))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
        };

        debug!("Sending chat completion request (model: {})", self.model);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| ErrorClassifier::classify(&e.to_string(), "openai"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ErrorClassifier::classify_http_status(status.as_u16(), &body, "openai").into());
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ErrorClassifier::classify(&e.to_string(), "openai"))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| PalmerError::agent("conversational", "Empty chat completion"))
    }
}

pub struct ConversationalAgent {
    config: AgentConfig,
    client: Option<ChatClient>,
}

impl ConversationalAgent {
    pub fn new(config: AgentConfig, client: Option<ChatClient>) -> Self {
        Self { config, client }
    }

    pub fn default_config() -> AgentConfig {
        AgentConfig::new("conversational_001", "Intelligence Briefer", AgentRole::Conversational)
            .with_description("Natural-language briefings over collected intelligence")
            .with_capabilities(&["question_answering", "summarization"])
            .with_techniques(&["chain_of_thought"])
    }
}

/// Upstream context carried in the input, keyed by input field
fn collect_context(input: &AgentInput) -> Map<String, Value> {
    CONTEXT_KEYS
        .iter()
        .filter_map(|k| {
            input
                .get(*k)
                .filter(|v| !crate::types::json_is_empty(v))
                .map(|v| (k.to_string(), v.clone()))
        })
        .collect()
}

/// One line per upstream source describing what it contributed
pub fn offline_digest(url: Option<&str>, context: &Map<String, Value>) -> String {
    let mut lines = vec![match url {
        Some(u) => format!("Briefing for {}.", u),
        None => "Palmer AI is operational.".to_string(),
    }];

    for (key, value) in context {
        match value {
            Value::Object(map) => {
                let fields: Vec<&str> = map.keys().map(String::as_str).collect();
                lines.push(format!("{}: {}", key, fields.join(", ")));
            }
            other => lines.push(format!("{}: {}", key, other)),
        }
    }

    if context.is_empty() {
        lines.push("No upstream intelligence available yet.".to_string());
    }

    lines.join("\n")
}

#[async_trait]
impl Agent for ConversationalAgent {
    fn config(&self) -> &AgentConfig {
        &self.config
    }

    async fn analyze(&self, input: &AgentInput) -> Result<AnalysisResult> {
        let start = Instant::now();
        let url = input_url(input);
        let question = input
            .get("question")
            .and_then(Value::as_str)
            .filter(|q| !q.trim().is_empty())
            .unwrap_or(DEFAULT_QUESTION);
        let context = collect_context(input);

        let source = url
            .map(String::from)
            .unwrap_or_else(|| "agent:conversational".to_string());

        let mut evidence = Vec::new();
        if !context.is_empty() {
            evidence.push(
                Evidence::new(
                    "upstream_context",
                    Value::Object(context.clone()),
                    source.as_str(),
                    EvidenceLevel::PatternRecognition,
                )
                .with_confidence(0.85),
            );
        }

        let (message, mode) = match &self.client {
            Some(client) => {
                let mut context_json = serde_json::to_string(&context)?;
                if context_json.len() > MAX_CONTEXT_CHARS {
                    let cut = context_json
                        .char_indices()
                        .map(|(i, _)| i)
                        .take_while(|i| *i <= MAX_CONTEXT_CHARS)
                        .last()
                        .unwrap_or(0);
                    context_json.truncate(cut);
                }
                let system = "You are a competitive intelligence analyst. Answer concisely using only the provided context.";
                let user = format!(
                    "Target: {}\nQuestion: {}\nContext:\n{}",
                    url.unwrap_or("(none)"),
                    question,
                    context_json
                );
                info!("Conversational: asking {}", client.model());
                // Transport and API errors propagate for retry
                let answer = client.complete(system, &user).await?;
                evidence.push(
                    Evidence::new(
                        "llm_answer",
                        json!(answer),
                        source.as_str(),
                        EvidenceLevel::InformedSpeculation,
                    )
                    .with_confidence(0.8),
                );
                (answer, "llm")
            }
            None => {
                debug!("Conversational: no LLM configured, using offline digest");
                (offline_digest(url, &context), "offline")
            }
        };

        let confidence = calculate_confidence(&evidence);
        let reasoning = vec![
            ReasoningStep::new(
                "briefing",
                format!(
                    "Answered from {} upstream sources ({} mode)",
                    context.len(),
                    mode
                ),
            )
            .with_evidence(evidence.clone()),
        ];

        let mut data = Map::new();
        data.insert("message".into(), Value::String(message));
        data.insert("question".into(), Value::String(question.to_string()));
        data.insert("mode".into(), Value::String(mode.to_string()));

        Ok(AnalysisResult::success(data, confidence)
            .with_evidence(evidence)
            .with_reasoning(reasoning)
            .with_metadata("analysis_duration", start.elapsed().as_secs_f64())
            .with_metadata("timestamp", chrono::Utc::now().to_rfc3339()))
    }
}
