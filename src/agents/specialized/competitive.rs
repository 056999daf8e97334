//! Competitive Intelligence Agent
//!
//! Builds a competitor set, scores market concentration with the
//! Herfindahl-Hirschman index and derives strategic opportunities from the
//! target's position.
//!
//! Competitors come from the `competitors` input when supplied, otherwise
//! from external domains found by reconnaissance (`recon_data`,
//! `previous_results.reconnaissance`, or merged `site_structure`).

use std::time::Instant;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::agents::specialized::reconnaissance::parse_target;
use crate::agents::{
    Agent, AgentConfig, AgentInput, AgentMessage, AgentRole, AnalysisResult, MessageType,
};
use crate::evidence::{Evidence, EvidenceLevel, ReasoningStep, calculate_confidence};
use crate::types::{Result, json_string, json_string_array};

/// Success factors assumed when the input names none
const DEFAULT_SUCCESS_FACTORS: &[&str] = &[
    "user experience",
    "innovation speed",
    "customer service",
    "pricing strategy",
];

/// Competitors derived from links are capped to keep the landscape focused
const MAX_DERIVED_COMPETITORS: usize = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Competitor {
    pub domain: String,
    pub name: String,
    pub similarity_score: f64,
    /// Market share as a fraction in [0, 1], when known
    pub market_share: Option<f64>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
}

impl Competitor {
    fn from_domain(domain: &str) -> Self {
        let name = domain.split('.').next().unwrap_or(domain);
        Self {
            domain: domain.to_string(),
            name: crate::types::capitalize_first(name),
            similarity_score: 0.5,
            ..Default::default()
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        if let Some(domain) = value.as_str() {
            return Some(Self::from_domain(domain));
        }
        let domain = json_string(value, "domain")?;
        let mut competitor = Self::from_domain(&domain);
        if let Some(name) = json_string(value, "name") {
            competitor.name = name;
        }
        if let Some(score) = value.get("similarity_score").and_then(Value::as_f64) {
            competitor.similarity_score = score.clamp(0.0, 1.0);
        }
        competitor.market_share = value
            .get("market_share")
            .and_then(Value::as_f64)
            .map(|s| s.clamp(0.0, 1.0));
        competitor.strengths = json_string_array(value, "strengths");
        competitor.weaknesses = json_string_array(value, "weaknesses");
        Some(competitor)
    }
}

/// Market concentration bucket from the HHI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketConcentration {
    Low,
    Moderate,
    High,
    Unknown,
}

impl MarketConcentration {
    /// Below 1500 is low, below 2500 moderate, otherwise high
    pub fn from_hhi(hhi: f64) -> Self {
        if hhi < 1500.0 {
            Self::Low
        } else if hhi < 2500.0 {
            Self::Moderate
        } else {
            Self::High
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompetitiveLandscape {
    pub market_concentration: MarketConcentration,
    pub hhi: Option<f64>,
    pub competitive_intensity: String,
    pub barriers_to_entry: String,
    pub key_success_factors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketPosition {
    pub market_share_estimate: Option<f64>,
    pub competitive_rank: usize,
    pub positioning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategicOpportunity {
    #[serde(rename = "type")]
    pub opportunity_type: String,
    pub description: String,
    pub priority: String,
    pub effort: String,
    pub potential_impact: f64,
    pub tactics: Vec<String>,
}

/// Herfindahl-Hirschman index over market shares given as fractions.
///
/// `None` when no share is known.
pub fn herfindahl_index(shares: &[f64]) -> Option<f64> {
    if shares.is_empty() {
        return None;
    }
    Some(shares.iter().map(|s| (s * 100.0).powi(2)).sum())
}

/// 1 + number of competitors with a strictly larger share; without a
/// target share the target ranks after every competitor.
pub fn competitive_rank(target_share: Option<f64>, competitors: &[Competitor]) -> usize {
    match target_share {
        Some(share) => {
            1 + competitors
                .iter()
                .filter(|c| c.market_share.is_some_and(|s| s > share))
                .count()
        }
        None => competitors.len() + 1,
    }
}

fn positioning(rank: usize) -> &'static str {
    match rank {
        1 => "leader",
        2..=3 => "challenger",
        _ => "follower",
    }
}

/// Opportunities implied by position and landscape
pub fn identify_opportunities(
    position: &MarketPosition,
    landscape: &CompetitiveLandscape,
) -> Vec<StrategicOpportunity> {
    let mut opportunities = Vec::new();

    if position.competitive_rank > 3 {
        opportunities.push(StrategicOpportunity {
            opportunity_type: "market_share_growth".into(),
            description: "Aggressive market share acquisition strategy".into(),
            priority: "high".into(),
            effort: "medium".into(),
            potential_impact: 0.25,
            tactics: vec![
                "Competitive pricing".into(),
                "Enhanced marketing".into(),
                "Product differentiation".into(),
            ],
        });
    }

    if landscape
        .key_success_factors
        .iter()
        .any(|f| f.eq_ignore_ascii_case("innovation"))
    {
        opportunities.push(StrategicOpportunity {
            opportunity_type: "innovation_leadership".into(),
            description: "Establish innovation leadership position".into(),
            priority: "high".into(),
            effort: "high".into(),
            potential_impact: 0.35,
            tactics: vec![
                "R&D investment".into(),
                "Innovation partnerships".into(),
                "Technology adoption".into(),
            ],
        });
    }

    if landscape.market_concentration == MarketConcentration::Low {
        opportunities.push(StrategicOpportunity {
            opportunity_type: "consolidation_play".into(),
            description: "Market consolidation through acquisitions".into(),
            priority: "medium".into(),
            effort: "very_high".into(),
            potential_impact: 0.45,
            tactics: vec![
                "Strategic acquisitions".into(),
                "Partnership agreements".into(),
                "Market roll-up".into(),
            ],
        });
    }

    opportunities
}

/// External domains reported by an upstream reconnaissance run
fn upstream_domains(input: &AgentInput) -> Vec<String> {
    let structure = input
        .get("recon_data")
        .and_then(|d| d.get("site_structure"))
        .or_else(|| {
            input
                .get("previous_results")
                .and_then(|p| p.get("reconnaissance"))
                .and_then(|d| d.get("site_structure"))
        })
        .or_else(|| input.get("site_structure"));

    structure
        .map(|s| json_string_array(s, "external_domains"))
        .unwrap_or_default()
}

pub struct CompetitiveIntelligenceAgent {
    config: AgentConfig,
    competitors: DashMap<String, Vec<Competitor>>,
    landscapes: DashMap<String, CompetitiveLandscape>,
}

impl CompetitiveIntelligenceAgent {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            competitors: DashMap::new(),
            landscapes: DashMap::new(),
        }
    }

    pub fn default_config() -> AgentConfig {
        AgentConfig::new(
            "competitive_001",
            "Market Intelligence Analyst",
            AgentRole::CompetitiveIntelligence,
        )
        .with_description("Competitive landscape and market position analysis")
        .with_capabilities(&[
            "competitor_identification",
            "market_analysis",
            "strategic_opportunities",
        ])
        .with_techniques(&["tree_of_thoughts", "expert_persona"])
    }
}

#[async_trait]
impl Agent for CompetitiveIntelligenceAgent {
    fn config(&self) -> &AgentConfig {
        &self.config
    }

    async fn analyze(&self, input: &AgentInput) -> Result<AnalysisResult> {
        let start = Instant::now();

        let Some(raw_url) = crate::agents::input_url(input) else {
            return Ok(AnalysisResult::failure(
                "URL is required for competitive analysis",
            ));
        };
        let target = match parse_target(raw_url) {
            Ok(u) => u,
            Err(msg) => return Ok(AnalysisResult::failure(msg)),
        };
        let domain = target
            .host_str()
            .map(|h| h.strip_prefix("www.").unwrap_or(h).to_string())
            .unwrap_or_default();
        let industry = input
            .get("industry")
            .and_then(Value::as_str)
            .unwrap_or("general")
            .to_string();

        info!("Competitive intelligence: {} ({})", domain, industry);

        // 1. Competitor identification
        let supplied: Vec<Competitor> = input
            .get("competitors")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Competitor::from_value).collect())
            .unwrap_or_default();
        let from_input = !supplied.is_empty();
        let competitors: Vec<Competitor> = if from_input {
            supplied
        } else {
            upstream_domains(input)
                .iter()
                .filter(|d| **d != domain)
                .take(MAX_DERIVED_COMPETITORS)
                .map(|d| Competitor::from_domain(d))
                .collect()
        };
        debug!(
            "Identified {} competitors (from input: {})",
            competitors.len(),
            from_input
        );

        // 2. Landscape
        let target_share = input
            .get("market_share")
            .and_then(Value::as_f64)
            .map(|s| s.clamp(0.0, 1.0));
        let mut shares: Vec<f64> = competitors.iter().filter_map(|c| c.market_share).collect();
        shares.extend(target_share);
        let hhi = herfindahl_index(&shares);
        let market_concentration = hhi
            .map(MarketConcentration::from_hhi)
            .unwrap_or(MarketConcentration::Unknown);

        let key_success_factors = input
            .get("key_success_factors")
            .map(|v| {
                v.as_array()
                    .map(|a| a.iter().filter_map(Value::as_str).map(String::from).collect())
                    .unwrap_or_default()
            })
            .filter(|v: &Vec<String>| !v.is_empty())
            .unwrap_or_else(|| {
                DEFAULT_SUCCESS_FACTORS
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });

        let landscape = CompetitiveLandscape {
            market_concentration,
            hhi,
            competitive_intensity: match competitors.len() {
                0..=2 => "low",
                3..=6 => "moderate",
                _ => "high",
            }
            .to_string(),
            barriers_to_entry: match market_concentration {
                MarketConcentration::High => "high",
                MarketConcentration::Moderate => "medium",
                MarketConcentration::Low | MarketConcentration::Unknown => "low",
            }
            .to_string(),
            key_success_factors,
        };

        // 3. Position and opportunities
        let rank = competitive_rank(target_share, &competitors);
        let position = MarketPosition {
            market_share_estimate: target_share,
            competitive_rank: rank,
            positioning: positioning(rank).to_string(),
        };
        let opportunities = identify_opportunities(&position, &landscape);

        // Evidence: supplied data is observed, derived data is inferred
        let source = if from_input {
            "api:competitors".to_string()
        } else {
            format!("https://{}", domain)
        };
        let identification_level = if from_input {
            EvidenceLevel::DirectObservation
        } else {
            EvidenceLevel::PatternRecognition
        };

        let competitors_value = serde_json::to_value(&competitors)?;
        let landscape_value = serde_json::to_value(&landscape)?;
        let position_value = serde_json::to_value(&position)?;
        let opportunities_value = serde_json::to_value(&opportunities)?;

        let evidence = vec![
            Evidence::new(
                "competitor_identification",
                competitors_value.clone(),
                source.as_str(),
                identification_level,
            )
            .with_confidence(0.85),
            Evidence::new(
                "market_analysis",
                landscape_value.clone(),
                source.as_str(),
                EvidenceLevel::PatternRecognition,
            )
            .with_confidence(0.88),
            Evidence::new(
                "positioning",
                position_value.clone(),
                source.as_str(),
                EvidenceLevel::PatternRecognition,
            )
            .with_confidence(0.82),
            Evidence::new(
                "strategic_opportunities",
                opportunities_value.clone(),
                source.as_str(),
                EvidenceLevel::InformedSpeculation,
            )
            .with_confidence(0.8),
        ];
        let confidence = calculate_confidence(&evidence);

        let reasoning = vec![
            ReasoningStep::new(
                "competitor_identification",
                format!(
                    "{} competitors {}",
                    competitors.len(),
                    if from_input {
                        "supplied"
                    } else {
                        "derived from linked domains"
                    }
                ),
            )
            .with_evidence(evidence[..1].to_vec()),
            ReasoningStep::new(
                "market_analysis",
                match hhi {
                    Some(h) => format!("HHI {:.0} indicates {:?} concentration", h, market_concentration),
                    None => "No market share data; concentration unknown".to_string(),
                },
            )
            .with_evidence(evidence[1..2].to_vec()),
            ReasoningStep::new(
                "opportunity_identification",
                format!(
                    "Rank {} ({}) yields {} opportunities",
                    rank,
                    position.positioning,
                    opportunities.len()
                ),
            )
            .with_evidence(evidence[2..].to_vec()),
        ];

        self.competitors.insert(domain.clone(), competitors.clone());
        self.landscapes.insert(industry.clone(), landscape);

        let mut data = Map::new();
        data.insert("target_domain".into(), Value::String(domain.clone()));
        data.insert("industry".into(), Value::String(industry));
        data.insert("competitors".into(), competitors_value);
        data.insert("competitive_landscape".into(), landscape_value);
        data.insert("market_position".into(), position_value);
        data.insert("strategic_opportunities".into(), opportunities_value);

        let elapsed = start.elapsed().as_secs_f64();
        info!(
            "Competitive intelligence: {} complete (rank {}, {:.2}s)",
            domain, rank, elapsed
        );

        Ok(AnalysisResult::success(data, confidence)
            .with_evidence(evidence)
            .with_reasoning(reasoning)
            .with_metadata("analysis_duration", elapsed)
            .with_metadata("timestamp", chrono::Utc::now().to_rfc3339()))
    }

    async fn collaborate(&self, message: &AgentMessage) -> Option<AgentMessage> {
        let content = match message.message_type {
            MessageType::RequestCompetitorData => {
                let competitors = message
                    .content_str("domain")
                    .and_then(|d| self.competitors.get(d))
                    .map(|c| c.clone())
                    .unwrap_or_default();
                json!({"competitors": competitors})
            }
            MessageType::RequestMarketAnalysis => {
                let industry = message.content_str("industry").unwrap_or("general");
                let analysis = self
                    .landscapes
                    .get(industry)
                    .and_then(|l| serde_json::to_value(l.value()).ok())
                    .unwrap_or(Value::Null);
                json!({"market_analysis": analysis})
            }
            _ => return None,
        };
        message.reply(&self.config.agent_id, content)
    }
}
