//! Cross-agent synthesis and overall confidence.
//!
//! Results are visited in canonical role order (the `BTreeMap` key order),
//! so the synthesis does not depend on which agent finished first.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::agents::{AgentRole, AnalysisResult};
use crate::evidence::{ConfidenceLevel, Evidence, triangulate};
use crate::types::{json_string, json_string_array};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyFinding {
    pub source: AgentRole,
    pub finding: String,
    pub details: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    pub key_findings: Vec<KeyFinding>,
    pub strategic_recommendations: Vec<String>,
    pub risk_factors: Vec<String>,
    pub opportunities: Vec<Value>,
    /// Observations at least two agents agree on
    pub consensus_points: Vec<String>,
    /// Observations on which agents disagree
    pub divergent_findings: Vec<String>,
}

/// Combine agent results into one synthesis
pub fn synthesize(results: &BTreeMap<AgentRole, AnalysisResult>) -> Synthesis {
    let mut synthesis = Synthesis::default();

    for (role, result) in results {
        if !result.success {
            let reason = result
                .errors
                .first()
                .map(String::as_str)
                .unwrap_or("unknown error");
            synthesis
                .risk_factors
                .push(format!("{} analysis unavailable: {}", role, reason));
            continue;
        }

        let data = result.data.clone().unwrap_or_default();
        let field = |key: &str| data.get(key).cloned().unwrap_or(Value::Null);

        let (finding, details) = match role {
            AgentRole::Reconnaissance => (
                "Site structure and technology assessment completed",
                field("site_structure"),
            ),
            AgentRole::CompetitiveIntelligence => {
                collect_competitive(&data, &mut synthesis);
                ("Competitive landscape mapped", field("market_position"))
            }
            AgentRole::ContentExtraction => (
                "Page content extracted",
                json!({
                    "title": field("title"),
                    "word_count": field("word_count"),
                    "prices": field("prices"),
                }),
            ),
            AgentRole::Conversational => ("Briefing generated", field("message")),
        };

        synthesis.key_findings.push(KeyFinding {
            source: *role,
            finding: finding.to_string(),
            details,
        });
    }

    collect_agreement(results, &mut synthesis);
    collect_triangulation(results, &mut synthesis);
    synthesis
}

fn collect_competitive(data: &serde_json::Map<String, Value>, synthesis: &mut Synthesis) {
    if let Some(opportunities) = data.get("strategic_opportunities").and_then(Value::as_array) {
        for opportunity in opportunities {
            if let Some(description) = json_string(opportunity, "description") {
                let priority = json_string(opportunity, "priority").unwrap_or_default();
                synthesis
                    .strategic_recommendations
                    .push(format!("[{}] {}", priority, description));
            }
            synthesis.opportunities.push(opportunity.clone());
        }
    }

    let concentration = data
        .get("competitive_landscape")
        .and_then(|l| json_string(l, "market_concentration"));
    if concentration.as_deref() == Some("high") {
        synthesis
            .risk_factors
            .push("Highly concentrated market raises barriers to entry".to_string());
    }
}

/// Technologies an agent reported, from `technology_stack` or `technologies`
fn reported_technologies(result: &AnalysisResult) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    let Some(data) = &result.data else {
        return found;
    };

    if let Some(Value::Object(stack)) = data.get("technology_stack") {
        for value in stack.values() {
            match value {
                Value::String(s) => {
                    found.insert(s.clone());
                }
                Value::Array(items) => {
                    found.extend(items.iter().filter_map(Value::as_str).map(String::from));
                }
                _ => {}
            }
        }
    }
    found.extend(json_string_array(&Value::Object(data.clone()), "technologies"));
    found
}

/// Domain an agent reported analyzing
fn reported_domain(result: &AnalysisResult) -> Option<String> {
    let data = result.data.as_ref()?;
    if let Some(domain) = data.get("target_domain").and_then(Value::as_str) {
        return Some(domain.to_string());
    }
    let url = data.get("url").and_then(Value::as_str)?;
    let host = url::Url::parse(url).ok()?.host_str()?.to_string();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

fn collect_agreement(results: &BTreeMap<AgentRole, AnalysisResult>, synthesis: &mut Synthesis) {
    let successes: Vec<(&AgentRole, &AnalysisResult)> =
        results.iter().filter(|(_, r)| r.success).collect();

    let mut technology_votes: BTreeMap<String, Vec<AgentRole>> = BTreeMap::new();
    for (role, result) in &successes {
        for tech in reported_technologies(result) {
            technology_votes.entry(tech).or_default().push(**role);
        }
    }
    for (tech, roles) in technology_votes {
        if roles.len() >= 2 {
            synthesis
                .consensus_points
                .push(format!("{} detected by {} agents", tech, roles.len()));
        }
    }

    let domains: BTreeMap<AgentRole, String> = successes
        .iter()
        .filter_map(|(role, r)| reported_domain(r).map(|d| (**role, d)))
        .collect();
    let distinct: BTreeSet<&String> = domains.values().collect();
    if distinct.len() > 1 {
        let detail: Vec<String> = domains
            .iter()
            .map(|(role, domain)| format!("{}={}", role, domain))
            .collect();
        synthesis
            .divergent_findings
            .push(format!("Agents analyzed different domains: {}", detail.join(", ")));
    } else if let Some(domain) = distinct.into_iter().next()
        && domains.len() >= 2
    {
        synthesis
            .consensus_points
            .push(format!("{} agents agree on target domain {}", domains.len(), domain));
    }
}

/// Evidence claims cross-checked over every successful agent's trail
fn collect_triangulation(results: &BTreeMap<AgentRole, AnalysisResult>, synthesis: &mut Synthesis) {
    let evidence: Vec<Evidence> = results
        .values()
        .filter(|r| r.success)
        .flat_map(|r| r.evidence_trail.iter().cloned())
        .collect();
    if evidence.is_empty() {
        return;
    }

    let triangulation = triangulate(&evidence, None);
    for claim in &triangulation.verified_claims {
        synthesis.consensus_points.push(format!(
            "{} verified by {} sources",
            claim.claim,
            claim.sources.len()
        ));
    }
    for claim in &triangulation.conflicting_claims {
        synthesis.divergent_findings.push(format!(
            "Sources disagree on {}: {}",
            claim.claim,
            claim.sources.join(", ")
        ));
    }
}

/// Mean level score over successful results; LOW when none succeeded
pub fn overall_confidence(results: &BTreeMap<AgentRole, AnalysisResult>) -> ConfidenceLevel {
    let scores: Vec<f64> = results
        .values()
        .filter(|r| r.success)
        .map(|r| r.confidence.score())
        .collect();

    if scores.is_empty() {
        return ConfidenceLevel::Low;
    }

    ConfidenceLevel::from_score(scores.iter().sum::<f64>() / scores.len() as f64)
}
