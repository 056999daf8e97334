//! Analyze Command
//!
//! Run a coordinated multi-agent analysis against a site.
//!
//! Usage:
//!   palmer analyze <url> [--type comprehensive] [--strategy adaptive]
//!                        [--option industry=retail]... [-f json]

use serde_json::Value;

use crate::agents::AnalysisResult;
use crate::cli::ui::output::Output;
use crate::config::ConfigLoader;
use crate::coordinator::{
    AgentCoordinator, AnalysisRequest, AnalysisType, CoordinatedAnalysis, ExecutionStrategy,
};
use crate::types::Result;

pub struct AnalyzeOptions {
    pub url: String,
    pub analysis_type: Option<String>,
    pub strategy: Option<String>,
    pub options: Vec<(String, Value)>,
    pub format: String,
}

/// Parse a `key=value` option. Values that parse as JSON keep their type,
/// anything else is taken as a string.
pub fn parse_option(s: &str) -> std::result::Result<(String, Value), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid option '{}'. Expected key=value", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("Invalid option '{}'. Key is empty", s));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

pub async fn run(opts: AnalyzeOptions) -> Result<()> {
    let config = ConfigLoader::load()?;

    let analysis_type = match &opts.analysis_type {
        Some(name) => name.parse::<AnalysisType>()?,
        None => config.coordinator.default_analysis_type,
    };
    let strategy = match &opts.strategy {
        Some(name) => name.parse::<ExecutionStrategy>()?,
        None => config.coordinator.default_strategy,
    };

    let mut request = AnalysisRequest::new(&opts.url)
        .with_type(analysis_type)
        .with_strategy(strategy);
    for (key, value) in opts.options {
        request = request.with_option(key, value);
    }

    let coordinator = AgentCoordinator::from_config(&config)?;
    let analysis = coordinator.coordinate_analysis(request).await?;

    if opts.format == "json" {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        print_analysis(&analysis);
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum AgentOutcome {
    Succeeded,
    /// Degraded result from the resilience layer
    Fallback,
    Failed,
}

impl AgentOutcome {
    fn of(result: &AnalysisResult) -> Self {
        if result.success {
            Self::Succeeded
        } else if result.is_fallback() {
            Self::Fallback
        } else {
            Self::Failed
        }
    }
}

fn print_analysis(analysis: &CoordinatedAnalysis) {
    let out = Output::new();
    let synthesis = &analysis.synthesis;

    out.header("Palmer Analysis");
    out.field("ID", &analysis.analysis_id);
    out.field("Target", &analysis.target_url);
    out.field("Type", analysis.analysis_type);
    out.field("Strategy", analysis.execution_strategy);
    out.field("Confidence", out.confidence(analysis.confidence));
    out.field(
        "Duration",
        format!("{:.2}s", analysis.metadata.duration_secs),
    );

    out.section("Agents");
    for (role, result) in &analysis.agent_results {
        let label = format!("{} ({})", role, out.confidence(result.confidence));
        match AgentOutcome::of(result) {
            AgentOutcome::Succeeded => out.success(&label),
            AgentOutcome::Fallback => out.warning(&format!("{} fallback", label)),
            AgentOutcome::Failed => {
                out.error(&format!("{}: {}", label, result.errors.join("; ")))
            }
        }
    }

    if !synthesis.key_findings.is_empty() {
        out.section("Key Findings");
        for finding in &synthesis.key_findings {
            out.bullet(&format!("[{}] {}", finding.source, finding.finding));
        }
    }

    let lists = [
        ("Recommendations", &synthesis.strategic_recommendations),
        ("Risks", &synthesis.risk_factors),
        ("Consensus", &synthesis.consensus_points),
        ("Divergence", &synthesis.divergent_findings),
    ];
    for (title, items) in lists {
        if items.is_empty() {
            continue;
        }
        out.section(title);
        for item in items {
            out.bullet(item);
        }
    }

    if let Some(briefing) = analysis
        .agent_results
        .values()
        .find_map(|r| r.data_field("message").and_then(Value::as_str))
    {
        out.section("Briefing");
        println!("{}", briefing);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_option_types() {
        assert_eq!(
            parse_option("industry=retail").unwrap(),
            ("industry".to_string(), json!("retail"))
        );
        assert_eq!(
            parse_option("competitors=[\"rival.com\"]").unwrap().1,
            json!(["rival.com"])
        );
        assert_eq!(parse_option("depth=3").unwrap().1, json!(3));
        assert_eq!(parse_option("question=a=b").unwrap().1, json!("a=b"));
    }

    #[test]
    fn test_parse_option_rejects_malformed() {
        assert!(parse_option("novalue").is_err());
        assert!(parse_option("=x").is_err());
    }

    #[test]
    fn test_agent_outcome_labels_fallback() {
        let fallback = AnalysisResult::failure("Agent temporarily unavailable: boom")
            .with_metadata("fallback_triggered", true);
        assert_eq!(AgentOutcome::of(&fallback), AgentOutcome::Fallback);

        let rejected = AnalysisResult::failure("URL is required");
        assert_eq!(AgentOutcome::of(&rejected), AgentOutcome::Failed);

        let ok = AnalysisResult::success(serde_json::Map::new(), crate::evidence::ConfidenceLevel::High);
        assert_eq!(AgentOutcome::of(&ok), AgentOutcome::Succeeded);
    }
}
