//! Health Command
//!
//! Report agent health, circuit states and metrics. Breakers and metrics
//! live in process memory, so `--probe` runs a technical analysis first and
//! reports the state it leaves behind.
//!
//! Usage:
//!   palmer health [--probe <url>] [-f text|json|prometheus]

use crate::agents::HealthStatus;
use crate::cli::ui::output::Output;
use crate::config::ConfigLoader;
use crate::coordinator::{
    AgentCoordinator, AnalysisRequest, AnalysisType, CoordinatorHealth, ExecutionStrategy,
};
use crate::types::Result;

pub async fn run(format: &str, probe: Option<&str>) -> Result<()> {
    let config = ConfigLoader::load()?;
    let coordinator = AgentCoordinator::from_config(&config)?;

    if let Some(url) = probe {
        run_probe(&coordinator, url, config.coordinator.default_strategy).await?;
    }

    match format {
        "json" => {
            let health = coordinator.health();
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        "prometheus" => print!("{}", coordinator.metrics().prometheus()),
        _ => print_health(&coordinator.health(), probe),
    }
    Ok(())
}

/// Exercise the agents with a technical analysis so breaker state and
/// metrics reflect a real run
pub async fn run_probe(
    coordinator: &AgentCoordinator,
    url: &str,
    strategy: ExecutionStrategy,
) -> Result<CoordinatorHealth> {
    let request = AnalysisRequest::new(url)
        .with_type(AnalysisType::Technical)
        .with_strategy(strategy);
    coordinator.coordinate_analysis(request).await?;
    Ok(coordinator.health())
}

fn print_health(health: &CoordinatorHealth, probe: Option<&str>) {
    let out = Output::new();

    out.header("Palmer Health");
    match probe {
        Some(url) => out.field("Probe", url),
        None => out.info("No probe run; pass --probe <url> to exercise the agents"),
    }
    match health.status {
        HealthStatus::Healthy => out.success("All agents healthy"),
        HealthStatus::Degraded => out.warning("Some agents are degraded"),
    }
    out.field("Analyses", health.total_analyses);

    out.section("Agents");
    for agent in &health.agents {
        let summary = &agent.performance_summary;
        let avg = summary
            .avg_duration_secs
            .map(|secs| format!(" avg={:.2}s", secs))
            .unwrap_or_default();
        let line = format!(
            "{} circuit={} failures={} calls={} fallbacks={}{}",
            agent.agent_id,
            agent.circuit_breaker_state,
            agent.failure_count,
            summary.total_calls,
            summary.fallbacks,
            avg
        );
        match agent.status {
            HealthStatus::Healthy => out.success(&line),
            HealthStatus::Degraded => out.warning(&line),
        }
    }
    println!();
}
