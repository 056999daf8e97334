//! Agent registry and selection.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::AnalysisType;
use crate::agents::specialized::standard_agents;
use crate::agents::{Agent, AgentRole, ProductionAgent, ResilienceConfig};
use crate::config::Config;
use crate::metrics::MetricsCollector;
use crate::types::{PalmerError, Result};

/// Production agents keyed by role, iterated in canonical role order
pub struct AgentRegistry {
    agents: BTreeMap<AgentRole, Arc<ProductionAgent>>,
    metrics: Arc<MetricsCollector>,
}

impl AgentRegistry {
    pub fn new(metrics: Arc<MetricsCollector>) -> Self {
        Self {
            agents: BTreeMap::new(),
            metrics,
        }
    }

    /// Wrap and register an agent. A later agent with the same role
    /// replaces the earlier one.
    pub fn register(&mut self, agent: Arc<dyn Agent>, resilience: ResilienceConfig) {
        let role = agent.config().role;
        let production = ProductionAgent::new(agent, resilience, Arc::clone(&self.metrics));
        if let Some(previous) = self.agents.insert(role, Arc::new(production)) {
            warn!(
                "Replacing {} agent {}",
                role,
                previous.config().agent_id
            );
        }
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn get(&self, role: AgentRole) -> Option<&Arc<ProductionAgent>> {
        self.agents.get(&role)
    }

    pub fn roles(&self) -> Vec<AgentRole> {
        self.agents.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AgentRole, &Arc<ProductionAgent>)> {
        self.agents.iter()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Resolve a message recipient given as agent id or role name
    pub fn find(&self, recipient: &str) -> Option<&Arc<ProductionAgent>> {
        if let Ok(role) = recipient.parse::<AgentRole>() {
            return self.agents.get(&role);
        }
        self.agents
            .values()
            .find(|a| a.config().agent_id == recipient)
    }

    /// Agents for an analysis type, in execution order.
    ///
    /// Comprehensive selects every registered role; the other types need
    /// their role registered.
    pub fn select(&self, analysis_type: AnalysisType) -> Result<Vec<(AgentRole, Arc<ProductionAgent>)>> {
        let roles = match analysis_type.required_role() {
            None => self.roles(),
            Some(role) => vec![role],
        };

        if roles.is_empty() {
            return Err(PalmerError::Coordinator(
                "No agents registered".to_string(),
            ));
        }

        let selected = roles
            .into_iter()
            .map(|role| {
                self.agents
                    .get(&role)
                    .map(|agent| (role, Arc::clone(agent)))
                    .ok_or_else(|| {
                        PalmerError::Coordinator(format!(
                            "No agent registered for role '{}' ({} analysis)",
                            role, analysis_type
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Selected agents for {} analysis: {:?}",
            analysis_type,
            selected.iter().map(|(r, _)| r.as_str()).collect::<Vec<_>>()
        );

        Ok(selected)
    }
}

/// Registry with one standard agent per role, configured from `config`
pub fn default_registry(config: &Config, metrics: Arc<MetricsCollector>) -> Result<AgentRegistry> {
    let resilience = config.agents.resilience();
    let mut registry = AgentRegistry::new(metrics);
    for agent in standard_agents(config)? {
        registry.register(agent, resilience);
    }
    Ok(registry)
}
