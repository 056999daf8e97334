//! Execution strategies over the selected agents.
//!
//! Every agent result is recorded into the session as soon as that agent
//! finishes, so a dropped analysis keeps the results that completed.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::ExecutionStrategy;
use super::session::SessionStore;
use crate::agents::{AgentInput, AgentRole, AnalysisResult, ProductionAgent};
use crate::types::AnalysisId;

pub(crate) type SelectedAgents = [(AgentRole, Arc<ProductionAgent>)];

pub(crate) struct Execution<'a> {
    pub sessions: &'a SessionStore,
    pub analysis_id: &'a AnalysisId,
}

impl Execution<'_> {
    pub async fn run(
        &self,
        strategy: ExecutionStrategy,
        agents: &SelectedAgents,
        input: &AgentInput,
    ) -> BTreeMap<AgentRole, AnalysisResult> {
        match strategy {
            ExecutionStrategy::Parallel => self.parallel(agents, input).await,
            ExecutionStrategy::Sequential => self.sequential(agents, input).await,
            ExecutionStrategy::Adaptive => self.adaptive(agents, input).await,
        }
    }

    async fn run_one(
        &self,
        role: AgentRole,
        agent: &ProductionAgent,
        input: &AgentInput,
    ) -> AnalysisResult {
        debug!("Running {} ({})", role, agent.config().agent_id);
        let result = agent.analyze_with_resilience(input).await;
        self.sessions
            .record_agent_result(self.analysis_id, role, result.clone());
        result
    }

    /// All agents concurrently; joined before returning
    async fn parallel(
        &self,
        agents: &SelectedAgents,
        input: &AgentInput,
    ) -> BTreeMap<AgentRole, AnalysisResult> {
        let futures = agents.iter().map(|(role, agent)| async move {
            (*role, self.run_one(*role, agent, input).await)
        });
        join_all(futures).await.into_iter().collect()
    }

    /// List order, each agent seeing the data of successful predecessors
    async fn sequential(
        &self,
        agents: &SelectedAgents,
        input: &AgentInput,
    ) -> BTreeMap<AgentRole, AnalysisResult> {
        let mut results = BTreeMap::new();
        let mut current = input.clone();
        let mut previous = Map::new();

        for (role, agent) in agents {
            current.insert("previous_results".into(), Value::Object(previous.clone()));
            let result = self.run_one(*role, agent, &current).await;

            match (&result.success, &result.data) {
                (true, Some(data)) => {
                    previous.insert(role.as_str().to_string(), Value::Object(data.clone()));
                    for (key, value) in data {
                        current.insert(key.clone(), value.clone());
                    }
                }
                _ => warn!("{} did not succeed, continuing sequence", role),
            }

            results.insert(*role, result);
        }

        results
    }

    /// Reconnaissance first; the rest run in parallel with its data.
    ///
    /// A failed reconnaissance stops the analysis. Without reconnaissance
    /// among the selected agents this is plain parallel execution.
    async fn adaptive(
        &self,
        agents: &SelectedAgents,
        input: &AgentInput,
    ) -> BTreeMap<AgentRole, AnalysisResult> {
        let Some((_, recon)) = agents
            .iter()
            .find(|(role, _)| *role == AgentRole::Reconnaissance)
        else {
            debug!("Adaptive run without reconnaissance, running in parallel");
            return self.parallel(agents, input).await;
        };

        let recon_result = self
            .run_one(AgentRole::Reconnaissance, recon, input)
            .await;

        let recon_data = match (&recon_result.success, &recon_result.data) {
            (true, Some(data)) => data.clone(),
            _ => {
                info!("Reconnaissance failed, skipping dependent agents");
                self.sessions
                    .set_expected_agents(self.analysis_id, vec![AgentRole::Reconnaissance]);
                return BTreeMap::from([(AgentRole::Reconnaissance, recon_result)]);
            }
        };

        let remaining: Vec<(AgentRole, Arc<ProductionAgent>)> = agents
            .iter()
            .filter(|(role, _)| *role != AgentRole::Reconnaissance)
            .cloned()
            .collect();

        let mut enriched = input.clone();
        enriched.insert("recon_data".into(), Value::Object(recon_data));

        let mut results = self.parallel(&remaining, &enriched).await;
        results.insert(AgentRole::Reconnaissance, recon_result);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::production::tests::{MockAgent, fast_resilience};
    use crate::agents::{Agent, AgentConfig};
    use crate::coordinator::AnalysisRequest;
    use crate::evidence::ConfidenceLevel;
    use crate::metrics::MetricsCollector;
    use crate::types::Result;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every input it is given
    struct RecordingAgent {
        config: AgentConfig,
        inputs: Mutex<Vec<AgentInput>>,
        succeed: bool,
    }

    impl RecordingAgent {
        fn new(role: AgentRole, succeed: bool) -> Self {
            Self {
                config: AgentConfig::new(format!("{}_rec", role), "Recorder", role),
                inputs: Mutex::new(Vec::new()),
                succeed,
            }
        }

        fn inputs(&self) -> Vec<AgentInput> {
            self.inputs.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Agent for RecordingAgent {
        fn config(&self) -> &AgentConfig {
            &self.config
        }

        async fn analyze(&self, input: &AgentInput) -> Result<AnalysisResult> {
            self.inputs.lock().unwrap().push(input.clone());
            if !self.succeed {
                return Ok(AnalysisResult::failure("no data"));
            }
            let mut data = Map::new();
            data.insert(format!("{}_out", self.config.role), Value::Bool(true));
            Ok(AnalysisResult::success(data, ConfidenceLevel::High))
        }
    }

    fn wrap(agent: Arc<dyn Agent>) -> (AgentRole, Arc<ProductionAgent>) {
        let role = agent.config().role;
        (
            role,
            Arc::new(ProductionAgent::new(
                agent,
                fast_resilience(5),
                Arc::new(MetricsCollector::new()),
            )),
        )
    }

    fn input() -> AgentInput {
        json!({"url": "https://acme.com"}).as_object().cloned().unwrap()
    }

    fn session() -> (SessionStore, AnalysisId) {
        let store = SessionStore::new();
        let id = store.begin(&AnalysisRequest::new("https://acme.com"));
        (store, id)
    }

    #[tokio::test]
    async fn test_parallel_independent_of_completion_order() {
        let mut slow = MockAgent::new(AgentRole::Reconnaissance);
        slow.delay = Duration::from_millis(30);
        let fast = MockAgent::new(AgentRole::ContentExtraction);

        let agents_a = vec![wrap(Arc::new(slow)), wrap(Arc::new(fast))];

        let fast_first = MockAgent::new(AgentRole::Reconnaissance);
        let mut slow_second = MockAgent::new(AgentRole::ContentExtraction);
        slow_second.delay = Duration::from_millis(30);
        let agents_b = vec![wrap(Arc::new(fast_first)), wrap(Arc::new(slow_second))];

        let (store, id) = session();
        let exec = Execution {
            sessions: &store,
            analysis_id: &id,
        };
        let a = exec.run(ExecutionStrategy::Parallel, &agents_a, &input()).await;
        let b = exec.run(ExecutionStrategy::Parallel, &agents_b, &input()).await;

        let keys_a: Vec<_> = a.keys().copied().collect();
        let keys_b: Vec<_> = b.keys().copied().collect();
        assert_eq!(keys_a, keys_b);
        assert_eq!(a[&AgentRole::Reconnaissance].data, b[&AgentRole::Reconnaissance].data);
        assert_eq!(store.get(&id).unwrap().agent_results.len(), 2);
    }

    #[tokio::test]
    async fn test_sequential_passes_previous_results() {
        let recon = Arc::new(RecordingAgent::new(AgentRole::Reconnaissance, true));
        let failing = Arc::new(RecordingAgent::new(AgentRole::CompetitiveIntelligence, false));
        let content = Arc::new(RecordingAgent::new(AgentRole::ContentExtraction, true));
        let agents = vec![
            wrap(recon.clone()),
            wrap(failing.clone()),
            wrap(content.clone()),
        ];

        let (store, id) = session();
        let exec = Execution {
            sessions: &store,
            analysis_id: &id,
        };
        let results = exec.run(ExecutionStrategy::Sequential, &agents, &input()).await;

        assert_eq!(results.len(), 3);
        assert!(!results[&AgentRole::CompetitiveIntelligence].success);

        let first = &recon.inputs()[0];
        assert_eq!(first["previous_results"], json!({}));

        let last = &content.inputs()[0];
        assert_eq!(
            last["previous_results"],
            json!({"reconnaissance": {"reconnaissance_out": true}})
        );
        // merged top-level keys from the successful predecessor
        assert_eq!(last["reconnaissance_out"], json!(true));
        assert_eq!(last["url"], json!("https://acme.com"));
    }

    #[tokio::test]
    async fn test_adaptive_recon_failure_stops_run() {
        let recon = Arc::new(RecordingAgent::new(AgentRole::Reconnaissance, false));
        let competitive = Arc::new(RecordingAgent::new(AgentRole::CompetitiveIntelligence, true));
        let agents = vec![wrap(recon.clone()), wrap(competitive.clone())];

        let (store, id) = session();
        let exec = Execution {
            sessions: &store,
            analysis_id: &id,
        };
        let results = exec.run(ExecutionStrategy::Adaptive, &agents, &input()).await;

        assert_eq!(results.keys().copied().collect::<Vec<_>>(), vec![AgentRole::Reconnaissance]);
        assert!(competitive.inputs().is_empty());
        assert_eq!(
            store.get(&id).unwrap().expected_agents,
            vec![AgentRole::Reconnaissance]
        );
    }

    #[tokio::test]
    async fn test_adaptive_passes_recon_data() {
        let recon = Arc::new(RecordingAgent::new(AgentRole::Reconnaissance, true));
        let competitive = Arc::new(RecordingAgent::new(AgentRole::CompetitiveIntelligence, true));
        let conversational = Arc::new(RecordingAgent::new(AgentRole::Conversational, true));
        let agents = vec![
            wrap(recon.clone()),
            wrap(competitive.clone()),
            wrap(conversational.clone()),
        ];

        let (store, id) = session();
        let exec = Execution {
            sessions: &store,
            analysis_id: &id,
        };
        let results = exec.run(ExecutionStrategy::Adaptive, &agents, &input()).await;

        assert_eq!(results.len(), 3);
        for agent in [&competitive, &conversational] {
            assert_eq!(
                agent.inputs()[0]["recon_data"],
                json!({"reconnaissance_out": true})
            );
        }
        assert!(!recon.inputs()[0].contains_key("recon_data"));
    }

    #[tokio::test]
    async fn test_adaptive_without_recon_runs_all() {
        let competitive = Arc::new(RecordingAgent::new(AgentRole::CompetitiveIntelligence, true));
        let agents = vec![wrap(competitive.clone())];

        let (store, id) = session();
        let exec = Execution {
            sessions: &store,
            analysis_id: &id,
        };
        let results = exec.run(ExecutionStrategy::Adaptive, &agents, &input()).await;

        assert_eq!(results.len(), 1);
        assert!(!competitive.inputs()[0].contains_key("recon_data"));
    }
}
