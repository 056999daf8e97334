//! Analysis session arena.
//!
//! Sessions live in memory keyed by [`AnalysisId`] and change only through
//! the transition methods on [`SessionStore`]. `InProgress` moves to
//! `Completed` or `Failed`; both are terminal.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::synthesis::Synthesis;
use super::{AnalysisRequest, AnalysisType, ExecutionStrategy};
use crate::agents::{AgentRole, AnalysisResult};
use crate::evidence::ConfidenceLevel;
use crate::types::AnalysisId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSession {
    pub analysis_id: AnalysisId,
    pub target_url: String,
    pub analysis_type: AnalysisType,
    pub strategy: ExecutionStrategy,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub expected_agents: Vec<AgentRole>,
    pub agent_results: BTreeMap<AgentRole, AnalysisResult>,
    pub status: SessionStatus,
    pub error: Option<String>,
    pub synthesis: Option<Synthesis>,
    pub confidence: Option<ConfidenceLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

/// Snapshot returned by status queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisStatus {
    pub analysis_id: AnalysisId,
    pub status: SessionStatus,
    pub progress: Progress,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Present once the session completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<BTreeMap<AgentRole, AnalysisResult>>,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<AnalysisId, AnalysisSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new in-progress session
    pub fn begin(&self, request: &AnalysisRequest) -> AnalysisId {
        let analysis_id = AnalysisId::generate();
        self.sessions.insert(
            analysis_id.clone(),
            AnalysisSession {
                analysis_id: analysis_id.clone(),
                target_url: request.target_url.clone(),
                analysis_type: request.analysis_type,
                strategy: request.strategy,
                started_at: Utc::now(),
                ended_at: None,
                expected_agents: Vec::new(),
                agent_results: BTreeMap::new(),
                status: SessionStatus::InProgress,
                error: None,
                synthesis: None,
                confidence: None,
            },
        );
        analysis_id
    }

    /// Apply `f` to an in-progress session. Returns false for unknown or
    /// finished sessions.
    fn transition(&self, id: &AnalysisId, action: &str, f: impl FnOnce(&mut AnalysisSession)) -> bool {
        match self.sessions.get_mut(id) {
            Some(mut session) if !session.status.is_terminal() => {
                f(&mut session);
                true
            }
            Some(session) => {
                warn!(
                    "Ignoring {} for {} session {}",
                    action,
                    crate::types::enum_to_str(&session.status),
                    id
                );
                false
            }
            None => {
                warn!("Ignoring {} for unknown session {}", action, id);
                false
            }
        }
    }

    pub fn set_expected_agents(&self, id: &AnalysisId, roles: Vec<AgentRole>) -> bool {
        self.transition(id, "agent selection", |s| s.expected_agents = roles)
    }

    pub fn record_agent_result(&self, id: &AnalysisId, role: AgentRole, result: AnalysisResult) -> bool {
        self.transition(id, "agent result", |s| {
            s.agent_results.insert(role, result);
        })
    }

    pub fn complete(&self, id: &AnalysisId, synthesis: Synthesis, confidence: ConfidenceLevel) -> bool {
        self.transition(id, "completion", |s| {
            s.status = SessionStatus::Completed;
            s.ended_at = Some(Utc::now());
            s.synthesis = Some(synthesis);
            s.confidence = Some(confidence);
        })
    }

    pub fn fail(&self, id: &AnalysisId, error: impl Into<String>) -> bool {
        let error = error.into();
        self.transition(id, "failure", |s| {
            s.status = SessionStatus::Failed;
            s.ended_at = Some(Utc::now());
            s.error = Some(error);
        })
    }

    pub fn get(&self, id: &AnalysisId) -> Option<AnalysisSession> {
        self.sessions.get(id).map(|s| s.clone())
    }

    pub fn status(&self, id: &AnalysisId) -> Option<AnalysisStatus> {
        self.sessions.get(id).map(|s| AnalysisStatus {
            analysis_id: s.analysis_id.clone(),
            status: s.status,
            progress: Progress {
                completed: s.agent_results.len(),
                total: s.expected_agents.len(),
            },
            started_at: s.started_at,
            ended_at: s.ended_at,
            error: s.error.clone(),
            results: (s.status == SessionStatus::Completed).then(|| s.agent_results.clone()),
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn in_progress(&self) -> usize {
        self.sessions
            .iter()
            .filter(|s| s.status == SessionStatus::InProgress)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn request() -> AnalysisRequest {
        AnalysisRequest::new("https://acme.com")
    }

    #[test]
    fn test_lifecycle() {
        let store = SessionStore::new();
        let id = store.begin(&request());
        assert!(id.as_str().starts_with("analysis_"));
        assert_eq!(store.in_progress(), 1);

        store.set_expected_agents(&id, vec![AgentRole::Reconnaissance, AgentRole::Conversational]);
        store.record_agent_result(
            &id,
            AgentRole::Reconnaissance,
            AnalysisResult::success(Map::new(), ConfidenceLevel::High),
        );

        let status = store.status(&id).unwrap();
        assert_eq!(status.status, SessionStatus::InProgress);
        assert_eq!(status.progress, Progress { completed: 1, total: 2 });
        assert!(status.results.is_none());

        assert!(store.complete(&id, Synthesis::default(), ConfidenceLevel::High));
        let status = store.status(&id).unwrap();
        assert_eq!(status.status, SessionStatus::Completed);
        assert_eq!(status.results.unwrap().len(), 1);
        assert!(status.ended_at.is_some());
        assert_eq!(store.in_progress(), 0);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let store = SessionStore::new();
        let id = store.begin(&request());

        assert!(store.fail(&id, "No agent registered"));
        assert!(!store.complete(&id, Synthesis::default(), ConfidenceLevel::Low));
        assert!(!store.record_agent_result(
            &id,
            AgentRole::Reconnaissance,
            AnalysisResult::failure("late")
        ));

        let session = store.get(&id).unwrap();
        assert_eq!(session.status, SessionStatus::Failed);
        assert_eq!(session.error.as_deref(), Some("No agent registered"));
        assert!(session.agent_results.is_empty());
    }

    #[test]
    fn test_unknown_session() {
        let store = SessionStore::new();
        let id = AnalysisId::new("analysis_missing");
        assert!(store.status(&id).is_none());
        assert!(!store.fail(&id, "x"));
    }
}
