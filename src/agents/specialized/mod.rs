//! Specialized agents
//!
//! | Role | Agent | Needs |
//! |------|-------|-------|
//! | reconnaissance | [`ReconnaissanceAgent`] | page fetcher |
//! | competitive_intelligence | [`CompetitiveIntelligenceAgent`] | recon data or `competitors` input |
//! | content_extraction | [`ContentExtractionAgent`] | page fetcher |
//! | conversational | [`ConversationalAgent`] | optional LLM key |

pub mod competitive;
pub mod content_extraction;
pub mod conversational;
pub mod reconnaissance;

use std::sync::Arc;

pub use competitive::CompetitiveIntelligenceAgent;
pub use content_extraction::ContentExtractionAgent;
pub use conversational::{ChatClient, ConversationalAgent};
pub use reconnaissance::ReconnaissanceAgent;

use super::{Agent, PageFetcher};
use crate::cache::ResponseCache;
use crate::config::Config;
use crate::types::Result;

/// Build one agent per role with default identities.
///
/// Site-facing agents share a single fetcher and cache.
pub fn standard_agents(config: &Config) -> Result<Vec<Arc<dyn Agent>>> {
    let cache = Arc::new(ResponseCache::new(config.cache.cache_config())?);
    let fetcher = Arc::new(PageFetcher::new(&config.http.fetch_config(), cache)?);
    let chat = ChatClient::from_config(&config.llm)?;

    Ok(vec![
        Arc::new(ReconnaissanceAgent::new(
            ReconnaissanceAgent::default_config(),
            Arc::clone(&fetcher),
        )),
        Arc::new(CompetitiveIntelligenceAgent::new(
            CompetitiveIntelligenceAgent::default_config(),
        )),
        Arc::new(ContentExtractionAgent::new(
            ContentExtractionAgent::default_config(),
            fetcher,
        )),
        Arc::new(ConversationalAgent::new(
            ConversationalAgent::default_config(),
            chat,
        )),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentRole;

    #[test]
    fn test_standard_agents_cover_every_role() {
        let mut config = Config::default();
        config.llm.provider = "none".into();

        let agents = standard_agents(&config).unwrap();
        let roles: Vec<AgentRole> = agents.iter().map(|a| a.config().role).collect();
        assert_eq!(roles, AgentRole::ALL.to_vec());

        let ids: Vec<&str> = agents.iter().map(|a| a.config().agent_id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["recon_001", "competitive_001", "content_001", "conversational_001"]
        );
    }
}
