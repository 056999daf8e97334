//! Reconnaissance Agent
//!
//! Maps a target site: navigation structure, technology fingerprint,
//! content overview and basic performance figures.
//!
//! ## Phases
//!
//! 1. Fetch homepage (transient failures propagate for retry)
//! 2. Inspect HTML: same-host navigation links, external domains, tech markers
//! 3. Probe `/sitemap.xml` and `/robots.txt`
//! 4. Score evidence into a confidence level

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use dashmap::DashMap;
use scraper::Html;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::info;
use url::Url;

use crate::agents::fetch::selector;
use crate::agents::{
    Agent, AgentConfig, AgentInput, AgentMessage, AgentRole, AnalysisResult, MessageType,
    PageFetcher, input_url,
};
use crate::cache::CachedResponse;
use crate::constants::network as net_constants;
use crate::evidence::{Evidence, EvidenceLevel, ReasoningStep, calculate_confidence};
use crate::types::Result;

/// Pages linked from a site's navigation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SiteStructure {
    pub homepage: String,
    pub pages: Vec<PageLink>,
    /// Hosts linked from the page that differ from the target
    pub external_domains: Vec<String>,
    pub sitemap: Option<String>,
    pub robots_txt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageLink {
    pub url: String,
    pub text: String,
    #[serde(rename = "type")]
    pub link_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TechStack {
    pub frontend: Vec<String>,
    pub backend: Vec<String>,
    pub cms: Option<String>,
    pub analytics: Vec<String>,
    pub frameworks: Vec<String>,
}

impl TechStack {
    /// Every detected technology name, deduplicated
    pub fn all(&self) -> BTreeSet<String> {
        self.frontend
            .iter()
            .chain(&self.backend)
            .chain(&self.analytics)
            .chain(&self.frameworks)
            .chain(self.cms.iter())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceMetrics {
    pub response_time: f64,
    pub page_size: usize,
    pub resource_count: usize,
}

/// Results of inspecting one HTML document
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PageInspection {
    pub pages: Vec<PageLink>,
    pub external_domains: Vec<String>,
    pub tech_stack: TechStack,
    pub resource_count: usize,
}

pub struct ReconnaissanceAgent {
    config: AgentConfig,
    fetcher: Arc<PageFetcher>,
    /// Latest findings per URL, served to collaborating agents
    findings: DashMap<String, (Instant, Map<String, Value>)>,
    max_findings: usize,
}

impl ReconnaissanceAgent {
    pub fn new(config: AgentConfig, fetcher: Arc<PageFetcher>) -> Self {
        Self {
            config,
            fetcher,
            findings: DashMap::new(),
            max_findings: net_constants::MAX_SHARED_FINDINGS,
        }
    }

    pub fn default_config() -> AgentConfig {
        AgentConfig::new(
            "recon_001",
            "Strategic Reconnaissance Specialist",
            AgentRole::Reconnaissance,
        )
        .with_description("Comprehensive website analysis and mapping")
        .with_capabilities(&["site_mapping", "technology_detection", "performance_assessment"])
        .with_techniques(&["chain_of_thought", "expert_persona"])
    }

    fn cached_field(&self, url: Option<&str>, key: &str) -> Value {
        url.and_then(|u| self.findings.get(u))
            .and_then(|f| f.1.get(key).cloned())
            .unwrap_or(Value::Null)
    }

    /// Keep findings for `url`, evicting the oldest site once full
    fn remember(&self, url: &str, data: Map<String, Value>) {
        if !self.findings.contains_key(url) && self.findings.len() >= self.max_findings {
            let oldest = self
                .findings
                .iter()
                .min_by_key(|entry| entry.value().0)
                .map(|entry| entry.key().clone());
            if let Some(oldest) = oldest {
                self.findings.remove(&oldest);
            }
        }
        self.findings
            .insert(url.to_string(), (Instant::now(), data));
    }
}

#[async_trait]
impl Agent for ReconnaissanceAgent {
    fn config(&self) -> &AgentConfig {
        &self.config
    }

    async fn analyze(&self, input: &AgentInput) -> Result<AnalysisResult> {
        let start = Instant::now();

        let Some(raw_url) = input_url(input) else {
            return Ok(AnalysisResult::failure("URL is required for reconnaissance"));
        };
        let base = match parse_target(raw_url) {
            Ok(u) => u,
            Err(msg) => return Ok(AnalysisResult::failure(msg)),
        };
        let url = base.as_str().to_string();

        info!("Reconnaissance: mapping {}", url);

        let page = self.fetcher.fetch(&url).await?;
        let inspection = inspect_page(&page, &base)?;

        let sitemap = base.join("/sitemap.xml").ok().map(String::from);
        let robots = base.join("/robots.txt").ok().map(String::from);
        let (has_sitemap, has_robots) = tokio::join!(
            probe_opt(&self.fetcher, sitemap.as_deref()),
            probe_opt(&self.fetcher, robots.as_deref()),
        );

        let structure = SiteStructure {
            homepage: url.clone(),
            pages: inspection.pages,
            external_domains: inspection.external_domains,
            sitemap: sitemap.filter(|_| has_sitemap),
            robots_txt: robots.filter(|_| has_robots),
        };

        let page_count = structure.pages.len();
        let content_analysis = json!({
            "page_count": page_count,
            "has_sitemap": structure.sitemap.is_some(),
            "has_robots_txt": structure.robots_txt.is_some(),
            "content_types": ["navigation", "informational", "transactional"],
            "structure_quality": if page_count > 5 { "good" } else { "basic" },
        });

        let performance = PerformanceMetrics {
            response_time: page.elapsed_ms as f64 / 1000.0,
            page_size: page.body.len(),
            resource_count: inspection.resource_count,
        };

        let site_structure = serde_json::to_value(&structure)?;
        let technology_stack = serde_json::to_value(&inspection.tech_stack)?;
        let performance_metrics = serde_json::to_value(&performance)?;

        let evidence = vec![
            Evidence::new(
                "site_structure",
                json!({"pages": page_count}),
                url.as_str(),
                EvidenceLevel::DirectObservation,
            )
            .with_confidence(0.9),
            Evidence::new(
                "tech_detection",
                technology_stack.clone(),
                url.as_str(),
                EvidenceLevel::DirectObservation,
            )
            .with_confidence(0.85),
            Evidence::new(
                "content_analysis",
                content_analysis.clone(),
                url.as_str(),
                EvidenceLevel::DirectObservation,
            )
            .with_confidence(0.88),
            Evidence::new(
                "performance",
                performance_metrics.clone(),
                url.as_str(),
                EvidenceLevel::DirectObservation,
            )
            .with_confidence(0.82),
        ];
        let confidence = calculate_confidence(&evidence);

        let reasoning = vec![
            ReasoningStep::new(
                "site_mapping",
                format!("Found {} navigation pages on the homepage", page_count),
            )
            .with_evidence(evidence[..1].to_vec()),
            ReasoningStep::new(
                "technology_detection",
                format!(
                    "Detected {} technologies from headers and markup",
                    inspection.tech_stack.all().len()
                ),
            )
            .with_evidence(evidence[1..2].to_vec()),
            ReasoningStep::new("performance_assessment", "Measured homepage fetch")
                .with_evidence(evidence[3..].to_vec()),
        ];

        let mut data = Map::new();
        data.insert("url".into(), Value::String(url.clone()));
        data.insert("site_structure".into(), site_structure);
        data.insert("technology_stack".into(), technology_stack);
        data.insert("content_analysis".into(), content_analysis);
        data.insert("performance_metrics".into(), performance_metrics);

        self.remember(&url, data.clone());

        let elapsed = start.elapsed().as_secs_f64();
        info!(
            "Reconnaissance: {} complete ({} pages, {:.2}s)",
            url, page_count, elapsed
        );

        Ok(AnalysisResult::success(data, confidence)
            .with_evidence(evidence)
            .with_reasoning(reasoning)
            .with_metadata("analysis_duration", elapsed)
            .with_metadata("timestamp", chrono::Utc::now().to_rfc3339()))
    }

    async fn collaborate(&self, message: &AgentMessage) -> Option<AgentMessage> {
        let url = message.content_str("url");
        let content = match message.message_type {
            MessageType::RequestSiteData => {
                json!({"site_data": self.cached_field(url, "site_structure")})
            }
            MessageType::RequestTechStack => {
                json!({"tech_stack": self.cached_field(url, "technology_stack")})
            }
            _ => return None,
        };
        message.reply(&self.config.agent_id, content)
    }
}

/// Parse and check an http(s) target URL
pub(crate) fn parse_target(raw: &str) -> std::result::Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| format!("Invalid URL '{}': {}", raw, e))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(format!("Unsupported URL '{}': expected http(s) with a host", raw)),
    }
}

async fn probe_opt(fetcher: &PageFetcher, url: Option<&str>) -> bool {
    match url {
        Some(u) => fetcher.probe(u).await,
        None => false,
    }
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// Extract links and technology markers from a fetched page
pub(crate) fn inspect_page(page: &CachedResponse, base: &Url) -> Result<PageInspection> {
    let document = Html::parse_document(&page.body);
    let target_host = base.host_str().map(strip_www).unwrap_or_default();

    let mut pages: Vec<PageLink> = Vec::new();
    for link in document.select(&selector("nav a[href], header a[href]")?) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Ok(abs) = base.join(href) else {
            continue;
        };
        if abs.host_str().map(strip_www) == Some(target_host)
            && !pages.iter().any(|p| p.url == abs.as_str())
        {
            pages.push(PageLink {
                url: abs.to_string(),
                text: link.text().collect::<String>().trim().to_string(),
                link_type: "navigation".to_string(),
            });
        }
    }

    let mut external: BTreeSet<String> = BTreeSet::new();
    for link in document.select(&selector("a[href]")?) {
        if let Some(href) = link.value().attr("href")
            && let Ok(abs) = base.join(href)
            && matches!(abs.scheme(), "http" | "https")
            && let Some(host) = abs.host_str().map(strip_www)
            && host != target_host
        {
            external.insert(host.to_string());
        }
    }

    let mut tech = TechStack::default();

    if let Some(powered_by) = page.header("x-powered-by") {
        push_unique(&mut tech.backend, powered_by);
    }
    if let Some(server) = page.header("server") {
        push_unique(&mut tech.backend, server);
    }

    if document
        .select(&selector("[data-reactroot], [data-react-root]")?)
        .next()
        .is_some()
    {
        push_unique(&mut tech.frameworks, "React");
    }
    if document
        .select(&selector("#__next, script#__NEXT_DATA__")?)
        .next()
        .is_some()
    {
        push_unique(&mut tech.frameworks, "React");
        push_unique(&mut tech.frameworks, "Next.js");
    }
    if document
        .select(&selector("[ng-app], [ng-version]")?)
        .next()
        .is_some()
    {
        push_unique(&mut tech.frameworks, "Angular");
    }
    if document
        .select(&selector("*")?)
        .any(|el| el.value().attrs().any(|(name, _)| name.starts_with("data-v-")))
    {
        push_unique(&mut tech.frameworks, "Vue.js");
    }

    if let Some(generator) = document
        .select(&selector("meta[name=\"generator\"]")?)
        .next()
        .and_then(|m| m.value().attr("content"))
    {
        let cms = if generator.to_lowercase().contains("wordpress") {
            "WordPress"
        } else {
            generator
        };
        tech.cms = Some(cms.to_string());
    }
    if tech.cms.is_none() {
        if page.body.contains("/wp-content/") {
            tech.cms = Some("WordPress".to_string());
        } else if page.body.contains("cdn.shopify.com") {
            tech.cms = Some("Shopify".to_string());
        }
    }

    for script in document.select(&selector("script[src]")?) {
        let Some(src) = script.value().attr("src") else {
            continue;
        };
        if src.contains("google-analytics.com") || src.contains("googletagmanager.com") {
            push_unique(&mut tech.analytics, "Google Analytics");
        } else if src.contains("segment.com") {
            push_unique(&mut tech.analytics, "Segment");
        } else if src.contains("hotjar.com") {
            push_unique(&mut tech.analytics, "Hotjar");
        } else if src.contains("jquery") {
            push_unique(&mut tech.frontend, "jQuery");
        } else if src.contains("bootstrap") {
            push_unique(&mut tech.frontend, "Bootstrap");
        }
    }

    let resource_count = document.select(&selector("img, script, link")?).count();

    Ok(PageInspection {
        pages,
        external_domains: external.into_iter().collect(),
        tech_stack: tech,
        resource_count,
    })
}
