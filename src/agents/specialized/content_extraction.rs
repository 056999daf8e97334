//! Content Extraction Agent
//!
//! Pulls structured content from a page: title, meta description, heading
//! outline, visible prices, contact emails and a text excerpt.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use regex::Regex;
use scraper::Html;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::info;

use crate::agents::fetch::selector;
use crate::agents::specialized::reconnaissance::parse_target;
use crate::agents::{
    Agent, AgentConfig, AgentInput, AgentRole, AnalysisResult, PageFetcher, input_url,
};
use crate::evidence::{Evidence, EvidenceLevel, ReasoningStep, calculate_confidence};
use crate::types::{PalmerError, Result};

const EXCERPT_CHARS: usize = 500;
const MAX_HEADINGS: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExtractedContent {
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub headings: Vec<Heading>,
    pub prices: Vec<String>,
    pub contact_emails: Vec<String>,
    pub word_count: usize,
    pub link_count: usize,
    pub image_count: usize,
    pub text_excerpt: String,
}

fn regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| PalmerError::Validation(format!("Invalid pattern '{}': {}", pattern, e)))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract structured content from an HTML document
pub fn extract_content(html: &str) -> Result<ExtractedContent> {
    let document = Html::parse_document(html);

    let title = document
        .select(&selector("title")?)
        .next()
        .map(|t| collapse_whitespace(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let meta_description = document
        .select(&selector("meta[name=\"description\"]")?)
        .next()
        .and_then(|m| m.value().attr("content"))
        .map(collapse_whitespace)
        .filter(|d| !d.is_empty());

    let headings: Vec<Heading> = document
        .select(&selector("h1, h2, h3")?)
        .filter_map(|h| {
            let level = h.value().name().strip_prefix('h')?.parse().ok()?;
            let text = collapse_whitespace(&h.text().collect::<String>());
            (!text.is_empty()).then_some(Heading { level, text })
        })
        .take(MAX_HEADINGS)
        .collect();

    let skip = selector("script, style, noscript")?;
    let body_text = match document.select(&selector("body")?).next() {
        Some(body) => {
            let hidden: Vec<_> = body.select(&skip).map(|e| e.id()).collect();
            let mut text = String::new();
            for node in body.descendants() {
                if let Some(t) = node.value().as_text()
                    && !node.ancestors().any(|a| hidden.contains(&a.id()))
                {
                    text.push_str(t);
                    text.push(' ');
                }
            }
            collapse_whitespace(&text)
        }
        None => String::new(),
    };

    let price_re = regex(r"[$€£]\s?\d{1,3}(?:,\d{3})*(?:\.\d{2})?")?;
    let mut seen = BTreeSet::new();
    let prices: Vec<String> = price_re
        .find_iter(&body_text)
        .map(|m| m.as_str().replace(' ', ""))
        .filter(|p| seen.insert(p.clone()))
        .collect();

    let email_re = regex(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")?;
    let mut emails: BTreeSet<String> = email_re
        .find_iter(&body_text)
        .map(|m| m.as_str().to_lowercase())
        .collect();
    for link in document.select(&selector("a[href^=\"mailto:\"]")?) {
        if let Some(addr) = link
            .value()
            .attr("href")
            .and_then(|h| h.strip_prefix("mailto:"))
            .and_then(|a| a.split('?').next())
            .filter(|a| !a.is_empty())
        {
            emails.insert(addr.to_lowercase());
        }
    }

    Ok(ExtractedContent {
        title,
        meta_description,
        headings,
        prices,
        contact_emails: emails.into_iter().collect(),
        word_count: body_text.split_whitespace().count(),
        link_count: document.select(&selector("a[href]")?).count(),
        image_count: document.select(&selector("img")?).count(),
        text_excerpt: body_text.chars().take(EXCERPT_CHARS).collect(),
    })
}

pub struct ContentExtractionAgent {
    config: AgentConfig,
    fetcher: Arc<PageFetcher>,
}

impl ContentExtractionAgent {
    pub fn new(config: AgentConfig, fetcher: Arc<PageFetcher>) -> Self {
        Self { config, fetcher }
    }

    pub fn default_config() -> AgentConfig {
        AgentConfig::new(
            "content_001",
            "Content Extraction Specialist",
            AgentRole::ContentExtraction,
        )
        .with_description("Structured content extraction from target pages")
        .with_capabilities(&["text_extraction", "pricing_detection", "contact_discovery"])
        .with_techniques(&["chain_of_thought"])
    }
}

#[async_trait]
impl Agent for ContentExtractionAgent {
    fn config(&self) -> &AgentConfig {
        &self.config
    }

    async fn analyze(&self, input: &AgentInput) -> Result<AnalysisResult> {
        let start = Instant::now();

        let Some(raw_url) = input_url(input) else {
            return Ok(AnalysisResult::failure("URL is required for content extraction"));
        };
        let url = match parse_target(raw_url) {
            Ok(u) => u.to_string(),
            Err(msg) => return Ok(AnalysisResult::failure(msg)),
        };

        let page = self.fetcher.fetch(&url).await?;
        let content = extract_content(&page.body)?;

        info!(
            "Content extraction: {} ({} words, {} prices)",
            url,
            content.word_count,
            content.prices.len()
        );

        let summary = json!({
            "title": content.title,
            "word_count": content.word_count,
            "headings": content.headings.len(),
        });
        let mut evidence = vec![
            Evidence::new(
                "page_content",
                summary,
                url.as_str(),
                EvidenceLevel::DirectObservation,
            )
            .with_confidence(if content.word_count > 0 { 0.9 } else { 0.4 }),
        ];
        if !content.prices.is_empty() {
            evidence.push(
                Evidence::new(
                    "pricing",
                    json!(content.prices),
                    url.as_str(),
                    EvidenceLevel::DirectObservation,
                )
                .with_confidence(0.85),
            );
        }
        if !content.contact_emails.is_empty() {
            evidence.push(
                Evidence::new(
                    "contacts",
                    json!(content.contact_emails),
                    url.as_str(),
                    EvidenceLevel::DirectObservation,
                )
                .with_confidence(0.8),
            );
        }
        let confidence = calculate_confidence(&evidence);

        let reasoning = vec![
            ReasoningStep::new(
                "content_extraction",
                format!(
                    "Extracted {} headings and {} words",
                    content.headings.len(),
                    content.word_count
                ),
            )
            .with_evidence(evidence.clone()),
        ];

        let mut data = match serde_json::to_value(&content)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        data.insert("url".into(), Value::String(url));

        Ok(AnalysisResult::success(data, confidence)
            .with_evidence(evidence)
            .with_reasoning(reasoning)
            .with_metadata("analysis_duration", start.elapsed().as_secs_f64())
            .with_metadata("timestamp", chrono::Utc::now().to_rfc3339()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CachedResponse, ResponseCache};
    use crate::evidence::ConfidenceLevel;
    use std::collections::BTreeMap;

    const HTML: &str = r#"<html>
<head>
  <title>  Acme   Widgets </title>
  <meta name="description" content="The best widgets.">
  <style>.price { color: red }</style>
</head>
<body>
  <h1>Widgets</h1>
  <h2>Pricing</h2>
  <p>Starter plan $19.99 per month, Pro plan $1,299.00 per year.</p>
  <p>Starter again $19.99</p>
  <script>var hidden = "$5.00 ignored@example.com";</script>
  <h3></h3>
  <p>Write to Sales@Acme.test or <a href="mailto:support@acme.test?subject=hi">support</a>.</p>
  <img src="/a.png"><img src="/b.png">
</body>
</html>"#;

    #[test]
    fn test_extract_content() {
        let content = extract_content(HTML).unwrap();

        assert_eq!(content.title.as_deref(), Some("Acme Widgets"));
        assert_eq!(content.meta_description.as_deref(), Some("The best widgets."));
        assert_eq!(
            content.headings,
            vec![
                Heading { level: 1, text: "Widgets".into() },
                Heading { level: 2, text: "Pricing".into() },
            ]
        );
        assert_eq!(content.prices, vec!["$19.99", "$1,299.00"]);
        assert_eq!(
            content.contact_emails,
            vec!["sales@acme.test", "support@acme.test"]
        );
        assert_eq!(content.link_count, 1);
        assert_eq!(content.image_count, 2);
        assert!(!content.text_excerpt.contains("hidden"));
    }

    #[test]
    fn test_extract_empty_document() {
        let content = extract_content("").unwrap();
        assert_eq!(content.title, None);
        assert_eq!(content.word_count, 0);
        assert!(content.prices.is_empty());
    }

    #[tokio::test]
    async fn test_analyze_cached_page() {
        let cache = Arc::new(ResponseCache::in_memory());
        cache
            .put(CachedResponse {
                url: "https://shop.invalid/".into(),
                status: 200,
                headers: BTreeMap::new(),
                body: HTML.into(),
                fetched_at: chrono::Utc::now(),
                elapsed_ms: 10,
            })
            .await
            .unwrap();
        let fetcher =
            Arc::new(PageFetcher::new(&crate::agents::fetch::FetchConfig::default(), cache).unwrap());
        let agent = ContentExtractionAgent::new(ContentExtractionAgent::default_config(), fetcher);

        let input: AgentInput = json!({"url": "https://shop.invalid/"})
            .as_object()
            .cloned()
            .unwrap();
        let result = agent.analyze(&input).await.unwrap();

        assert!(result.success);
        assert_eq!(result.confidence, ConfidenceLevel::High);
        assert_eq!(result.data_field("title"), Some(&json!("Acme Widgets")));
        assert_eq!(result.evidence_trail.len(), 3);
    }

    #[tokio::test]
    async fn test_invalid_url_is_unsuccessful() {
        let fetcher = Arc::new(
            PageFetcher::new(
                &crate::agents::fetch::FetchConfig::default(),
                Arc::new(ResponseCache::in_memory()),
            )
            .unwrap(),
        );
        let agent = ContentExtractionAgent::new(ContentExtractionAgent::default_config(), fetcher);
        let input: AgentInput = json!({"url": "mailto:x@y.z"}).as_object().cloned().unwrap();

        let result = agent.analyze(&input).await.unwrap();
        assert!(!result.success);
    }
}
