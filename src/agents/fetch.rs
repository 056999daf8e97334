//! Shared page fetcher for site-facing agents.
//!
//! Wraps one `reqwest::Client` (fixed request timeout, user agent) and the
//! response cache so reconnaissance and content extraction reuse fetches of
//! the same URL.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use scraper::Selector;
use tracing::debug;

use crate::cache::{CachedResponse, ResponseCache};
use crate::constants::network as net_constants;
use crate::types::{PalmerError, Result};

/// HTTP settings for site fetches
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub max_body_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(net_constants::REQUEST_TIMEOUT_SECS),
            user_agent: net_constants::USER_AGENT.to_string(),
            max_body_bytes: net_constants::MAX_BODY_BYTES,
        }
    }
}

pub struct PageFetcher {
    client: reqwest::Client,
    cache: Arc<ResponseCache>,
    max_body_bytes: usize,
}

impl PageFetcher {
    pub fn new(config: &FetchConfig, cache: Arc<ResponseCache>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| PalmerError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            cache,
            max_body_bytes: config.max_body_bytes,
        })
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Fetch a page, serving fresh cached copies when available.
    ///
    /// Non-success statuses are errors so the caller's retry policy applies.
    pub async fn fetch(&self, url: &str) -> Result<CachedResponse> {
        match self.cache.get(url).await {
            Ok(Some(hit)) => return Ok(hit),
            Ok(None) => {}
            Err(e) => debug!("Ignoring unreadable cache entry for {}: {}", url, e),
        }

        let response = self.fetch_uncached(url).await?;

        if let Err(e) = self.cache.put(response.clone()).await {
            debug!("Failed to cache {}: {}", url, e);
        }

        Ok(response)
    }

    /// Fetch bypassing the cache
    pub async fn fetch_uncached(&self, url: &str) -> Result<CachedResponse> {
        let start = Instant::now();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PalmerError::fetch(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PalmerError::fetch_status(
                url,
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown"),
            ));
        }

        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PalmerError::fetch(url, format!("Failed to read body: {}", e)))?;

        let body = if bytes.len() > self.max_body_bytes {
            debug!(
                "Truncating body of {} ({} > {} bytes)",
                url,
                bytes.len(),
                self.max_body_bytes
            );
            String::from_utf8_lossy(&bytes[..self.max_body_bytes]).into_owned()
        } else {
            String::from_utf8_lossy(&bytes).into_owned()
        };

        Ok(CachedResponse {
            url: url.to_string(),
            status: status.as_u16(),
            headers,
            body,
            fetched_at: Utc::now(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Whether `url` answers with a success status. Errors count as absent.
    pub async fn probe(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("Probe failed for {}: {}", url, e);
                false
            }
        }
    }
}

/// Parse a CSS selector
pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| PalmerError::Validation(format!("Invalid selector '{}': {}", css, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetcher_builds() {
        let fetcher = PageFetcher::new(&FetchConfig::default(), Arc::new(ResponseCache::in_memory()));
        assert!(fetcher.is_ok());
    }

    #[test]
    fn test_selector_parse() {
        assert!(selector("nav a[href]").is_ok());
        assert!(selector("a[").is_err());
    }

    #[tokio::test]
    async fn test_fetch_serves_cached_copy() {
        let cache = Arc::new(ResponseCache::in_memory());
        let url = "https://cached.invalid/";
        cache
            .put(CachedResponse {
                url: url.to_string(),
                status: 200,
                headers: BTreeMap::new(),
                body: "<html><title>Cached</title></html>".to_string(),
                fetched_at: Utc::now(),
                elapsed_ms: 5,
            })
            .await
            .unwrap();

        let fetcher = PageFetcher::new(&FetchConfig::default(), cache).unwrap();
        let page = fetcher.fetch(url).await.unwrap();
        assert!(page.body.contains("Cached"));
    }
}
