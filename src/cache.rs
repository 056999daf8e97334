//! Page Response Cache
//!
//! Two-level cache for fetched target pages so agents analyzing the same
//! site share one fetch.
//!
//! ## Cache Levels
//!
//! 1. **Memory**: `DashMap` keyed by SHA-256 of the URL
//! 2. **File Cache**: optional JSON files (`<key>.json`) under a directory
//!
//! Entries expire after the configured TTL. Concurrent writers for the same
//! URL resolve as last-write-wins.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::constants::cache as cache_constants;
use crate::types::{PalmerError, Result};

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Entry lifetime in hours (default: 24)
    pub ttl_hours: u64,
    /// Directory for persisted entries; memory-only when `None`
    pub dir: Option<PathBuf>,
    /// Bodies larger than this are not cached
    pub max_content_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_hours: cache_constants::CACHE_EXPIRATION_HOURS,
            dir: None,
            max_content_size: cache_constants::MAX_CACHED_CONTENT_SIZE,
        }
    }
}

/// A cached HTTP response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedResponse {
    pub url: String,
    pub status: u16,
    /// Lower-cased header names
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
    /// Time to fetch, for performance metrics
    pub elapsed_ms: u64,
}

impl CachedResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}

/// Response cache manager
pub struct ResponseCache {
    config: CacheConfig,
    ttl: ChronoDuration,
    memory: DashMap<String, CachedResponse>,
}

impl ResponseCache {
    /// Create a cache; a TTL above one year is a configuration error
    pub fn new(config: CacheConfig) -> Result<Self> {
        let ttl = ttl_duration(config.ttl_hours)?;
        Ok(Self::with_ttl(config, ttl))
    }

    fn with_ttl(config: CacheConfig, ttl: ChronoDuration) -> Self {
        Self {
            config,
            ttl,
            memory: DashMap::new(),
        }
    }

    /// Memory-only cache with default TTL
    pub fn in_memory() -> Self {
        Self::with_ttl(CacheConfig::default(), default_ttl())
    }

    pub fn disabled() -> Self {
        Self::with_ttl(
            CacheConfig {
                enabled: false,
                ..CacheConfig::default()
            },
            default_ttl(),
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// SHA-256 hex digest of the URL
    pub fn cache_key(url: &str) -> String {
        format!("{:x}", Sha256::digest(url.as_bytes()))
    }

    fn cache_path(&self, key: &str) -> Option<PathBuf> {
        self.config
            .dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", key)))
    }

    fn is_fresh(&self, entry: &CachedResponse) -> bool {
        Utc::now() - entry.fetched_at < self.ttl
    }

    /// Look up a fresh entry, memory first then disk
    pub async fn get(&self, url: &str) -> Result<Option<CachedResponse>> {
        if !self.config.enabled {
            return Ok(None);
        }

        let key = Self::cache_key(url);

        if let Some(entry) = self.memory.get(&key).map(|e| e.value().clone()) {
            if self.is_fresh(&entry) {
                debug!("Cache hit (memory) for {}", url);
                return Ok(Some(entry));
            }
            self.memory.remove(&key);
        }

        let Some(path) = self.cache_path(&key) else {
            return Ok(None);
        };

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let entry: CachedResponse = serde_json::from_str(&content)
                    .map_err(|e| PalmerError::Cache(format!("Cache parse error: {}", e)))?;

                if !self.is_fresh(&entry) {
                    debug!("Cache entry expired for {}", url);
                    let _ = tokio::fs::remove_file(&path).await;
                    return Ok(None);
                }

                debug!("Cache hit (disk) for {}", url);
                self.memory.insert(key, entry.clone());
                Ok(Some(entry))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Store a response, replacing any previous entry for the URL
    pub async fn put(&self, response: CachedResponse) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }

        if response.body.len() > self.config.max_content_size {
            debug!(
                "Skipping cache for {} ({} bytes exceeds limit)",
                response.url,
                response.body.len()
            );
            return Ok(());
        }

        let key = Self::cache_key(&response.url);

        if let Some(path) = self.cache_path(&key) {
            if let Some(dir) = path.parent() {
                tokio::fs::create_dir_all(dir).await?;
            }
            let content = serde_json::to_string(&response)?;
            tokio::fs::write(&path, content).await?;
        }

        self.memory.insert(key, response);
        Ok(())
    }

    /// Remove one URL from both levels
    pub async fn invalidate(&self, url: &str) -> Result<bool> {
        let key = Self::cache_key(url);
        let mut removed = self.memory.remove(&key).is_some();

        if let Some(path) = self.cache_path(&key) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(removed)
    }

    /// Clear all entries
    pub async fn clear(&self) -> Result<usize> {
        let mut count = self.memory.len();
        self.memory.clear();

        if let Some(dir) = &self.config.dir {
            let mut entries = match tokio::fs::read_dir(dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(count),
                Err(e) => return Err(e.into()),
            };

            count = 0;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().is_some_and(|e| e == "json") {
                    tokio::fs::remove_file(&path).await?;
                    count += 1;
                }
            }
        }

        info!("Cleared {} cache entries", count);
        Ok(count)
    }

    pub fn memory_entries(&self) -> usize {
        self.memory.len()
    }
}

/// Convert configured hours into a chrono duration without overflow
pub fn ttl_duration(hours: u64) -> Result<ChronoDuration> {
    if hours > cache_constants::MAX_TTL_HOURS {
        return Err(PalmerError::Config(format!(
            "cache.ttl_hours must be at most {}, got {}",
            cache_constants::MAX_TTL_HOURS,
            hours
        )));
    }
    i64::try_from(hours)
        .ok()
        .and_then(ChronoDuration::try_hours)
        .ok_or_else(|| PalmerError::Config(format!("cache.ttl_hours out of range: {}", hours)))
}

fn default_ttl() -> ChronoDuration {
    ChronoDuration::hours(cache_constants::CACHE_EXPIRATION_HOURS as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn response(url: &str, body: &str) -> CachedResponse {
        CachedResponse {
            url: url.to_string(),
            status: 200,
            headers: BTreeMap::from([("server".to_string(), "nginx".to_string())]),
            body: body.to_string(),
            fetched_at: Utc::now(),
            elapsed_ms: 12,
        }
    }

    #[test]
    fn test_cache_key_is_sha256_hex() {
        let key = ResponseCache::cache_key("https://example.com");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, ResponseCache::cache_key("https://example.com"));
        assert_ne!(key, ResponseCache::cache_key("https://example.org"));
    }

    #[tokio::test]
    async fn test_memory_roundtrip_and_last_write_wins() {
        let cache = ResponseCache::in_memory();
        let url = "https://example.com";

        cache.put(response(url, "first")).await.unwrap();
        cache.put(response(url, "second")).await.unwrap();

        let hit = cache.get(url).await.unwrap().unwrap();
        assert_eq!(hit.body, "second");
        assert_eq!(hit.header("Server"), Some("nginx"));
        assert_eq!(cache.memory_entries(), 1);
    }

    #[tokio::test]
    async fn test_expired_entries_are_ignored() {
        let cache = ResponseCache::in_memory();
        let mut stale = response("https://old.example.com", "old");
        stale.fetched_at = Utc::now() - ChronoDuration::hours(25);

        cache.put(stale).await.unwrap();
        assert!(cache.get("https://old.example.com").await.unwrap().is_none());
        assert_eq!(cache.memory_entries(), 0);
    }

    #[tokio::test]
    async fn test_disk_persistence() {
        let temp = TempDir::new().unwrap();
        let config = CacheConfig {
            dir: Some(temp.path().join("cache")),
            ..CacheConfig::default()
        };
        let url = "https://example.com/pricing";

        ResponseCache::new(config.clone())
            .unwrap()
            .put(response(url, "<html></html>"))
            .await
            .unwrap();

        // Fresh instance reads from disk
        let cache = ResponseCache::new(config).unwrap();
        let hit = cache.get(url).await.unwrap().unwrap();
        assert_eq!(hit.body, "<html></html>");

        assert!(cache.invalidate(url).await.unwrap());
        assert!(cache.get(url).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disabled_cache() {
        let cache = ResponseCache::disabled();
        cache.put(response("https://a.com", "x")).await.unwrap();
        assert!(cache.get("https://a.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_body_not_cached() {
        let cache = ResponseCache::new(CacheConfig {
            max_content_size: 4,
            ..CacheConfig::default()
        })
        .unwrap();
        cache.put(response("https://a.com", "too long")).await.unwrap();
        assert!(cache.get("https://a.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_ttl_is_config_error() {
        let result = ResponseCache::new(CacheConfig {
            ttl_hours: u64::MAX / 2,
            ..CacheConfig::default()
        });
        assert!(matches!(result, Err(PalmerError::Config(_))));

        let cache = ResponseCache::new(CacheConfig {
            ttl_hours: cache_constants::MAX_TTL_HOURS,
            ..CacheConfig::default()
        })
        .unwrap();
        cache.put(response("https://a.com", "x")).await.unwrap();
        assert!(cache.get("https://a.com").await.unwrap().is_some());
    }
}
