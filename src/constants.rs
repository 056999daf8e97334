//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Circuit breaker constants
pub mod circuit_breaker {
    /// Number of failures before opening circuit
    pub const FAILURE_THRESHOLD: u32 = 5;

    /// Duration to wait before attempting recovery (seconds)
    pub const RECOVERY_TIMEOUT_SECS: u64 = 60;
}

/// Retry-with-backoff constants
pub mod retry {
    /// Maximum attempts per agent invocation (including the first)
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Delay before the first retry (milliseconds)
    pub const BASE_DELAY_MS: u64 = 1_000;

    /// Upper bound on any single retry delay (milliseconds)
    pub const MAX_DELAY_MS: u64 = 60_000;

    /// Backoff multiplier
    pub const EXPONENTIAL_BASE: f64 = 2.0;
}

/// Evidence and confidence scoring constants
pub mod confidence {
    /// Weight applied to direct observations (screenshots, API data, fetched pages)
    pub const DIRECT_OBSERVATION_WEIGHT: f64 = 1.0;

    /// Weight applied to verified third-party research
    pub const CREDIBLE_RESEARCH_WEIGHT: f64 = 0.85;

    /// Weight applied to conclusions inferred from multiple data points
    pub const PATTERN_RECOGNITION_WEIGHT: f64 = 0.70;

    /// Weight applied to expert assessment with uncertainty
    pub const INFORMED_SPECULATION_WEIGHT: f64 = 0.50;

    /// Scores at or above this are HIGH confidence
    pub const HIGH_THRESHOLD: f64 = 0.8;

    /// Scores at or above this (and below HIGH) are MEDIUM confidence
    pub const MEDIUM_THRESHOLD: f64 = 0.5;

    /// Numeric value of each level when averaging agent results
    pub const HIGH_SCORE: f64 = 0.9;
    pub const MEDIUM_SCORE: f64 = 0.6;
    pub const LOW_SCORE: f64 = 0.3;

    /// Minimum independent sources for a claim to be triangulated
    pub const MIN_TRIANGULATION_SOURCES: usize = 2;

    /// Outcomes considered when computing the historical calibration factor
    pub const CALIBRATION_WINDOW: usize = 50;

    /// Source fragments accepted as credible research
    pub const TRUSTED_DOMAINS: &[&str] = &[
        ".gov",
        ".edu",
        ".org",
        "reuters.com",
        "bloomberg.com",
        "wsj.com",
        "nature.com",
        "science.org",
        "ieee.org",
    ];

    /// Source prefixes that make a direct observation traceable
    pub const TRACEABLE_PREFIXES: &[&str] = &["http", "api:", "screenshot:"];
}

/// Cache constants
pub mod cache {
    /// Cache entry expiration (hours)
    pub const CACHE_EXPIRATION_HOURS: u64 = 24;

    /// Upper bound accepted for a configured TTL (one year)
    pub const MAX_TTL_HOURS: u64 = 24 * 365;

    /// Maximum size of a cached page body (bytes)
    pub const MAX_CACHED_CONTENT_SIZE: usize = 1024 * 1024;
}

/// Metrics constants
pub mod metrics {
    /// Samples retained per histogram
    pub const HISTOGRAM_CAPACITY: usize = 1_000;

    /// Histogram samples older than this are excluded from exports (seconds)
    pub const EXPORT_WINDOW_SECS: u64 = 300;
}

/// HTTP/Network constants
pub mod network {
    /// Per-request timeout for site fetches (seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Upper bound on a single agent attempt (seconds)
    pub const AGENT_TIMEOUT_SECS: u64 = 120;

    /// Timeout for LLM API requests (seconds)
    pub const LLM_TIMEOUT_SECS: u64 = 60;

    /// Maximum response body size accepted from target sites (5MB)
    pub const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

    /// User agent sent with every site fetch
    pub const USER_AGENT: &str = "Palmer Reconnaissance Agent/0.1";

    /// Sites whose reconnaissance findings stay available to collaborators
    pub const MAX_SHARED_FINDINGS: usize = 256;
}
