//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//! Provides error classification so agents and the CLI can tell transient
//! failures (worth retrying) from structural ones.
//!
//! ## Error Categories
//!
//! - **Transient**: Temporary issues that may resolve (retry)
//! - **RateLimit**: Target site or API rate limiting (wait and retry)
//! - **Auth**: Authentication failures (fail fast)
//! - **Network**: Connectivity issues (retry with backoff)
//! - **Unavailable**: Target or provider unavailable
//!
//! ## Propagation
//!
//! Agent failures are recovered inside `ProductionAgent` and never reach
//! the coordinator as errors. Only coordinator misuse and configuration
//! problems escape the core.

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Error categories used for logging and retry hints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rate limited - wait then retry
    RateLimit,
    /// Authentication failed - don't retry
    Auth,
    /// Network/connectivity issues - retry with backoff
    Network,
    /// Target unavailable
    Unavailable,
    /// Invalid request - don't retry, fix request
    BadRequest,
    /// Parsing a response failed
    ParseError,
    /// Temporary server issues - retry
    Transient,
    /// Unknown error - conservative retry
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Auth => write!(f, "AUTH"),
            Self::Network => write!(f, "NETWORK"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::ParseError => write!(f, "PARSE_ERROR"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl ErrorCategory {
    /// Check if this category is worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::Network | Self::Transient | Self::ParseError | Self::Unknown
        )
    }
}

// =============================================================================
// LLM Error
// =============================================================================

/// LLM error with category, context, and retry hints
#[derive(Debug, Clone)]
pub struct LlmError {
    /// Error category for routing decisions
    pub category: ErrorCategory,
    /// Detailed error message
    pub message: String,
    /// Provider that produced the error
    pub provider: Option<String>,
    /// Suggested wait time before retry (if applicable)
    pub retry_after: Option<Duration>,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{}:{}] {}", provider, self.category, self.message)
        } else {
            write!(f, "[{}] {}", self.category, self.message)
        }
    }
}

impl std::error::Error for LlmError {}

impl LlmError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            provider: None,
            retry_after: None,
        }
    }

    pub fn with_provider(
        category: ErrorCategory,
        message: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            provider: Some(provider.into()),
            retry_after: None,
        }
    }

    /// Add suggested retry delay
    pub fn retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Classifies raw failure messages and HTTP statuses into categories
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify an error message from any provider or site
    pub fn classify(message: &str, provider: &str) -> LlmError {
        let lower = message.to_lowercase();

        if lower.contains("rate limit")
            || lower.contains("429")
            || lower.contains("too many requests")
            || lower.contains("quota exceeded")
        {
            return LlmError::with_provider(ErrorCategory::RateLimit, message, provider)
                .retry_after(Duration::from_secs(30));
        }

        if lower.contains("401")
            || lower.contains("403")
            || lower.contains("api key")
            || lower.contains("unauthorized")
            || lower.contains("forbidden")
        {
            return LlmError::with_provider(ErrorCategory::Auth, message, provider);
        }

        if lower.contains("network")
            || lower.contains("connection")
            || lower.contains("dns")
            || lower.contains("timeout")
            || lower.contains("timed out")
            || lower.contains("unreachable")
        {
            return LlmError::with_provider(ErrorCategory::Network, message, provider)
                .retry_after(Duration::from_secs(5));
        }

        if lower.contains("503")
            || lower.contains("502")
            || lower.contains("service unavailable")
            || lower.contains("not found")
        {
            return LlmError::with_provider(ErrorCategory::Unavailable, message, provider);
        }

        if lower.contains("400") || lower.contains("bad request") || lower.contains("malformed") {
            return LlmError::with_provider(ErrorCategory::BadRequest, message, provider);
        }

        if lower.contains("parse") || lower.contains("json") || lower.contains("unexpected token")
        {
            return LlmError::with_provider(ErrorCategory::ParseError, message, provider)
                .retry_after(Duration::from_secs(1));
        }

        if lower.contains("retry") || lower.contains("temporary") || lower.contains("overloaded") {
            return LlmError::with_provider(ErrorCategory::Transient, message, provider)
                .retry_after(Duration::from_secs(2));
        }

        LlmError::with_provider(ErrorCategory::Unknown, message, provider)
    }

    /// Classify HTTP status code directly (more accurate than string matching)
    pub fn classify_http_status(status: u16, message: &str, provider: &str) -> LlmError {
        match status {
            429 => LlmError::with_provider(ErrorCategory::RateLimit, message, provider)
                .retry_after(Duration::from_secs(30)),
            401 | 403 => LlmError::with_provider(ErrorCategory::Auth, message, provider),
            400 => LlmError::with_provider(ErrorCategory::BadRequest, message, provider),
            500 | 502 | 503 | 504 => {
                LlmError::with_provider(ErrorCategory::Transient, message, provider)
                    .retry_after(Duration::from_secs(5))
            }
            404 => LlmError::with_provider(ErrorCategory::Unavailable, message, provider),
            _ => LlmError::with_provider(ErrorCategory::Unknown, message, provider),
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum PalmerError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // -------------------------------------------------------------------------
    // Agent Errors
    // -------------------------------------------------------------------------
    /// Failure raised inside an agent's analysis
    #[error("Agent {agent} failed: {message}")]
    Agent { agent: String, message: String },

    /// Target site fetch failure
    #[error("Fetch failed for {url}: {message}")]
    Fetch {
        url: String,
        message: String,
        category: ErrorCategory,
    },

    /// Structured LLM error with category and retry hints
    #[error("LLM error: {0}")]
    Llm(LlmError),

    /// Operation timeout with context
    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// Circuit breaker rejected the call without running it
    #[error("Circuit breaker is OPEN for {agent}")]
    CircuitOpen { agent: String },

    // -------------------------------------------------------------------------
    // Structural Errors
    // -------------------------------------------------------------------------
    /// Coordinator misuse (unknown analysis type, unregistered role)
    #[error("Coordinator error: {0}")]
    Coordinator(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

impl From<LlmError> for PalmerError {
    fn from(err: LlmError) -> Self {
        PalmerError::Llm(err)
    }
}

pub type Result<T> = std::result::Result<T, PalmerError>;

impl PalmerError {
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    pub fn agent(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Agent {
            agent: agent.into(),
            message: message.into(),
        }
    }

    /// Fetch failure categorized from its message
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let category = ErrorClassifier::classify(&message, "site").category;
        Self::Fetch {
            url: url.into(),
            message,
            category,
        }
    }

    /// Fetch failure categorized from a non-success HTTP status
    pub fn fetch_status(url: impl Into<String>, status: u16, reason: &str) -> Self {
        let classified =
            ErrorClassifier::classify_http_status(status, &format!("HTTP {} {}", status, reason), "site");
        Self::Fetch {
            url: url.into(),
            message: classified.message,
            category: classified.category,
        }
    }

    /// Classify this error for logging and retry hints
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Io(_) => ErrorCategory::Network,
            Self::Json(_) | Self::Yaml(_) => ErrorCategory::ParseError,
            Self::Http(e) => match e.status() {
                Some(status) => {
                    ErrorClassifier::classify_http_status(status.as_u16(), "", "http").category
                }
                None if e.is_timeout() || e.is_connect() => ErrorCategory::Network,
                None => ErrorCategory::Unknown,
            },
            Self::Llm(e) => e.category,
            Self::Fetch { category, .. } => *category,
            Self::Agent { message, .. } => ErrorClassifier::classify(message, "agent").category,
            Self::Timeout { .. } => ErrorCategory::Network,
            Self::CircuitOpen { .. } => ErrorCategory::Unavailable,
            Self::Coordinator(_) | Self::Config(_) | Self::Validation(_) => {
                ErrorCategory::BadRequest
            }
            Self::Cache(_) => ErrorCategory::Unknown,
        }
    }

    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        self.category().is_retryable()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::RateLimit.to_string(), "RATE_LIMIT");
        assert_eq!(ErrorCategory::Auth.to_string(), "AUTH");
    }

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::RateLimit.is_retryable());
        assert!(ErrorCategory::Network.is_retryable());
        assert!(ErrorCategory::Transient.is_retryable());
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::BadRequest.is_retryable());
    }

    #[test]
    fn test_classify_rate_limit() {
        let err = ErrorClassifier::classify("Rate limit exceeded, please retry", "openai");
        assert_eq!(err.category, ErrorCategory::RateLimit);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_classify_network() {
        let err = ErrorClassifier::classify("Connection timed out after 30s", "site");
        assert_eq!(err.category, ErrorCategory::Network);
        assert_eq!(err.retry_after, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_classify_unknown() {
        let err = ErrorClassifier::classify("Something weird happened", "test");
        assert_eq!(err.category, ErrorCategory::Unknown);
    }

    #[test]
    fn test_classify_http_status() {
        let rate_limit = ErrorClassifier::classify_http_status(429, "Rate limited", "test");
        assert_eq!(rate_limit.category, ErrorCategory::RateLimit);

        let auth = ErrorClassifier::classify_http_status(403, "Forbidden", "test");
        assert_eq!(auth.category, ErrorCategory::Auth);

        let server_error = ErrorClassifier::classify_http_status(502, "Bad gateway", "test");
        assert_eq!(server_error.category, ErrorCategory::Transient);
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(!PalmerError::Coordinator("unknown analysis type".into()).is_recoverable());
        assert!(!PalmerError::agent("openai", "Invalid API key").is_recoverable());
        assert!(PalmerError::fetch("https://a.com", "connection reset").is_recoverable());
        assert!(!PalmerError::Config("bad".into()).is_recoverable());
    }

    #[test]
    fn test_fetch_status_keeps_category() {
        let missing = PalmerError::fetch_status("https://a.com/x", 404, "Not Found");
        assert_eq!(missing.category(), ErrorCategory::Unavailable);
        assert!(!missing.is_recoverable());
        assert_eq!(missing.to_string(), "Fetch failed for https://a.com/x: HTTP 404 Not Found");

        let overloaded = PalmerError::fetch_status("https://a.com", 503, "Service Unavailable");
        assert_eq!(overloaded.category(), ErrorCategory::Transient);
        assert!(overloaded.is_recoverable());

        let blocked = PalmerError::fetch_status("https://a.com", 403, "Forbidden");
        assert_eq!(blocked.category(), ErrorCategory::Auth);
    }

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::with_provider(ErrorCategory::RateLimit, "Too many requests", "openai");
        assert_eq!(err.to_string(), "[openai:RATE_LIMIT] Too many requests");

        let err_no_provider = LlmError::new(ErrorCategory::Network, "Connection failed");
        assert_eq!(err_no_provider.to_string(), "[NETWORK] Connection failed");
    }
}
