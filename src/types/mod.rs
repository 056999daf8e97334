pub mod error;
pub mod utils;

pub use error::{ErrorCategory, ErrorClassifier, LlmError, PalmerError, Result};
pub use utils::{capitalize_first, enum_to_str, json_is_empty, json_string, json_string_array};

// =============================================================================
// Domain Newtypes
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type-safe wrapper for analysis session IDs
///
/// Prevents accidental mixing of analysis IDs with URLs and agent IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisId(String);

impl AnalysisId {
    /// Generate a fresh ID (`analysis_<uuid>`)
    pub fn generate() -> Self {
        Self(format!("analysis_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AnalysisId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AnalysisId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for AnalysisId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
