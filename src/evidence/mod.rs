//! Evidence and confidence model.
//!
//! Agents attach [`Evidence`] to their results; the helpers here validate
//! items, weight them by [`EvidenceLevel`], bucket the score into a
//! [`ConfidenceLevel`] and cross-check claims across sources.

pub mod calibration;
pub mod triangulation;
pub mod validation;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::confidence as conf_constants;

pub use calibration::ConfidenceCalibrator;
pub use triangulation::{
    ConflictingClaim, ContentConflict, SingleSourceClaim, Triangulation, VerifiedClaim,
    triangulate,
};
pub use validation::{
    EvidenceIssue, ReasoningStep, TrailEntry, ValidatedEvidence, calculate_confidence,
    calculate_evidence_strength, generate_evidence_trail, validate_evidence,
};

/// How directly an evidence item was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceLevel {
    /// Screenshot, fetched page, direct API data
    DirectObservation,
    /// Verified third-party source
    CredibleResearch,
    /// Inferred from multiple data points
    PatternRecognition,
    /// Expert assessment with uncertainty
    InformedSpeculation,
}

impl EvidenceLevel {
    pub fn weight(self) -> f64 {
        match self {
            Self::DirectObservation => conf_constants::DIRECT_OBSERVATION_WEIGHT,
            Self::CredibleResearch => conf_constants::CREDIBLE_RESEARCH_WEIGHT,
            Self::PatternRecognition => conf_constants::PATTERN_RECOGNITION_WEIGHT,
            Self::InformedSpeculation => conf_constants::INFORMED_SPECULATION_WEIGHT,
        }
    }
}

/// Coarse trustworthiness of a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    /// Bucket a scalar score: LOW < 0.5 <= MEDIUM < 0.8 <= HIGH
    pub fn from_score(score: f64) -> Self {
        if score >= conf_constants::HIGH_THRESHOLD {
            Self::High
        } else if score >= conf_constants::MEDIUM_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Representative value used when averaging levels
    pub fn score(self) -> f64 {
        match self {
            Self::High => conf_constants::HIGH_SCORE,
            Self::Medium => conf_constants::MEDIUM_SCORE,
            Self::Low => conf_constants::LOW_SCORE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

/// One supporting observation behind a conclusion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Claim key; items with the same type describe the same claim
    #[serde(rename = "type")]
    pub evidence_type: String,
    pub content: Value,
    pub source: String,
    pub level: EvidenceLevel,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

impl Evidence {
    pub fn new(
        evidence_type: impl Into<String>,
        content: impl Into<Value>,
        source: impl Into<String>,
        level: EvidenceLevel,
    ) -> Self {
        Self {
            evidence_type: evidence_type.into(),
            content: content.into(),
            source: source.into(),
            level,
            confidence: 0.0,
            timestamp: Utc::now(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Weighted contribution to a strength score
    pub fn weighted_score(&self) -> f64 {
        self.level.weight() * self.confidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_buckets() {
        assert_eq!(ConfidenceLevel::from_score(0.0), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_score(0.49), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_score(0.5), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.79), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.8), ConfidenceLevel::High);
    }

    #[test]
    fn test_level_weights_are_ordered() {
        assert!(EvidenceLevel::DirectObservation.weight() > EvidenceLevel::CredibleResearch.weight());
        assert!(EvidenceLevel::CredibleResearch.weight() > EvidenceLevel::PatternRecognition.weight());
        assert!(
            EvidenceLevel::PatternRecognition.weight() > EvidenceLevel::InformedSpeculation.weight()
        );
    }

    #[test]
    fn test_evidence_serialization() {
        let e = Evidence::new(
            "tech_stack",
            "React",
            "https://acme.com",
            EvidenceLevel::DirectObservation,
        )
        .with_confidence(0.9);

        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "tech_stack");
        assert_eq!(json["level"], "direct_observation");
        assert_eq!(
            serde_json::to_value(ConfidenceLevel::High).unwrap(),
            Value::String("high".into())
        );
    }
}
