//! Evidence validation, strength scoring and audit trails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{ConfidenceLevel, Evidence, EvidenceLevel};
use crate::constants::confidence::{TRACEABLE_PREFIXES, TRUSTED_DOMAINS};
use crate::types::json_is_empty;

/// Reason an evidence item was rejected
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceIssue {
    #[error("Evidence source is required")]
    MissingSource,
    #[error("Evidence content is required")]
    MissingContent,
    #[error("Confidence must be between 0 and 1 (got {0})")]
    ConfidenceOutOfBounds(f64),
    #[error("Direct observation lacks a traceable source")]
    UntraceableObservation,
    #[error("Source credibility could not be verified")]
    UntrustedSource,
}

/// Check one evidence item, collecting every problem found
pub fn validate_evidence(evidence: &Evidence) -> Result<(), Vec<EvidenceIssue>> {
    let mut issues = Vec::new();

    if evidence.source.trim().is_empty() {
        issues.push(EvidenceIssue::MissingSource);
    }
    if json_is_empty(&evidence.content) {
        issues.push(EvidenceIssue::MissingContent);
    }
    if !(0.0..=1.0).contains(&evidence.confidence) {
        issues.push(EvidenceIssue::ConfidenceOutOfBounds(evidence.confidence));
    }

    match evidence.level {
        EvidenceLevel::DirectObservation => {
            if !TRACEABLE_PREFIXES
                .iter()
                .any(|prefix| evidence.source.starts_with(prefix))
            {
                issues.push(EvidenceIssue::UntraceableObservation);
            }
        }
        EvidenceLevel::CredibleResearch => {
            let source = evidence.source.to_lowercase();
            if !TRUSTED_DOMAINS.iter().any(|domain| source.contains(domain)) {
                issues.push(EvidenceIssue::UntrustedSource);
            }
        }
        EvidenceLevel::PatternRecognition | EvidenceLevel::InformedSpeculation => {}
    }

    if issues.is_empty() { Ok(()) } else { Err(issues) }
}

/// Mean weighted score over items, without validation
pub(crate) fn weighted_mean<'a>(items: impl IntoIterator<Item = &'a Evidence>) -> f64 {
    let (sum, count) = items
        .into_iter()
        .fold((0.0, 0usize), |(s, c), e| (s + e.weighted_score(), c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Mean of `weight(level) * confidence` over valid items; 0.0 when none.
///
/// Invalid items are logged and excluded.
pub fn calculate_evidence_strength(evidence: &[Evidence]) -> f64 {
    let valid = evidence.iter().filter(|e| match validate_evidence(e) {
        Ok(()) => true,
        Err(issues) => {
            tracing::debug!(
                evidence_type = %e.evidence_type,
                source = %e.source,
                ?issues,
                "Excluding invalid evidence"
            );
            false
        }
    });
    weighted_mean(valid)
}

/// Bucketed strength of an evidence collection. Empty input is LOW.
pub fn calculate_confidence(evidence: &[Evidence]) -> ConfidenceLevel {
    ConfidenceLevel::from_score(calculate_evidence_strength(evidence))
}

/// One step of an agent's reasoning with the evidence it relied on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub step_name: String,
    pub reasoning: String,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    pub timestamp: DateTime<Utc>,
}

impl ReasoningStep {
    pub fn new(step_name: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            reasoning: reasoning.into(),
            evidence: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_evidence(mut self, evidence: Vec<Evidence>) -> Self {
        self.evidence = evidence;
        self
    }
}

/// Evidence item annotated with its validation outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedEvidence {
    pub evidence: Evidence,
    pub valid: bool,
    pub validation_errors: Vec<String>,
}

/// Audit record for one reasoning step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailEntry {
    pub step: String,
    pub timestamp: DateTime<Utc>,
    pub evidence_used: Vec<ValidatedEvidence>,
    /// Strength of the step's valid evidence
    pub confidence: f64,
    pub reasoning: String,
}

/// Build the evidence audit trail for a reasoning chain
pub fn generate_evidence_trail(steps: &[ReasoningStep]) -> Vec<TrailEntry> {
    steps
        .iter()
        .map(|step| {
            let evidence_used = step
                .evidence
                .iter()
                .map(|e| {
                    let validation_errors = match validate_evidence(e) {
                        Ok(()) => Vec::new(),
                        Err(issues) => issues.iter().map(ToString::to_string).collect(),
                    };
                    ValidatedEvidence {
                        evidence: e.clone(),
                        valid: validation_errors.is_empty(),
                        validation_errors,
                    }
                })
                .collect::<Vec<_>>();

            let confidence = weighted_mean(
                evidence_used
                    .iter()
                    .filter(|v| v.valid)
                    .map(|v| &v.evidence),
            );

            TrailEntry {
                step: step.step_name.clone(),
                timestamp: step.timestamp,
                evidence_used,
                confidence,
                reasoning: step.reasoning.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{Value, json};

    fn direct(confidence: f64) -> Evidence {
        Evidence::new(
            "page",
            "homepage fetched",
            "https://acme.com",
            EvidenceLevel::DirectObservation,
        )
        .with_confidence(confidence)
    }

    #[test]
    fn test_valid_direct_observation() {
        assert!(validate_evidence(&direct(0.9)).is_ok());

        let api = Evidence::new("x", "y", "api:pricing", EvidenceLevel::DirectObservation)
            .with_confidence(0.5);
        assert!(validate_evidence(&api).is_ok());
    }

    #[test]
    fn test_untraceable_direct_observation() {
        let e = Evidence::new("x", "y", "a friend", EvidenceLevel::DirectObservation)
            .with_confidence(0.5);
        assert_eq!(
            validate_evidence(&e).unwrap_err(),
            vec![EvidenceIssue::UntraceableObservation]
        );
    }

    #[test]
    fn test_credible_research_requires_trusted_domain() {
        let trusted = Evidence::new(
            "market",
            "growing",
            "https://www.Reuters.com/markets",
            EvidenceLevel::CredibleResearch,
        )
        .with_confidence(0.8);
        assert!(validate_evidence(&trusted).is_ok());

        let untrusted = Evidence::new("market", "growing", "blog.example.com", EvidenceLevel::CredibleResearch)
            .with_confidence(0.8);
        assert_eq!(
            validate_evidence(&untrusted).unwrap_err(),
            vec![EvidenceIssue::UntrustedSource]
        );
    }

    #[test]
    fn test_collects_all_issues() {
        let e = Evidence::new("x", Value::Null, "", EvidenceLevel::PatternRecognition)
            .with_confidence(1.5);
        let issues = validate_evidence(&e).unwrap_err();
        assert_eq!(
            issues,
            vec![
                EvidenceIssue::MissingSource,
                EvidenceIssue::MissingContent,
                EvidenceIssue::ConfidenceOutOfBounds(1.5),
            ]
        );
    }

    #[test]
    fn test_empty_evidence_is_low() {
        assert_eq!(calculate_confidence(&[]), ConfidenceLevel::Low);
        assert_eq!(calculate_evidence_strength(&[]), 0.0);
    }

    #[test]
    fn test_weighted_confidence() {
        let pattern = Evidence::new("trend", "up", "analysis", EvidenceLevel::PatternRecognition)
            .with_confidence(1.0);

        // (1.0 * 0.9 + 0.7 * 1.0) / 2 = 0.8
        let strength = calculate_evidence_strength(&[direct(0.9), pattern]);
        assert!((strength - 0.8).abs() < 1e-9);
        assert_eq!(calculate_confidence(&[direct(0.9)]), ConfidenceLevel::High);
        assert_eq!(calculate_confidence(&[direct(0.6)]), ConfidenceLevel::Medium);
    }

    #[test]
    fn test_invalid_items_excluded() {
        let bogus = Evidence::new("x", "y", "rumor", EvidenceLevel::DirectObservation)
            .with_confidence(0.0);
        assert_eq!(calculate_confidence(&[direct(0.9), bogus]), ConfidenceLevel::High);

        let only_invalid = Evidence::new("x", "", "", EvidenceLevel::InformedSpeculation);
        assert_eq!(calculate_confidence(&[only_invalid]), ConfidenceLevel::Low);
    }

    #[test]
    fn test_evidence_trail() {
        let steps = vec![
            ReasoningStep::new("fetch", "Fetched the homepage")
                .with_evidence(vec![direct(0.8), Evidence::new("x", json!({}), "", EvidenceLevel::PatternRecognition)]),
            ReasoningStep::new("summarize", "No evidence attached"),
        ];

        let trail = generate_evidence_trail(&steps);
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].step, "fetch");
        assert_eq!(trail[0].evidence_used.len(), 2);
        assert!(trail[0].evidence_used[0].valid);
        assert!(!trail[0].evidence_used[1].valid);
        assert_eq!(trail[0].evidence_used[1].validation_errors.len(), 2);
        assert!((trail[0].confidence - 0.8).abs() < 1e-9);
        assert_eq!(trail[1].confidence, 0.0);
    }

    fn level_strategy() -> impl Strategy<Value = EvidenceLevel> {
        prop_oneof![
            Just(EvidenceLevel::DirectObservation),
            Just(EvidenceLevel::CredibleResearch),
            Just(EvidenceLevel::PatternRecognition),
            Just(EvidenceLevel::InformedSpeculation),
        ]
    }

    fn item(level: EvidenceLevel, confidence: f64) -> Evidence {
        let source = match level {
            EvidenceLevel::CredibleResearch => "https://data.census.gov",
            _ => "https://acme.com",
        };
        Evidence::new("claim", "content", source, level).with_confidence(confidence)
    }

    proptest! {
        #[test]
        fn prop_confidence_monotonic_in_item_confidence(
            items in prop::collection::vec((level_strategy(), 0.0f64..=1.0), 1..8),
            idx in any::<prop::sample::Index>(),
            bump in 0.0f64..=1.0,
        ) {
            let evidence: Vec<Evidence> = items.iter().map(|(l, c)| item(*l, *c)).collect();
            let i = idx.index(evidence.len());

            let mut raised = evidence.clone();
            raised[i].confidence = (raised[i].confidence + bump).min(1.0);

            let before = calculate_evidence_strength(&evidence);
            let after = calculate_evidence_strength(&raised);
            prop_assert!(after + 1e-12 >= before);
            prop_assert!(calculate_confidence(&raised) >= calculate_confidence(&evidence));
        }
    }
}
