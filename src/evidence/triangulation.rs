//! Cross-source verification of claims.
//!
//! Evidence items sharing an `evidence_type` are treated as statements about
//! the same claim. A claim backed by enough distinct sources is verified when
//! every item agrees on the content and conflicting otherwise.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Evidence;
use super::validation::weighted_mean;
use crate::constants::confidence::MIN_TRIANGULATION_SOURCES;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedClaim {
    pub claim: String,
    pub content: Value,
    pub sources: Vec<String>,
    pub confidence: f64,
}

/// One disagreeing pair of evidence items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentConflict {
    pub source_a: String,
    pub content_a: Value,
    pub source_b: String,
    pub content_b: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictingClaim {
    pub claim: String,
    pub sources: Vec<String>,
    pub conflicts: Vec<ContentConflict>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleSourceClaim {
    pub claim: String,
    pub source: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Triangulation {
    pub verified_claims: Vec<VerifiedClaim>,
    pub conflicting_claims: Vec<ConflictingClaim>,
    pub single_source_claims: Vec<SingleSourceClaim>,
    /// Mean confidence of verified claims, 0.0 when none
    pub confidence_score: f64,
}

impl Triangulation {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicting_claims.is_empty()
    }
}

/// Triangulate evidence, requiring `min_sources` distinct sources per claim.
///
/// Passing `None` uses the default of two sources. Claims are reported in
/// key order so the result does not depend on input order.
pub fn triangulate(evidence: &[Evidence], min_sources: Option<usize>) -> Triangulation {
    let min_sources = min_sources.unwrap_or(MIN_TRIANGULATION_SOURCES).max(1);

    let mut claims: BTreeMap<&str, Vec<&Evidence>> = BTreeMap::new();
    for item in evidence {
        claims.entry(item.evidence_type.as_str()).or_default().push(item);
    }

    let mut result = Triangulation::default();

    for (claim, items) in claims {
        let sources: BTreeSet<&str> = items.iter().map(|e| e.source.as_str()).collect();

        if sources.len() < min_sources {
            let first = items[0];
            result.single_source_claims.push(SingleSourceClaim {
                claim: claim.to_string(),
                source: first.source.clone(),
                confidence: first.confidence,
            });
            continue;
        }

        let sources: Vec<String> = sources.into_iter().map(String::from).collect();
        let consistent = items.windows(2).all(|w| w[0].content == w[1].content);

        if consistent {
            result.verified_claims.push(VerifiedClaim {
                claim: claim.to_string(),
                content: items[0].content.clone(),
                sources,
                confidence: weighted_mean(items.iter().copied()),
            });
        } else {
            result.conflicting_claims.push(ConflictingClaim {
                claim: claim.to_string(),
                sources,
                conflicts: pairwise_conflicts(&items),
            });
        }
    }

    if !result.verified_claims.is_empty() {
        result.confidence_score = result
            .verified_claims
            .iter()
            .map(|c| c.confidence)
            .sum::<f64>()
            / result.verified_claims.len() as f64;
    }

    result
}

fn pairwise_conflicts(items: &[&Evidence]) -> Vec<ContentConflict> {
    let mut conflicts = Vec::new();
    for (i, a) in items.iter().enumerate() {
        for b in &items[i + 1..] {
            if a.content != b.content {
                conflicts.push(ContentConflict {
                    source_a: a.source.clone(),
                    content_a: a.content.clone(),
                    source_b: b.source.clone(),
                    content_b: b.content.clone(),
                });
            }
        }
    }
    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::EvidenceLevel;
    use serde_json::json;

    fn item(claim: &str, content: Value, source: &str, confidence: f64) -> Evidence {
        Evidence::new(claim, content, source, EvidenceLevel::DirectObservation)
            .with_confidence(confidence)
    }

    #[test]
    fn test_verified_claim() {
        let evidence = vec![
            item("cms", json!("WordPress"), "https://a.com", 0.8),
            item("cms", json!("WordPress"), "https://b.com", 0.6),
        ];

        let t = triangulate(&evidence, None);
        assert_eq!(t.verified_claims.len(), 1);
        assert_eq!(t.verified_claims[0].sources, vec!["https://a.com", "https://b.com"]);
        assert!((t.verified_claims[0].confidence - 0.7).abs() < 1e-9);
        assert!((t.confidence_score - 0.7).abs() < 1e-9);
        assert!(!t.has_conflicts());
    }

    #[test]
    fn test_conflicting_claim_lists_pairwise_diffs() {
        let evidence = vec![
            item("price", json!(10), "https://a.com", 0.9),
            item("price", json!(12), "https://b.com", 0.9),
            item("price", json!(10), "https://c.com", 0.9),
        ];

        let t = triangulate(&evidence, None);
        assert!(t.verified_claims.is_empty());
        assert_eq!(t.conflicting_claims.len(), 1);
        // a-b and b-c differ, a-c agree
        assert_eq!(t.conflicting_claims[0].conflicts.len(), 2);
        assert_eq!(t.confidence_score, 0.0);
    }

    #[test]
    fn test_single_source_claims() {
        let evidence = vec![
            item("cms", json!("Shopify"), "https://a.com", 0.7),
            // Same source twice is still one source
            item("cms", json!("Shopify"), "https://a.com", 0.9),
            item("analytics", json!("GA"), "https://b.com", 0.5),
        ];

        let t = triangulate(&evidence, None);
        assert!(t.verified_claims.is_empty());
        assert_eq!(t.single_source_claims.len(), 2);
        assert_eq!(t.single_source_claims[0].claim, "analytics");
        assert_eq!(t.single_source_claims[1].confidence, 0.7);
    }

    #[test]
    fn test_min_sources_override() {
        let evidence = vec![item("cms", json!("Shopify"), "https://a.com", 0.9)];
        let t = triangulate(&evidence, Some(1));
        assert_eq!(t.verified_claims.len(), 1);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(triangulate(&[], None), Triangulation::default());
    }
}
