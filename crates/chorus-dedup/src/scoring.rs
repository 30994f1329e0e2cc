//! Composite similarity between two observations.

use std::collections::BTreeSet;

use chorus_core::config::DedupConfig;
use chorus_core::models::Observation;
use serde::{Deserialize, Serialize};

/// The four components of a composite score, each in [0, 1], and their
/// weighted sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub vector: f64,
    pub temporal: f64,
    pub tag: f64,
    pub source: f64,
    pub total: f64,
}

/// Score `a` against `b` given their vector similarity.
///
/// `total = w_v*vector + w_t*exp(-Δh/scale) + w_g*jaccard(tags) + w_s*source`
pub fn composite_score(
    a: &Observation,
    b: &Observation,
    vector_similarity: f64,
    config: &DedupConfig,
) -> ScoreBreakdown {
    let vector = vector_similarity.clamp(0.0, 1.0);
    let delta_hours = (a.created_at - b.created_at).num_milliseconds().abs() as f64 / 3_600_000.0;
    let temporal = (-delta_hours / config.temporal_scale_hours).exp();
    let tag = tag_overlap(&a.tags, &b.tags);
    let source = if a.source_replica == b.source_replica {
        config.same_source_score
    } else {
        config.cross_source_score
    };
    let w = &config.weights;
    ScoreBreakdown {
        vector,
        temporal,
        tag,
        source,
        total: w.vector * vector + w.temporal * temporal + w.tag * tag + w.source * source,
    }
}

/// Jaccard overlap of two tag sets. Zero if either is empty.
pub fn tag_overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    let union = a.union(b).count();
    shared as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_fixtures::record;

    #[test]
    fn default_weights_match_policy() {
        let config = DedupConfig::default();
        let a = record("a", "x", "r1", 0.0).with_tags(["t"]).as_observation();
        let b = record("b", "y", "r1", 0.0).with_tags(["t"]).as_observation();
        let s = composite_score(&a, &b, 0.95, &config);
        assert!((s.total - (0.5 * 0.95 + 0.2 + 0.2 + 0.1)).abs() < 1e-9);
    }

    #[test]
    fn temporal_decay_uses_scale_hours() {
        let config = DedupConfig::default();
        let a = record("a", "x", "r1", 0.0).as_observation();
        let b = record("b", "x", "r2", 24.0).as_observation();
        let s = composite_score(&a, &b, 1.0, &config);
        assert!((s.temporal - (-1.0f64).exp()).abs() < 1e-9);
        assert_eq!(s.tag, 0.0);
        assert_eq!(s.source, 0.5);
    }

    #[test]
    fn tag_overlap_is_jaccard() {
        let a: BTreeSet<String> = ["x", "y"].iter().map(|s| s.to_string()).collect();
        let b: BTreeSet<String> = ["y", "z"].iter().map(|s| s.to_string()).collect();
        assert!((tag_overlap(&a, &b) - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(tag_overlap(&a, &BTreeSet::new()), 0.0);
    }
}
