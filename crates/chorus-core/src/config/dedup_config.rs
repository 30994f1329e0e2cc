use serde::{Deserialize, Serialize};

use super::defaults;

/// Weights of the four composite-similarity components. Must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeWeights {
    pub vector: f64,
    pub temporal: f64,
    pub tag: f64,
    pub source: f64,
}

impl CompositeWeights {
    pub fn sum(&self) -> f64 {
        self.vector + self.temporal + self.tag + self.source
    }
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            vector: defaults::DEFAULT_VECTOR_WEIGHT,
            temporal: defaults::DEFAULT_TEMPORAL_WEIGHT,
            tag: defaults::DEFAULT_TAG_WEIGHT,
            source: defaults::DEFAULT_SOURCE_WEIGHT,
        }
    }
}

/// Memory deduplicator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Composite score at or above which two records are merged.
    pub similarity_threshold: f64,
    /// Weight toward the newer observation when averaging numeric fields.
    pub merge_weight: f64,
    /// Composite-similarity component weights.
    pub weights: CompositeWeights,
    /// Hours over which temporal proximity decays by a factor of e.
    pub temporal_scale_hours: f64,
    /// Source component when both records come from the same replica.
    pub same_source_score: f64,
    /// Source component when the records come from different replicas.
    pub cross_source_score: f64,
    /// Observations a record lists: its earliest plus the most recent.
    /// Older ones are counted but no longer carried.
    pub max_lineage: usize,
    /// Provider embeddings kept in memory.
    pub embedding_cache_capacity: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: defaults::DEFAULT_SIMILARITY_THRESHOLD,
            merge_weight: defaults::DEFAULT_MERGE_WEIGHT,
            weights: CompositeWeights::default(),
            temporal_scale_hours: defaults::DEFAULT_TEMPORAL_SCALE_HOURS,
            same_source_score: defaults::DEFAULT_SAME_SOURCE_SCORE,
            cross_source_score: defaults::DEFAULT_CROSS_SOURCE_SCORE,
            max_lineage: defaults::DEFAULT_MAX_LINEAGE,
            embedding_cache_capacity: defaults::DEFAULT_EMBEDDING_CACHE_CAPACITY,
        }
    }
}
