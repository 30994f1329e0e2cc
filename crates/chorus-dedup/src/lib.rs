//! # chorus-dedup
//!
//! Merges semantically similar memory records before they multiply.
//!
//! A record is compared to every indexed record with a composite score
//! (vector, temporal, tag and source similarity). Records at or above the
//! threshold are absorbed into one. Each record keeps the observations it
//! absorbed, and the merged record is always folded from them in
//! chronological order, so ingest order does not change the result.

pub mod deduplicator;
pub mod fold;
pub mod scoring;
pub mod similarity;

pub use deduplicator::{DedupOutcome, Deduplicator, IndexUndo};
pub use fold::{fold_observations, fold_records};
pub use scoring::{composite_score, ScoreBreakdown};
pub use similarity::{EmbeddingCache, SimilarityEngine};
