use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::replica::ReplicaId;

/// Identifier of a memory record.
pub type MemoryRecordId = String;

/// blake3 hex digest of normalised content; the key of a record in the
/// replicated memory set.
pub type ContentHash = String;

/// Lower-case, collapse whitespace, and drop trailing sentence punctuation,
/// so trivially different spellings of one fact share a content hash.
pub fn normalize_content(content: &str) -> String {
    let collapsed = content
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    collapsed
        .trim_end_matches(|c: char| {
            c.is_whitespace() || matches!(c, '.' | '!' | '?' | ',' | ';' | ':')
        })
        .to_string()
}

/// Content hash of `content` after normalisation.
pub fn content_hash(content: &str) -> ContentHash {
    blake3::hash(normalize_content(content).as_bytes())
        .to_hex()
        .to_string()
}

/// One original observation absorbed into a memory record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: MemoryRecordId,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub importance: f64,
    pub confidence: f64,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub source_replica: ReplicaId,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

/// A replicated memory: a fact remembered by at least one replica.
///
/// `lineage` lists the observations merged into this record in
/// chronological order: the earliest, then the most recent ones. Any
/// in between are only counted, in `elided`. A fresh record has a lineage
/// of one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: MemoryRecordId,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub importance: f64,
    pub confidence: f64,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub source_replica: ReplicaId,
    pub created_at: DateTime<Utc>,
    pub merge_count: u32,
    pub last_accessed: DateTime<Utc>,
    #[serde(default)]
    pub lineage: Vec<Observation>,
    #[serde(default)]
    pub elided: u32,
}

impl MemoryRecord {
    /// A fresh record observed now by `source_replica`.
    pub fn new(
        id: impl Into<MemoryRecordId>,
        content: impl Into<String>,
        source_replica: ReplicaId,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut record = Self {
            id: id.into(),
            content: content.into(),
            embedding: None,
            importance: 0.5,
            confidence: 0.5,
            tags: BTreeSet::new(),
            source_replica,
            created_at,
            merge_count: 1,
            last_accessed: created_at,
            lineage: Vec::new(),
            elided: 0,
        };
        record.lineage = vec![record.as_observation()];
        record
    }

    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance;
        self.refresh_single_lineage();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self.refresh_single_lineage();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self.refresh_single_lineage();
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self.refresh_single_lineage();
        self
    }

    /// Key of this record in the replicated memory set.
    pub fn content_hash(&self) -> ContentHash {
        content_hash(&self.content)
    }

    /// The record's own fields as a single observation.
    pub fn as_observation(&self) -> Observation {
        Observation {
            id: self.id.clone(),
            content: self.content.clone(),
            embedding: self.embedding.clone(),
            importance: self.importance,
            confidence: self.confidence,
            tags: self.tags.clone(),
            source_replica: self.source_replica.clone(),
            created_at: self.created_at,
            last_accessed: self.last_accessed,
        }
    }

    /// Observations this record stands for. Records received without a
    /// lineage stand for themselves.
    pub fn observations(&self) -> Vec<Observation> {
        if self.lineage.is_empty() {
            vec![self.as_observation()]
        } else {
            self.lineage.clone()
        }
    }

    /// Check numeric ranges and basic shape.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("memory record id is empty".to_string());
        }
        if self.content.trim().is_empty() {
            return Err(format!("memory record {} has empty content", self.id));
        }
        check_unit(&self.id, "importance", self.importance)?;
        check_unit(&self.id, "confidence", self.confidence)?;
        if let Some(embedding) = &self.embedding {
            if embedding.iter().any(|v| !v.is_finite()) {
                return Err(format!("memory record {} has a non-finite embedding", self.id));
            }
        }
        if self.merge_count == 0 {
            return Err(format!("memory record {} has merge_count 0", self.id));
        }
        for obs in &self.lineage {
            check_unit(&obs.id, "importance", obs.importance)?;
            check_unit(&obs.id, "confidence", obs.confidence)?;
        }
        Ok(())
    }

    // Builders run before any merge, so the lineage is still just `self`.
    fn refresh_single_lineage(&mut self) {
        if self.lineage.len() <= 1 {
            self.lineage = vec![self.as_observation()];
        }
    }
}

fn check_unit(id: &str, field: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(format!("{field} of {id} must be in [0, 1], got {value}"))
    }
}
