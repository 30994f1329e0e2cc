//! The memory deduplicator.
//!
//! Records are linked when any pair of their listed observations scores at
//! or above the threshold, or has identical normalised content. Ingest
//! absorbs the whole linked component around the new record and refolds
//! it, so the final set of records only depends on which observations were
//! ingested. Records list at most `max_lineage` observations, which also
//! bounds the pairs compared per candidate.

use std::collections::{BTreeMap, BTreeSet};

use chorus_core::config::DedupConfig;
use chorus_core::constants::FLOAT_TOLERANCE;
use chorus_core::models::{
    normalize_content, ContentHash, MemoryRecord, MemoryRecordId, Observation,
};
use tracing::{debug, instrument};

use crate::fold::fold_records;
use crate::scoring::composite_score;
use crate::similarity::SimilarityEngine;

/// Result of ingesting one record.
#[derive(Debug, Clone, PartialEq)]
pub enum DedupOutcome {
    /// Stored as a new record.
    Inserted { id: MemoryRecordId, hash: ContentHash },
    /// Absorbed together with the records it matched.
    Merged {
        /// Id of the ingested record.
        id: MemoryRecordId,
        /// Best matching record: highest score, then smallest id.
        into: MemoryRecordId,
        score: f64,
        /// Id and hash of the record that now stands for the component.
        survivor: MemoryRecordId,
        hash: ContentHash,
        merge_count: u32,
        /// Every indexed record that was folded in.
        absorbed: Vec<MemoryRecordId>,
        /// Hashes no longer in the index.
        retired: Vec<ContentHash>,
    },
}

impl DedupOutcome {
    /// Id of the record now holding the ingested observation.
    pub fn record_id(&self) -> &MemoryRecordId {
        match self {
            DedupOutcome::Inserted { id, .. } => id,
            DedupOutcome::Merged { survivor, .. } => survivor,
        }
    }

    pub fn hash(&self) -> &ContentHash {
        match self {
            DedupOutcome::Inserted { hash, .. } | DedupOutcome::Merged { hash, .. } => hash,
        }
    }
}

/// Index entries an ingest replaced, oldest first.
///
/// Handing it back to [`Deduplicator::revert`] puts the index back as it
/// was before the ingest.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use]
pub struct IndexUndo {
    entries: Vec<(ContentHash, Option<MemoryRecord>)>,
}

impl IndexUndo {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct Deduplicator {
    config: DedupConfig,
    engine: SimilarityEngine,
    records: BTreeMap<ContentHash, MemoryRecord>,
}

impl Deduplicator {
    pub fn new(config: DedupConfig, engine: SimilarityEngine) -> Self {
        Self {
            config,
            engine,
            records: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    pub fn engine(&self) -> &SimilarityEngine {
        &self.engine
    }

    /// Deduplicate `record` against the index and store the result.
    pub fn ingest(&mut self, record: MemoryRecord) -> DedupOutcome {
        self.ingest_tracked(record).0
    }

    /// [`Deduplicator::ingest`], also returning what it takes to undo it.
    #[instrument(skip(self, record), fields(id = %record.id))]
    pub fn ingest_tracked(&mut self, record: MemoryRecord) -> (DedupOutcome, IndexUndo) {
        let mut undo = IndexUndo::default();
        let (weight, max_lineage) = (self.config.merge_weight, self.config.max_lineage);
        let record = fold_records([&record], weight, max_lineage).unwrap_or(record);
        let hash = record.content_hash();
        let incoming = record.observations();

        // Direct matches decide the reported merge target.
        let mut best: Option<(f64, MemoryRecordId)> = None;
        let mut component: BTreeSet<ContentHash> = BTreeSet::new();
        let candidates: Vec<(ContentHash, Vec<Observation>, MemoryRecordId)> = self
            .records
            .iter()
            .map(|(h, r)| (h.clone(), r.observations(), r.id.clone()))
            .collect();
        for (candidate_hash, observations, candidate_id) in &candidates {
            let (score, exact) = self.link_score(&incoming, observations);
            if exact || score + FLOAT_TOLERANCE >= self.config.similarity_threshold {
                component.insert(candidate_hash.clone());
                let better = match &best {
                    None => true,
                    Some((best_score, best_id)) => {
                        score > best_score + FLOAT_TOLERANCE
                            || ((score - best_score).abs() <= FLOAT_TOLERANCE
                                && candidate_id < best_id)
                    }
                };
                if better {
                    best = Some((score, candidate_id.clone()));
                }
            }
        }

        let Some((score, into)) = best else {
            let id = record.id.clone();
            debug!(id = %id, "inserted as new record");
            self.put(hash.clone(), record, &mut undo);
            return (DedupOutcome::Inserted { id, hash }, undo);
        };

        // Grow the component until no remaining record links to it.
        let mut lineage = incoming;
        for h in &component {
            if let Some(r) = self.records.get(h) {
                lineage.extend(r.observations());
            }
        }
        loop {
            let mut grown = false;
            for (candidate_hash, observations, _) in &candidates {
                if component.contains(candidate_hash) {
                    continue;
                }
                let (score, exact) = self.link_score(&lineage, observations);
                if exact || score + FLOAT_TOLERANCE >= self.config.similarity_threshold {
                    component.insert(candidate_hash.clone());
                    lineage.extend(observations.iter().cloned());
                    grown = true;
                }
            }
            if !grown {
                break;
            }
        }

        let mut members = vec![record];
        for h in &component {
            if let Some(absorbed) = self.take(h, &mut undo) {
                members.push(absorbed);
            }
        }
        let absorbed: Vec<MemoryRecordId> = members[1..].iter().map(|r| r.id.clone()).collect();
        let Some(merged) = fold_records(&members, weight, max_lineage) else {
            // Unreachable: the members hold at least the incoming record.
            return (DedupOutcome::Inserted { id: members[0].id.clone(), hash }, undo);
        };
        let survivor_hash = merged.content_hash();
        let retired: Vec<ContentHash> = component
            .into_iter()
            .filter(|h| *h != survivor_hash)
            .collect();
        let outcome = DedupOutcome::Merged {
            id: members[0].id.clone(),
            into,
            score,
            survivor: merged.id.clone(),
            hash: survivor_hash.clone(),
            merge_count: merged.merge_count,
            absorbed,
            retired,
        };
        debug!(
            survivor = %merged.id,
            merge_count = merged.merge_count,
            elided = merged.elided,
            score,
            "merged into existing record"
        );
        self.put(survivor_hash, merged, &mut undo);
        (outcome, undo)
    }

    /// Put back the entries an abandoned ingest replaced.
    pub fn revert(&mut self, undo: IndexUndo) {
        for (hash, previous) in undo.entries.into_iter().rev() {
            match previous {
                Some(record) => {
                    self.records.insert(hash, record);
                }
                None => {
                    self.records.remove(&hash);
                }
            }
        }
    }

    fn put(&mut self, hash: ContentHash, record: MemoryRecord, undo: &mut IndexUndo) {
        let previous = self.records.insert(hash.clone(), record);
        undo.entries.push((hash, previous));
    }

    fn take(&mut self, hash: &ContentHash, undo: &mut IndexUndo) -> Option<MemoryRecord> {
        let removed = self.records.remove(hash)?;
        undo.entries.push((hash.clone(), Some(removed.clone())));
        Some(removed)
    }

    /// Index a record that arrived already deduplicated elsewhere.
    pub fn observe(&mut self, record: MemoryRecord) {
        self.records.insert(record.content_hash(), record);
    }

    /// Drop `hash` from the index.
    pub fn forget(&mut self, hash: &ContentHash) -> Option<MemoryRecord> {
        self.records.remove(hash)
    }

    pub fn get(&self, hash: &ContentHash) -> Option<&MemoryRecord> {
        self.records.get(hash)
    }

    pub fn records(&self) -> impl Iterator<Item = &MemoryRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Highest composite score over all observation pairs, and whether any
    /// pair has identical normalised content.
    fn link_score(&mut self, left: &[Observation], right: &[Observation]) -> (f64, bool) {
        let mut best = 0.0f64;
        let mut exact = false;
        for a in left {
            for b in right {
                exact |= normalize_content(&a.content) == normalize_content(&b.content);
                let vector = self.engine.similarity(a, b);
                best = best.max(composite_score(a, b, vector, &self.config).total);
            }
        }
        (best, exact)
    }
}
