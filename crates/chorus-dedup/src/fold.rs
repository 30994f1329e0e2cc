//! Canonical fold of a set of observations into one memory record.

use std::collections::{BTreeMap, BTreeSet};

use chorus_core::models::{MemoryRecord, Observation};

/// Fold `observations` into one record.
///
/// Observations are deduplicated by id and visited in `(created_at, id)`
/// order. The earliest is the representative and supplies id, content,
/// embedding, source and creation time. Importance and confidence are
/// averaged step by step with weight `merge_weight` toward the newer
/// observation. Tags are united; `last_accessed` is the latest seen.
///
/// Returns `None` for an empty input.
pub fn fold_observations(
    observations: impl IntoIterator<Item = Observation>,
    merge_weight: f64,
) -> Option<MemoryRecord> {
    fold_chronological(chronological(observations), merge_weight)
}

/// Fold whole records into one, listing at most `max_lineage` observations.
///
/// The lineage keeps the representative and the `max_lineage - 1` most
/// recent observations; numeric fields are folded over exactly that window.
/// Since the window of a union is the window of the members' windows, the
/// result does not depend on how the records were grouped before. Tags and
/// `last_accessed` also cover observations outside the window.
///
/// Elided counts add up across records, except that records sharing an id
/// descend from one another and contribute their largest count once.
pub fn fold_records<'a>(
    records: impl IntoIterator<Item = &'a MemoryRecord>,
    merge_weight: f64,
    max_lineage: usize,
) -> Option<MemoryRecord> {
    let mut observations = Vec::new();
    let mut elided: BTreeMap<&str, u32> = BTreeMap::new();
    let mut tags: BTreeSet<String> = BTreeSet::new();
    let mut last_accessed = None;
    for record in records {
        observations.extend(record.observations());
        let count = elided.entry(record.id.as_str()).or_default();
        *count = (*count).max(record.elided);
        tags.extend(record.tags.iter().cloned());
        last_accessed = last_accessed.max(Some(record.last_accessed));
    }

    let mut lineage = chronological(observations);
    let keep_tail = max_lineage.max(2) - 1;
    let dropped = if lineage.len() > keep_tail + 1 {
        let end = lineage.len() - keep_tail;
        lineage.drain(1..end).count()
    } else {
        0
    };

    let mut folded = fold_chronological(lineage, merge_weight)?;
    folded.tags.extend(tags);
    if let Some(latest) = last_accessed {
        folded.last_accessed = folded.last_accessed.max(latest);
    }
    folded.elided = elided
        .into_values()
        .fold(u32::try_from(dropped).unwrap_or(u32::MAX), u32::saturating_add);
    folded.merge_count = folded.merge_count.saturating_add(folded.elided);
    Some(folded)
}

/// Deduplicate by id and sort by `(created_at, id)`.
fn chronological(observations: impl IntoIterator<Item = Observation>) -> Vec<Observation> {
    let by_key: BTreeMap<_, Observation> = observations
        .into_iter()
        .map(|o| ((o.created_at, o.id.clone()), o))
        .collect();
    let mut lineage: Vec<Observation> = Vec::with_capacity(by_key.len());
    for obs in by_key.into_values() {
        if !lineage.iter().any(|seen| seen.id == obs.id) {
            lineage.push(obs);
        }
    }
    lineage
}

fn fold_chronological(lineage: Vec<Observation>, merge_weight: f64) -> Option<MemoryRecord> {
    let first = lineage.first()?;
    let mut folded = MemoryRecord {
        id: first.id.clone(),
        content: first.content.clone(),
        embedding: first.embedding.clone(),
        importance: first.importance,
        confidence: first.confidence,
        tags: first.tags.clone(),
        source_replica: first.source_replica.clone(),
        created_at: first.created_at,
        merge_count: 1,
        last_accessed: first.last_accessed,
        lineage: Vec::new(),
        elided: 0,
    };
    for newer in lineage.iter().skip(1) {
        folded.importance =
            merge_weight * newer.importance + (1.0 - merge_weight) * folded.importance;
        folded.confidence =
            merge_weight * newer.confidence + (1.0 - merge_weight) * folded.confidence;
        folded.tags.extend(newer.tags.iter().cloned());
        folded.last_accessed = folded.last_accessed.max(newer.last_accessed);
    }
    folded.merge_count = u32::try_from(lineage.len()).unwrap_or(u32::MAX);
    folded.lineage = lineage;
    Some(folded)
}
