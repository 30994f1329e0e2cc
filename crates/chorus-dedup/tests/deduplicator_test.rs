use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chorus_core::config::DedupConfig;
use chorus_core::models::SyncRecord;
use chorus_core::errors::EmbeddingError;
use chorus_core::traits::{IEventSink, ISimilarityProvider};
use chorus_dedup::{DedupOutcome, Deduplicator, SimilarityEngine};
use test_fixtures::{record, FixedSimilarity, UnavailableSimilarity};

#[derive(Default)]
struct CaptureSink(Mutex<Vec<SyncRecord>>);

impl IEventSink for CaptureSink {
    fn publish(&self, record: SyncRecord) {
        self.0.lock().unwrap().push(record);
    }
}

fn fixed(score: f64) -> Deduplicator {
    let sink = Arc::new(CaptureSink::default());
    Deduplicator::new(
        DedupConfig::default(),
        SimilarityEngine::new(Arc::new(FixedSimilarity::new(score)), sink),
    )
}

#[test]
fn near_duplicate_merges_with_weighted_importance() {
    let mut dedup = fixed(0.95);
    let first = record("m1", "The sky is blue", "replica-a", 0.0)
        .with_importance(0.5)
        .with_tags(["weather"]);
    let second = record("m2", "the sky is blue.", "replica-a", 0.5)
        .with_importance(0.7)
        .with_tags(["weather"]);

    assert!(matches!(dedup.ingest(first), DedupOutcome::Inserted { .. }));
    let outcome = dedup.ingest(second);

    let DedupOutcome::Merged { id, into, score, merge_count, .. } = &outcome else {
        panic!("expected merge, got {outcome:?}");
    };
    assert_eq!(id, "m2");
    assert_eq!(into, "m1");
    assert!(*score >= 0.85);
    assert_eq!(*merge_count, 2);

    assert_eq!(dedup.len(), 1);
    let merged = dedup.records().next().unwrap();
    assert!((merged.importance - 0.62).abs() < 1e-9);
    assert_eq!(merged.merge_count, 2);
    assert_eq!(merged.id, "m1");
}

#[test]
fn same_content_hash_always_merges() {
    // Untagged, cross-source and a day apart: the composite stays low,
    // but the normalised content is identical.
    let mut dedup = fixed(0.2);
    dedup.ingest(record("m1", "Deploys run nightly", "a", 0.0));
    let outcome = dedup.ingest(record("m2", "deploys   run nightly!", "b", 30.0));
    assert!(matches!(outcome, DedupOutcome::Merged { .. }));
    assert_eq!(dedup.len(), 1);
}

#[test]
fn below_threshold_inserts_new_record() {
    let mut dedup = fixed(0.3);
    dedup.ingest(record("m1", "alpha", "a", 0.0).with_tags(["x"]));
    let outcome = dedup.ingest(record("m2", "beta", "a", 0.0).with_tags(["x"]));
    // 0.5*0.3 + 0.2 + 0.2 + 0.1 = 0.65
    assert!(matches!(outcome, DedupOutcome::Inserted { .. }));
    assert_eq!(dedup.len(), 2);
}

#[test]
fn best_candidate_ties_break_on_smallest_id() {
    let mut dedup = fixed(0.95);
    // Two indexed records that were never linked to each other.
    dedup.observe(record("m-b", "first", "a", 0.0).with_tags(["t"]));
    dedup.observe(record("m-a", "second", "a", 0.0).with_tags(["t"]));
    let outcome = dedup.ingest(record("m-c", "third", "a", 0.0).with_tags(["t"]));
    let DedupOutcome::Merged { into, absorbed, retired, survivor, .. } = outcome else {
        panic!("expected merge");
    };
    assert_eq!(into, "m-a");
    assert_eq!(absorbed.len(), 2);
    assert_eq!(dedup.len(), 1);
    // Equal creation times: the smallest id represents the component.
    assert_eq!(survivor, "m-a");
    assert_eq!(retired.len(), 1);
}

#[test]
fn unavailable_provider_falls_back_to_lexical_and_reports_once() {
    let sink = Arc::new(CaptureSink::default());
    let provider = Arc::new(UnavailableSimilarity::default());
    let mut dedup = Deduplicator::new(
        DedupConfig::default(),
        SimilarityEngine::new(provider, sink.clone()),
    );

    dedup.ingest(record("m1", "the sky is blue", "a", 0.0).with_tags(["w"]));
    let outcome = dedup.ingest(record("m2", "the sky is blue today", "a", 0.1).with_tags(["w"]));
    // Lexical 4/5: 0.4 + 0.2*exp(-0.1/24) + 0.2 + 0.1 ≈ 0.899
    assert!(matches!(outcome, DedupOutcome::Merged { .. }));
    dedup.ingest(record("m3", "grass is green", "a", 0.2).with_tags(["w"]));

    assert!(dedup.engine().is_degraded());
    assert_eq!(dedup.engine().events().len(), 1);
    let published = sink.0.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert!(matches!(published[0], SyncRecord::Degradation(_)));
}

#[test]
fn merged_record_keeps_lineage_and_union_of_tags() {
    let mut dedup = fixed(1.0);
    dedup.ingest(record("m1", "one", "a", 0.0).with_tags(["x", "y"]));
    dedup.ingest(record("m2", "two", "a", 1.0).with_tags(["y", "z"]));
    let merged = dedup.records().next().unwrap();
    assert_eq!(merged.lineage.len(), 2);
    assert_eq!(merged.tags.len(), 3);
    assert_eq!(merged.last_accessed, test_fixtures::at_hours(1.0));
}

/// Counts embed calls; every pair scores the same.
#[derive(Default)]
struct CountingSimilarity {
    embeds: AtomicUsize,
}

impl ISimilarityProvider for CountingSimilarity {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embeds.fetch_add(1, Ordering::SeqCst);
        Ok(vec![text.len() as f32, 1.0])
    }

    fn similarity(&self, _a: &[f32], _b: &[f32]) -> f64 {
        0.1
    }

    fn name(&self) -> &str {
        "counting"
    }
}

#[test]
fn provider_embeddings_are_cached_by_content() {
    let provider = Arc::new(CountingSimilarity::default());
    let sink = Arc::new(CaptureSink::default());
    let mut dedup = Deduplicator::new(
        DedupConfig::default(),
        SimilarityEngine::new(provider.clone(), sink),
    );
    dedup.ingest(record("m1", "alpha", "a", 0.0));
    dedup.ingest(record("m2", "beta", "a", 0.0));
    dedup.ingest(record("m3", "gamma", "a", 0.0));
    // Each distinct content is embedded once, however often it is compared.
    assert_eq!(provider.embeds.load(Ordering::SeqCst), 3);
    assert_eq!(dedup.engine().cache().len(), 3);
}

#[test]
fn embedding_cache_stays_within_its_capacity() {
    let provider = Arc::new(CountingSimilarity::default());
    let sink = Arc::new(CaptureSink::default());
    let mut dedup = Deduplicator::new(
        DedupConfig::default(),
        SimilarityEngine::new(provider, sink).with_cache_capacity(8),
    );
    for i in 0..40 {
        dedup.ingest(record(&format!("m{i}"), &format!("fact number {i}"), "a", i as f64));
    }
    assert_eq!(dedup.len(), 40);
    assert!(dedup.engine().cache().len() <= 8);
}

#[test]
fn lineage_stays_bounded_as_duplicates_pile_up() {
    let config = DedupConfig {
        max_lineage: 4,
        ..DedupConfig::default()
    };
    let mut dedup = Deduplicator::new(config, SimilarityEngine::lexical());
    for i in 0..12 {
        dedup.ingest(
            record(&format!("m{i:02}"), "the build is green", "a", i as f64)
                .with_tags([format!("run-{i}")]),
        );
    }
    assert_eq!(dedup.len(), 1);
    let merged = dedup.records().next().unwrap();
    assert_eq!(merged.lineage.len(), 4);
    assert_eq!(merged.lineage[0].id, "m00");
    assert_eq!(merged.lineage[3].id, "m11");
    assert_eq!(merged.merge_count, 12);
    assert_eq!(merged.elided, 8);
    assert_eq!(merged.tags.len(), 12);
}

#[test]
fn bounded_lineage_does_not_depend_on_ingest_order() {
    let config = DedupConfig {
        max_lineage: 3,
        ..DedupConfig::default()
    };
    let records: Vec<_> = (0..8)
        .map(|i| {
            record(&format!("m{i}"), "disk usage is high", "a", i as f64)
                .with_importance(i as f64 / 10.0)
        })
        .collect();
    let mut forward = Deduplicator::new(config.clone(), SimilarityEngine::lexical());
    let mut backward = Deduplicator::new(config, SimilarityEngine::lexical());
    for r in &records {
        forward.ingest(r.clone());
    }
    for r in records.iter().rev() {
        backward.ingest(r.clone());
    }
    let a = forward.records().next().unwrap();
    let b = backward.records().next().unwrap();
    assert_eq!(a.lineage, b.lineage);
    assert_eq!(a.merge_count, 8);
    assert_eq!(b.merge_count, 8);
    assert!((a.importance - b.importance).abs() < 1e-12);
}

#[test]
fn revert_undoes_a_merge() {
    let mut dedup = fixed(0.95);
    dedup.ingest(record("m1", "The sky is blue", "a", 0.0).with_tags(["w"]));
    dedup.ingest(record("m2", "Grass is green", "b", 5.0));
    let before: Vec<_> = dedup.records().cloned().collect();

    let (outcome, undo) =
        dedup.ingest_tracked(record("m0", "the sky is blue today", "a", -1.0).with_tags(["w"]));
    let DedupOutcome::Merged { survivor, retired, .. } = &outcome else {
        panic!("expected merge, got {outcome:?}");
    };
    assert_eq!(survivor, "m0");
    assert!(!retired.is_empty());
    assert!(!undo.is_empty());

    dedup.revert(undo);
    let after: Vec<_> = dedup.records().cloned().collect();
    assert_eq!(after, before);
}

#[test]
fn revert_drops_an_inserted_record() {
    let mut dedup = fixed(0.0);
    dedup.ingest(record("m1", "alpha", "a", 0.0));
    let (outcome, undo) = dedup.ingest_tracked(record("m2", "beta", "b", 40.0));
    assert!(matches!(outcome, DedupOutcome::Inserted { .. }));
    assert_eq!(dedup.len(), 2);
    dedup.revert(undo);
    assert_eq!(dedup.len(), 1);
    assert_eq!(dedup.records().next().unwrap().id, "m1");
}
