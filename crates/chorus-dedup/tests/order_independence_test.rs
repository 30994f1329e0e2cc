//! Ingest order never changes the deduplicated record set.

use chorus_core::config::DedupConfig;
use chorus_core::MemoryRecord;
use chorus_dedup::{Deduplicator, SimilarityEngine};
use proptest::prelude::*;
use test_fixtures::record;

fn ingest_all(records: &[MemoryRecord]) -> Vec<MemoryRecord> {
    let mut dedup = Deduplicator::new(DedupConfig::default(), SimilarityEngine::lexical());
    for r in records {
        dedup.ingest(r.clone());
    }
    let mut out: Vec<MemoryRecord> = dedup.records().cloned().collect();
    out.sort_by(|a, b| a.id.cmp(&b.id));
    out
}

fn assert_same_set(a: &[MemoryRecord], b: &[MemoryRecord]) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b) {
        assert_eq!(x.id, y.id);
        assert_eq!(x.content, y.content);
        assert_eq!(x.tags, y.tags);
        assert_eq!(x.merge_count, y.merge_count);
        assert!((x.importance - y.importance).abs() < 1e-9);
        assert!((x.confidence - y.confidence).abs() < 1e-9);
    }
}

/// R1–R2 and R2–R3 clear the threshold, R1–R3 does not: R2 bridges them.
fn chained() -> Vec<MemoryRecord> {
    vec![
        record("r1", "one two three four five six seven", "a", 0.0)
            .with_importance(0.2)
            .with_tags(["n"]),
        record("r2", "one two three four five six seven eight", "a", 0.1)
            .with_importance(0.6)
            .with_tags(["n"]),
        record("r3", "two three four five six seven eight nine", "a", 0.2)
            .with_importance(0.9)
            .with_tags(["n"]),
    ]
}

fn permutations(n: usize) -> Vec<Vec<usize>> {
    if n == 0 {
        return vec![Vec::new()];
    }
    let mut out = Vec::new();
    for p in permutations(n - 1) {
        for i in 0..=p.len() {
            let mut q = p.clone();
            q.insert(i, n - 1);
            out.push(q);
        }
    }
    out
}

#[test]
fn all_six_orders_of_a_chain_converge() {
    let base = chained();
    let reference = ingest_all(&base);
    assert_eq!(reference.len(), 1);
    assert_eq!(reference[0].merge_count, 3);
    // 0.2 → 0.6*0.6+0.4*0.2 = 0.44 → 0.6*0.9+0.4*0.44 = 0.716
    assert!((reference[0].importance - 0.716).abs() < 1e-9);

    let orders = permutations(3);
    assert_eq!(orders.len(), 6);
    for order in orders {
        let shuffled: Vec<MemoryRecord> = order.iter().map(|&i| base[i].clone()).collect();
        assert_same_set(&ingest_all(&shuffled), &reference);
    }
}

#[test]
fn unrelated_record_stays_separate_in_every_order() {
    let mut base = chained();
    base.push(record("r4", "grass is green", "b", 5.0).with_tags(["flora"]));
    let reference = ingest_all(&base);
    assert_eq!(reference.len(), 2);
    for order in permutations(4) {
        let shuffled: Vec<MemoryRecord> = order.iter().map(|&i| base[i].clone()).collect();
        assert_same_set(&ingest_all(&shuffled), &reference);
    }
}

#[test]
fn re_ingesting_the_same_set_is_idempotent() {
    let base = chained();
    let mut twice = base.clone();
    twice.extend(base.iter().cloned());
    assert_same_set(&ingest_all(&twice), &ingest_all(&base));
}

const WORDS: [&str; 6] = ["sky", "blue", "grass", "green", "sea", "deep"];

fn record_strategy() -> impl Strategy<Value = (Vec<usize>, u8, u8, usize)> {
    (
        proptest::collection::vec(0usize..WORDS.len(), 1..4),
        0u8..=10,
        0u8..6,
        0usize..2,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn any_permutation_yields_the_same_set(
        specs in proptest::collection::vec(record_strategy(), 1..6),
        seed in any::<u64>(),
    ) {
        let base: Vec<MemoryRecord> = specs
            .iter()
            .enumerate()
            .map(|(i, (words, importance, hours, tag))| {
                let content: Vec<&str> = words.iter().map(|&w| WORDS[w]).collect();
                record(&format!("r{i}"), &content.join(" "), "a", *hours as f64)
                    .with_importance(*importance as f64 / 10.0)
                    .with_tags([["t0", "t1"][*tag]])
            })
            .collect();
        let mut shuffled = base.clone();
        // Deterministic Fisher-Yates driven by the seed.
        let mut state = seed;
        for i in (1..shuffled.len()).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let j = (state >> 33) as usize % (i + 1);
            shuffled.swap(i, j);
        }
        let a = ingest_all(&base);
        let b = ingest_all(&shuffled);
        prop_assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            prop_assert_eq!(&x.id, &y.id);
            prop_assert_eq!(x.merge_count, y.merge_count);
            prop_assert!((x.importance - y.importance).abs() < 1e-9);
        }
    }
}
