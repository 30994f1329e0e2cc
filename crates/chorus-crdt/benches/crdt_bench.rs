//! Criterion benchmarks for chorus-crdt merges.

use chorus_core::models::UniqueTag;
use chorus_core::{LogicalClock, LwwStamp, ReplicaId};
use chorus_crdt::{AddWinsSet, AgentStateCRDT, GCounter, LWWElementSet};
use chrono::Utc;
use criterion::{criterion_group, criterion_main, Criterion};

fn bench_gcounter_merge(c: &mut Criterion) {
    let mut a = GCounter::new();
    let mut b = GCounter::new();
    for i in 0..5 {
        a.raise_to(&ReplicaId::from(format!("replica-{i}")), i + 1);
        b.raise_to(&ReplicaId::from(format!("replica-{i}")), 5 - i);
    }
    c.bench_function("gcounter_merge_5_replicas", |bench| {
        bench.iter(|| a.merge(&b));
    });
}

fn bench_add_wins_merge(c: &mut Criterion) {
    let mut a = AddWinsSet::new();
    let mut b = AddWinsSet::new();
    for i in 0..1000u64 {
        a.add(format!("elem-{i}"), UniqueTag::new("a", i + 1));
        b.add(format!("elem-{}", i + 500), UniqueTag::new("b", i + 1));
    }
    c.bench_function("add_wins_set_merge_1000", |bench| {
        bench.iter(|| a.merge(&b));
    });
}

fn bench_lww_set_merge(c: &mut Criterion) {
    let now = Utc::now();
    let mut a: LWWElementSet<u64, u64> = LWWElementSet::new();
    let mut b: LWWElementSet<u64, u64> = LWWElementSet::new();
    for i in 0..1000u64 {
        a.insert(i, i, LwwStamp::new(now, LogicalClock::at("a", i + 1)));
        b.insert(i, i * 2, LwwStamp::new(now, LogicalClock::at("b", i + 1)));
    }
    c.bench_function("lww_element_set_merge_1000", |bench| {
        bench.iter(|| a.merge(&b));
    });
}

fn bench_agent_state_merge(c: &mut Criterion) {
    let mut a = AgentStateCRDT::new();
    let mut b = AgentStateCRDT::new();
    for i in 0..200u64 {
        let _ = a.apply_delta(&test_fixtures::memory_event("a", i + 1, &format!("fact a{i}")));
        let _ = b.apply_delta(&test_fixtures::belief_event("b", i + 1, &format!("b{i}"), 1, &["doc"]));
    }
    c.bench_function("agent_state_merge_400_deltas", |bench| {
        bench.iter(|| a.merge(&b));
    });
}

criterion_group!(
    benches,
    bench_gcounter_merge,
    bench_add_wins_merge,
    bench_lww_set_merge,
    bench_agent_state_merge
);
criterion_main!(benches);
