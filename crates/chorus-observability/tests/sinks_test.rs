use std::sync::Arc;

use chorus_core::config::ObservabilityConfig;
use chorus_core::models::{ClaimDecision, ClaimState, DegradationEvent, SyncRecord};
use chorus_core::traits::IEventSink;
use chorus_core::ReplicaId;
use chorus_observability::tracing_setup::{self, spans::names};
use chorus_observability::{FanoutSink, MemorySink, MetricsSink, TracingSink};
use chrono::Utc;
use uuid::Uuid;

fn decision(state: ClaimState) -> SyncRecord {
    SyncRecord::ClaimDecided(ClaimDecision {
        claim_id: Uuid::new_v4(),
        state,
        value: None,
        voters: Vec::new(),
        outliers: Vec::new(),
        equivocators: Vec::new(),
        votes_received: 1,
        quorum: 7,
        reason: "test".to_string(),
        decided_at: Utc::now(),
    })
}

fn degradation() -> SyncRecord {
    SyncRecord::Degradation(DegradationEvent {
        component: "similarity".to_string(),
        failure: "offline".to_string(),
        fallback_used: "lexical-token-overlap".to_string(),
        timestamp: Utc::now(),
    })
}

#[test]
fn fanout_reaches_every_sink() {
    let memory = Arc::new(MemorySink::new());
    let metrics = Arc::new(MetricsSink::new());
    let fanout = FanoutSink::default()
        .with(Arc::new(TracingSink))
        .with(memory.clone())
        .with(metrics.clone());
    assert_eq!(fanout.len(), 3);

    fanout.publish(SyncRecord::MemoryIngested {
        replica: ReplicaId::from("a"),
        id: "m1".to_string(),
    });
    fanout.publish(decision(ClaimState::Accepted));
    fanout.publish(decision(ClaimState::Expired));
    fanout.publish(SyncRecord::GossipRoundCompleted {
        replica: ReplicaId::from("a"),
        round: 1,
        selected: 3,
        delivered: 2,
        unreachable: 1,
        events_sent: 5,
    });

    assert_eq!(memory.records().len(), 4);
    assert_eq!(memory.count("claim_decided"), 2);
    assert_eq!(memory.named("memory_ingested").len(), 1);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.claims_accepted, 1);
    assert_eq!(snapshot.claims_expired, 1);
    assert_eq!(snapshot.events_sent, 5);
    assert_eq!(snapshot.records.get("claim_decided"), Some(&2));
}

#[test]
fn degradations_are_tracked_until_recovery() {
    let metrics = MetricsSink::new();
    metrics.publish(degradation());
    assert_eq!(metrics.snapshot().active_degradations, 1);
    assert_eq!(metrics.metrics().count("degradation"), 1);

    assert!(metrics.mark_recovered("similarity"));
    assert_eq!(metrics.snapshot().active_degradations, 0);
}

#[test]
fn snapshot_serializes() {
    let metrics = MetricsSink::new();
    metrics.publish(decision(ClaimState::Rejected));
    let json = serde_json::to_value(metrics.snapshot()).unwrap();
    assert_eq!(json["claims_rejected"], 1);
}

#[test]
fn memory_sink_clears() {
    let sink = MemorySink::new();
    sink.publish(degradation());
    sink.clear();
    assert!(sink.records().is_empty());
}

#[test]
fn init_is_idempotent() {
    let config = ObservabilityConfig::default();
    let _ = tracing_setup::init(&config);
    assert!(!tracing_setup::init(&config));
    assert!(!tracing_setup::init_for_tests());
}

#[test]
fn span_macros_use_named_spans() {
    let replica = ReplicaId::from("a");
    let span = chorus_observability::gossip_round_span!(replica, 3u64);
    let _guard = span.enter();
    let _ingest = chorus_observability::ingest_span!(replica);
    let _vote = chorus_observability::vote_span!(Uuid::nil(), replica);
    let _apply = chorus_observability::apply_span!(replica, Uuid::nil(), replica);
    assert_eq!(names::GOSSIP_ROUND, "chorus.gossip_round");
}
