use chorus_core::models::{EventPayload, MemoryAdd, RetiredKey, UniqueTag};
use chorus_core::{ReplicaId, SyncError};
use chorus_crdt::{AgentStateCRDT, StateField};
use test_fixtures::{belief_event, knowledge_event, memory_event};

#[test]
fn redelivered_delta_is_a_no_op() {
    let mut state = AgentStateCRDT::new();
    let event = memory_event("a", 1, "The sky is blue");
    state.apply_delta(&event).unwrap();
    let once = state.clone();
    state.apply_delta(&event).unwrap();
    assert_eq!(state, once);
    assert_eq!(state.memories.len(), 1);
}

#[test]
fn apply_routes_by_payload_kind() {
    let mut state = AgentStateCRDT::new();
    assert_eq!(
        state.apply_delta(&memory_event("a", 1, "fact")).unwrap(),
        StateField::Memories
    );
    assert_eq!(
        state
            .apply_delta(&knowledge_event("a", 2, "k1", 0.9, true))
            .unwrap(),
        StateField::Knowledge
    );
    assert_eq!(
        state
            .apply_delta(&belief_event("a", 3, "b1", 2, &["doc-1"]))
            .unwrap(),
        StateField::Beliefs
    );
    assert!(state.knowledge.contains(&"k1".to_string()));
    assert_eq!(state.belief("b1").unwrap().conviction(), 2);
}

#[test]
fn delta_aimed_at_wrong_field_is_rejected() {
    let mut state = AgentStateCRDT::new();
    let event = knowledge_event("a", 1, "k1", 0.9, true);
    let err = state
        .apply_delta_to(StateField::Memories, &event)
        .unwrap_err();
    assert!(matches!(err, SyncError::PayloadMismatch { .. }));
    assert_eq!(state, AgentStateCRDT::new());
}

#[test]
fn out_of_range_numbers_are_malformed() {
    let mut state = AgentStateCRDT::new();
    let event = knowledge_event("a", 1, "k1", 1.7, true);
    let err = state.apply_delta(&event).unwrap_err();
    assert!(matches!(err, SyncError::MalformedEvent { .. }));
}

#[test]
fn belief_conviction_counts_each_replica_once() {
    let mut state = AgentStateCRDT::new();
    state.apply_delta(&belief_event("a", 1, "b1", 1, &[])).unwrap();
    state.apply_delta(&belief_event("a", 2, "b1", 2, &[])).unwrap();
    state.apply_delta(&belief_event("b", 1, "b1", 1, &["doc"])).unwrap();
    // Replay of an older absolute count changes nothing.
    state.apply_delta(&belief_event("a", 1, "b1", 1, &[])).unwrap();

    let belief = state.belief("b1").unwrap();
    assert_eq!(belief.conviction(), 3);
    assert_eq!(belief.supporting_replicas.len(), 2);
    assert_eq!(belief.evidence().count(), 1);
}

#[test]
fn knowledge_retraction_follows_last_writer() {
    let mut a = AgentStateCRDT::new();
    let mut b = AgentStateCRDT::new();
    a.apply_delta(&knowledge_event("a", 1, "k1", 0.4, true)).unwrap();
    b.apply_delta(&knowledge_event("b", 5, "k1", 0.0, false)).unwrap();
    let merged = a.merge(&b);
    assert_eq!(merged, b.merge(&a));
    assert!(!merged.knowledge.contains(&"k1".to_string()));
}

#[test]
fn retired_hash_leaves_membership_unless_re_added() {
    let mut state = AgentStateCRDT::new();
    let old = memory_event("a", 1, "old phrasing");
    state.apply_delta(&old).unwrap();
    let EventPayload::MemoryAdd(old_add) = &old.payload else {
        panic!("expected memory add");
    };

    let mut newer = memory_event("a", 2, "new phrasing");
    if let EventPayload::MemoryAdd(MemoryAdd { retired, .. }) = &mut newer.payload {
        retired.push(RetiredKey {
            hash: old_add.hash.clone(),
            tags: state.memories.live_tags(&old_add.hash),
        });
    }

    // A concurrent replica re-observes the old phrasing under a fresh tag.
    let mut concurrent = old.clone();
    concurrent.origin_replica = ReplicaId::from("b");
    concurrent.logical_time = chorus_core::LogicalClock::at("b", 1);
    if let EventPayload::MemoryAdd(add) = &mut concurrent.payload {
        add.tag = UniqueTag::new("b", 1);
    }

    let mut retired_only = state.clone();
    retired_only.apply_delta(&newer).unwrap();
    assert!(!retired_only.memories.contains(&old_add.hash));
    assert_eq!(retired_only.memories.len(), 1);

    let mut both = retired_only.clone();
    both.apply_delta(&concurrent).unwrap();
    assert!(both.memories.contains(&old_add.hash));
    assert_eq!(both.memories.len(), 2);
}

#[test]
fn components_expose_every_set_valued_field() {
    let mut state = AgentStateCRDT::new();
    state.apply_delta(&belief_event("a", 1, "b1", 1, &["doc"])).unwrap();
    let names: Vec<String> = state.components().into_iter().map(|(n, _)| n).collect();
    assert!(names.contains(&"memories.members".to_string()));
    assert!(names.contains(&"knowledge".to_string()));
    assert!(names.contains(&"beliefs.b1.conviction".to_string()));
    assert!(names.contains(&"beliefs.b1.evidence".to_string()));
}
