//! Per-peer queue of unacknowledged events with latest-wins coalescing.
//!
//! Events are kept in `(origin, counter)` order and indexed by id and by
//! `(origin, record key)`, so duplicate checks, acks and coalescing touch
//! only the events involved. The queue is bounded; on overflow it is
//! cleared and the peer is flagged to receive the full state instead.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chorus_core::models::EventPayload;
use chorus_core::{ExperienceEvent, ReplicaId};
use tracing::{debug, warn};
use uuid::Uuid;

type Slot = (ReplicaId, u64);
type RecordGroup = (ReplicaId, String);

/// Events waiting to be acknowledged by one peer.
#[derive(Debug, Clone)]
pub struct Outbox {
    events: BTreeMap<Slot, ExperienceEvent>,
    ids: HashMap<Uuid, Slot>,
    groups: HashMap<RecordGroup, BTreeSet<u64>>,
    coalesce_threshold: usize,
    capacity: usize,
    overflowed: bool,
}

impl Outbox {
    pub fn new(coalesce_threshold: usize, capacity: usize) -> Self {
        Self {
            events: BTreeMap::new(),
            ids: HashMap::new(),
            groups: HashMap::new(),
            coalesce_threshold,
            capacity: capacity.max(1),
            overflowed: false,
        }
    }

    /// Queue `event` unless it or its clock is already queued. Past the
    /// threshold, the events touching the same record are coalesced.
    pub fn push(&mut self, event: ExperienceEvent) {
        let slot = (event.origin_replica.clone(), event.logical_time.counter);
        if self.ids.contains_key(&event.event_id) || self.events.contains_key(&slot) {
            return;
        }
        let group = (event.origin_replica.clone(), event.record_key());
        self.insert(event);
        if self.events.len() > self.coalesce_threshold {
            self.coalesce_group(&group);
        }
        if self.events.len() > self.capacity {
            warn!(
                capacity = self.capacity,
                "outbox overflowed, peer will be sent the full state"
            );
            self.clear();
            self.overflowed = true;
        }
    }

    /// Everything pending, ordered by origin then logical counter.
    pub fn batch(&self) -> Vec<ExperienceEvent> {
        self.events.values().cloned().collect()
    }

    /// Drop acknowledged events.
    pub fn ack(&mut self, event_ids: &BTreeSet<Uuid>) {
        for id in event_ids {
            if let Some(slot) = self.ids.get(id).cloned() {
                self.remove(&slot);
            }
        }
    }

    /// Whether the queue overflowed since the last call.
    pub fn take_overflow(&mut self) -> bool {
        std::mem::take(&mut self.overflowed)
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.ids.clear();
        self.groups.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn insert(&mut self, event: ExperienceEvent) {
        let slot = (event.origin_replica.clone(), event.logical_time.counter);
        self.ids.insert(event.event_id, slot.clone());
        self.groups
            .entry((slot.0.clone(), event.record_key()))
            .or_default()
            .insert(slot.1);
        self.events.insert(slot, event);
    }

    fn remove(&mut self, slot: &Slot) -> Option<ExperienceEvent> {
        let event = self.events.remove(slot)?;
        self.ids.remove(&event.event_id);
        let group = (slot.0.clone(), event.record_key());
        if let Some(counters) = self.groups.get_mut(&group) {
            counters.remove(&slot.1);
            if counters.is_empty() {
                self.groups.remove(&group);
            }
        }
        Some(event)
    }

    fn coalesce_group(&mut self, group: &RecordGroup) {
        let counters: Vec<u64> = match self.groups.get(group) {
            Some(counters) if counters.len() > 1 => counters.iter().copied().collect(),
            _ => return,
        };
        let before = counters.len();
        let events: Vec<ExperienceEvent> = counters
            .into_iter()
            .filter_map(|counter| self.remove(&(group.0.clone(), counter)))
            .collect();
        let kept = coalesce(events);
        let after = kept.len();
        for event in kept {
            self.insert(event);
        }
        if after < before {
            debug!(record = %group.1, before, after, "outbox coalesced");
        }
    }
}

/// Collapse events whose effect a later event from the same origin already
/// contains. The survivor lists the clocks it replaces in `covers`.
pub fn coalesce(events: Vec<ExperienceEvent>) -> Vec<ExperienceEvent> {
    let mut out: Vec<ExperienceEvent> = Vec::with_capacity(events.len());
    for event in events {
        if let Some(slot) = out.iter().position(|kept| subsumes(&event, kept)) {
            let replaced = std::mem::replace(&mut out[slot], event);
            absorb_covers(&mut out[slot], &replaced);
        } else if let Some(slot) = out.iter().position(|kept| subsumes(kept, &event)) {
            absorb_covers(&mut out[slot], &event);
        } else {
            out.push(event);
        }
    }
    out
}

fn absorb_covers(survivor: &mut ExperienceEvent, dropped: &ExperienceEvent) {
    let mut covers: BTreeSet<_> = survivor.covers.drain(..).collect();
    covers.extend(dropped.covers.iter().cloned());
    covers.insert(dropped.logical_time.clone());
    survivor.covers = covers.into_iter().collect();
}

/// Whether applying `later` alone leaves the same state as applying both.
fn subsumes(later: &ExperienceEvent, earlier: &ExperienceEvent) -> bool {
    if later.origin_replica != earlier.origin_replica
        || later.logical_time.counter <= earlier.logical_time.counter
        || later.attestation.is_some()
        || earlier.attestation.is_some()
        || later.record_key() != earlier.record_key()
        || later.stamp() <= earlier.stamp()
    {
        return false;
    }
    match (&later.payload, &earlier.payload) {
        (EventPayload::KnowledgeUpdate(_), EventPayload::KnowledgeUpdate(_)) => true,
        (EventPayload::BeliefUpdate(l), EventPayload::BeliefUpdate(e)) => {
            l.conviction >= e.conviction && e.evidence.iter().all(|ev| l.evidence.contains(ev))
        }
        (EventPayload::MemoryAdd(l), EventPayload::MemoryAdd(e)) => {
            l.tag == e.tag && e.retired.iter().all(|r| l.retired.contains(r))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_core::LogicalClock;
    use test_fixtures::{belief_event, knowledge_event, memory_event};

    #[test]
    fn latest_knowledge_write_wins_and_covers_the_rest() {
        let events = vec![
            knowledge_event("a", 1, "k1", 0.1, true),
            knowledge_event("a", 2, "k2", 0.2, true),
            knowledge_event("a", 3, "k1", 0.3, true),
            knowledge_event("a", 4, "k1", 0.4, false),
        ];
        let out = coalesce(events);
        assert_eq!(out.len(), 2);
        let k1 = out.iter().find(|e| e.record_key() == "knowledge:k1").unwrap();
        assert_eq!(k1.logical_time.counter, 4);
        assert_eq!(
            k1.covers,
            vec![LogicalClock::at("a", 1), LogicalClock::at("a", 3)]
        );
    }

    #[test]
    fn different_origins_never_coalesce() {
        let out = coalesce(vec![
            knowledge_event("a", 1, "k1", 0.1, true),
            knowledge_event("b", 2, "k1", 0.2, true),
        ]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn belief_coalesces_only_when_evidence_is_contained() {
        let out = coalesce(vec![
            belief_event("a", 1, "b1", 1, &[]),
            belief_event("a", 2, "b1", 2, &[]),
        ]);
        assert_eq!(out.len(), 1);

        // Tags differ per event, so the earlier evidence is not contained.
        let out = coalesce(vec![
            belief_event("a", 1, "b1", 1, &["doc"]),
            belief_event("a", 2, "b1", 2, &["doc"]),
        ]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn memory_adds_with_distinct_tags_are_kept() {
        let out = coalesce(vec![
            memory_event("a", 1, "fact"),
            memory_event("a", 2, "fact"),
        ]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn outbox_coalesces_past_threshold_and_acks() {
        let mut outbox = Outbox::new(2, 64);
        for counter in 1..=5 {
            outbox.push(knowledge_event("a", counter, "k1", 0.5, true));
        }
        assert_eq!(outbox.len(), 1);
        let batch = outbox.batch();
        assert_eq!(batch[0].logical_time.counter, 5);
        assert_eq!(batch[0].covers.len(), 4);

        outbox.push(batch[0].clone());
        assert_eq!(outbox.len(), 1);

        let ids: BTreeSet<Uuid> = batch.iter().map(|e| e.event_id).collect();
        outbox.ack(&ids);
        assert!(outbox.is_empty());
    }

    #[test]
    fn below_threshold_nothing_is_coalesced() {
        let mut outbox = Outbox::new(8, 64);
        for counter in 1..=3 {
            outbox.push(knowledge_event("a", counter, "k1", 0.5, true));
        }
        assert_eq!(outbox.len(), 3);
    }

    #[test]
    fn coalescing_only_touches_the_pushed_record() {
        let mut outbox = Outbox::new(3, 64);
        outbox.push(knowledge_event("a", 1, "k1", 0.1, true));
        outbox.push(knowledge_event("a", 2, "k2", 0.2, true));
        outbox.push(knowledge_event("a", 3, "k2", 0.3, true));
        outbox.push(knowledge_event("a", 4, "k1", 0.4, true));
        // k1 collapsed into counter 4; the two k2 writes wait for their next push.
        let counters: Vec<u64> = outbox
            .batch()
            .iter()
            .map(|e| e.logical_time.counter)
            .collect();
        assert_eq!(counters, vec![2, 3, 4]);
    }

    #[test]
    fn same_clock_is_queued_once() {
        let mut outbox = Outbox::new(8, 64);
        let first = knowledge_event("a", 1, "k1", 0.1, true);
        let mut rival = knowledge_event("a", 1, "k1", 0.9, true);
        rival.event_id = Uuid::from_u128(42);
        outbox.push(first.clone());
        outbox.push(rival);
        assert_eq!(outbox.batch(), vec![first]);
    }

    #[test]
    fn overflow_clears_the_queue_and_is_reported_once() {
        let mut outbox = Outbox::new(2, 3);
        for counter in 1..=4 {
            outbox.push(memory_event("a", counter, &format!("fact {counter}")));
        }
        assert!(outbox.is_empty());
        assert!(outbox.take_overflow());
        assert!(!outbox.take_overflow());

        outbox.push(memory_event("a", 5, "fact 5"));
        assert_eq!(outbox.len(), 1);
    }

    #[test]
    fn large_queue_of_distinct_records_stays_ordered() {
        let mut outbox = Outbox::new(16, 10_000);
        for counter in (1..=2_000).rev() {
            outbox.push(knowledge_event("a", counter, &format!("k{counter}"), 0.5, true));
        }
        assert_eq!(outbox.len(), 2_000);
        let batch = outbox.batch();
        assert_eq!(batch.first().unwrap().logical_time.counter, 1);
        assert_eq!(batch.last().unwrap().logical_time.counter, 2_000);

        let acked: BTreeSet<Uuid> = batch[..1_000].iter().map(|e| e.event_id).collect();
        outbox.ack(&acked);
        assert_eq!(outbox.len(), 1_000);
    }
}
