//! Causal delivery tracking.
//!
//! Per origin the tracker keeps a contiguous high-water mark plus the set of
//! counters delivered ahead of it. An event is applicable once every earlier
//! counter of its origin is delivered or accounted for by a coalesced event
//! that covers it. Everything else waits in a bounded buffer.

use std::collections::{BTreeMap, BTreeSet};

use chorus_core::{ExperienceEvent, LogicalClock, ReplicaId, SyncError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct OriginProgress {
    contiguous: u64,
    ahead: BTreeSet<u64>,
}

impl OriginProgress {
    fn contains(&self, counter: u64) -> bool {
        counter <= self.contiguous || self.ahead.contains(&counter)
    }

    fn insert(&mut self, counter: u64) {
        if counter > self.contiguous {
            self.ahead.insert(counter);
        }
        while self.ahead.remove(&(self.contiguous + 1)) {
            self.contiguous += 1;
        }
    }
}

/// What to do with an incoming event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Already delivered or already waiting in the buffer.
    Duplicate,
    Ready,
    /// Blocked on this clock of the same origin.
    Waiting(LogicalClock),
}

/// An event leaving the buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Released {
    Ready(ExperienceEvent),
    /// Delivered meanwhile through a coalesced event.
    Stale(ExperienceEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryTracker {
    delivered: BTreeMap<ReplicaId, OriginProgress>,
    buffer: BTreeMap<ReplicaId, BTreeMap<u64, ExperienceEvent>>,
    capacity: usize,
}

impl DeliveryTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            delivered: BTreeMap::new(),
            buffer: BTreeMap::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_delivered(&self, clock: &LogicalClock) -> bool {
        self.delivered
            .get(&clock.replica)
            .is_some_and(|p| p.contains(clock.counter))
    }

    /// Highest counter of `origin` below which nothing is missing.
    pub fn contiguous(&self, origin: &ReplicaId) -> u64 {
        self.delivered.get(origin).map_or(0, |p| p.contiguous)
    }

    /// Contiguous mark of every origin seen so far.
    pub fn digest(&self) -> BTreeMap<ReplicaId, u64> {
        self.delivered
            .iter()
            .map(|(origin, p)| (origin.clone(), p.contiguous))
            .collect()
    }

    /// Treat every counter of `origin` up to `counter` as delivered. Used
    /// after merging a state that already contains their effects.
    pub fn advance_to(&mut self, origin: &ReplicaId, counter: u64) {
        let progress = self.delivered.entry(origin.clone()).or_default();
        if counter > progress.contiguous {
            progress.contiguous = counter;
            progress.ahead.retain(|c| *c > counter);
            progress.insert(counter);
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.values().map(BTreeMap::len).sum()
    }

    pub fn is_buffered(&self, clock: &LogicalClock) -> bool {
        self.buffer
            .get(&clock.replica)
            .is_some_and(|events| events.contains_key(&clock.counter))
    }

    pub fn admit(&self, event: &ExperienceEvent) -> Admission {
        let clock = &event.logical_time;
        if self.is_delivered(clock) || self.is_buffered(clock) {
            return Admission::Duplicate;
        }
        match self.missing_predecessor(event) {
            None => Admission::Ready,
            Some(counter) => Admission::Waiting(LogicalClock::at(clock.replica.clone(), counter)),
        }
    }

    /// Hold `event` until its predecessors arrive.
    pub fn buffer(&mut self, event: ExperienceEvent) -> Result<(), SyncError> {
        if self.buffered() >= self.capacity {
            return Err(SyncError::CausalBufferFull {
                event_id: event.event_id,
                capacity: self.capacity,
            });
        }
        self.buffer
            .entry(event.origin_replica.clone())
            .or_default()
            .insert(event.logical_time.counter, event);
        Ok(())
    }

    /// Record `event` and every clock it covers as delivered.
    pub fn mark_delivered(&mut self, event: &ExperienceEvent) {
        let progress = self
            .delivered
            .entry(event.origin_replica.clone())
            .or_default();
        progress.insert(event.logical_time.counter);
        for covered in &event.covers {
            progress.insert(covered.counter);
        }
    }

    /// Take the next buffered event that can leave the buffer.
    pub fn next_release(&mut self) -> Option<Released> {
        let mut found: Option<(ReplicaId, u64, bool)> = None;
        'origins: for (origin, events) in &self.buffer {
            for (counter, event) in events {
                if self.is_delivered(&event.logical_time) {
                    found = Some((origin.clone(), *counter, true));
                    break 'origins;
                }
                if self.missing_predecessor(event).is_none() {
                    found = Some((origin.clone(), *counter, false));
                    break 'origins;
                }
            }
        }

        let (origin, counter, stale) = found?;
        let events = self.buffer.get_mut(&origin)?;
        let event = events.remove(&counter)?;
        if events.is_empty() {
            self.buffer.remove(&origin);
        }
        Some(if stale {
            Released::Stale(event)
        } else {
            Released::Ready(event)
        })
    }

    /// First earlier counter of the event's origin that is neither delivered
    /// nor covered, walking down from its immediate predecessor.
    fn missing_predecessor(&self, event: &ExperienceEvent) -> Option<u64> {
        let origin = &event.origin_replica;
        let progress = self.delivered.get(origin);
        let own: BTreeSet<u64> = event.covers.iter().map(|c| c.counter).collect();
        let mut counter = event.logical_time.counter.saturating_sub(1);
        while counter > 0 {
            if progress.is_some_and(|p| p.contains(counter)) {
                return None;
            }
            if !own.contains(&counter) && !self.covered_by_buffer(origin, counter) {
                return Some(counter);
            }
            counter -= 1;
        }
        None
    }

    /// Whether a buffered event of `origin` will account for `counter` once
    /// it is applied.
    fn covered_by_buffer(&self, origin: &ReplicaId, counter: u64) -> bool {
        self.buffer.get(origin).is_some_and(|events| {
            events
                .values()
                .any(|e| e.covers.iter().any(|c| c.counter == counter))
        })
    }
}
