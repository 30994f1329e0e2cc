//! Grow-only counter (G-Counter) CRDT.
//!
//! Each replica maintains its own counter. The total value is the sum of all
//! replica counters. Merge takes the per-replica maximum.
//!
//! Used for: belief conviction.
//!
//! # Examples
//!
//! ```
//! use chorus_crdt::GCounter;
//! use chorus_core::ReplicaId;
//!
//! let mut a = GCounter::new();
//! a.increment(&ReplicaId::from("replica-1"));
//! a.increment(&ReplicaId::from("replica-1"));
//!
//! let mut b = GCounter::new();
//! b.increment(&ReplicaId::from("replica-2"));
//!
//! assert_eq!(a.merge(&b).value(), 3); // 2 + 1
//! ```

use std::collections::BTreeMap;

use chorus_core::ReplicaId;
use serde::{Deserialize, Serialize};

/// A grow-only counter where each replica maintains its own monotonically
/// increasing count. Merge = per-replica max. Value = sum of all counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GCounter {
    counts: BTreeMap<ReplicaId, u64>,
}

impl GCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the counter for the given replica by 1 and return its new count.
    pub fn increment(&mut self, replica: &ReplicaId) -> u64 {
        let entry = self.counts.entry(replica.clone()).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Raise a replica's count to `count`. Lower values are ignored, which
    /// makes replaying an absolute count idempotent.
    pub fn raise_to(&mut self, replica: &ReplicaId, count: u64) {
        if count == 0 {
            return;
        }
        let entry = self.counts.entry(replica.clone()).or_insert(0);
        *entry = (*entry).max(count);
    }

    /// Total value (sum of all replica counters).
    pub fn value(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Counter value for a specific replica.
    pub fn replica_value(&self, replica: &ReplicaId) -> u64 {
        self.counts.get(replica).copied().unwrap_or(0)
    }

    pub fn replicas(&self) -> impl Iterator<Item = &ReplicaId> {
        self.counts.keys()
    }

    /// Per-replica max. `merge(A, B).value() >= max(A.value(), B.value())`.
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.merge_in(other);
        merged
    }

    pub fn merge_in(&mut self, other: &Self) {
        for (replica, &other_val) in &other.counts {
            let entry = self.counts.entry(replica.clone()).or_insert(0);
            *entry = (*entry).max(other_val);
        }
    }
}
