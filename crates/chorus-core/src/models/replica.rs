use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque, stable identifier of one agent instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplicaId(String);

impl ReplicaId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReplicaId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ReplicaId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ReplicaId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// `(replica, counter)` pair. The counter of one replica only ever grows by
/// one per event it originates, so the sequence per replica is contiguous.
///
/// Ordered by counter first, then replica id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalClock {
    pub replica: ReplicaId,
    pub counter: u64,
}

impl LogicalClock {
    /// A fresh clock at counter 0 (no events originated yet).
    pub fn new(replica: ReplicaId) -> Self {
        Self {
            replica,
            counter: 0,
        }
    }

    pub fn at(replica: impl Into<ReplicaId>, counter: u64) -> Self {
        Self {
            replica: replica.into(),
            counter,
        }
    }

    /// Advance by one and return the new value.
    pub fn tick(&mut self) -> LogicalClock {
        self.counter += 1;
        self.clone()
    }

    /// Raise the counter to at least `counter`. Never lowers it.
    pub fn advance_to(&mut self, counter: u64) {
        self.counter = self.counter.max(counter);
    }
}

impl Ord for LogicalClock {
    fn cmp(&self, other: &Self) -> Ordering {
        self.counter
            .cmp(&other.counter)
            .then_with(|| self.replica.cmp(&other.replica))
    }
}

impl PartialOrd for LogicalClock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for LogicalClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.replica, self.counter)
    }
}

/// Ordering stamp for last-writer-wins registers and sets.
///
/// Wall time first, then the logical clock. The clock is unique per
/// operation, so two distinct writes never compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LwwStamp {
    pub at: DateTime<Utc>,
    pub clock: LogicalClock,
}

impl LwwStamp {
    pub fn new(at: DateTime<Utc>, clock: LogicalClock) -> Self {
        Self { at, clock }
    }

    pub fn replica(&self) -> &ReplicaId {
        &self.clock.replica
    }
}

/// Unique token tagging one add operation in an add-wins set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UniqueTag {
    pub replica: ReplicaId,
    pub seq: u64,
}

impl UniqueTag {
    pub fn new(replica: impl Into<ReplicaId>, seq: u64) -> Self {
        Self {
            replica: replica.into(),
            seq,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_orders_by_counter_then_replica() {
        let a = LogicalClock::at("b", 1);
        let b = LogicalClock::at("a", 2);
        let c = LogicalClock::at("b", 2);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn tick_and_advance_never_decrease() {
        let mut clock = LogicalClock::new(ReplicaId::from("r1"));
        assert_eq!(clock.tick().counter, 1);
        clock.advance_to(7);
        assert_eq!(clock.counter, 7);
        clock.advance_to(3);
        assert_eq!(clock.counter, 7);
    }

    #[test]
    fn stamp_prefers_wall_time() {
        let now = Utc::now();
        let earlier = LwwStamp::new(now - chrono::Duration::seconds(1), LogicalClock::at("z", 99));
        let later = LwwStamp::new(now, LogicalClock::at("a", 1));
        assert!(earlier < later);
    }
}
