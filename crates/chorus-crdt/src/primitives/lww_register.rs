//! Last-Writer-Wins Register (LWW-Register) CRDT.
//!
//! Each write carries an [`LwwStamp`]: wall time, then logical clock. Merge
//! keeps the value with the greater stamp. Stamps are unique per write, so
//! two registers holding the same stamp hold the same value.
//!
//! Used for: memory record bodies, belief statements.

use chorus_core::LwwStamp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LWWRegister<T> {
    value: T,
    stamp: LwwStamp,
}

impl<T: Clone> LWWRegister<T> {
    pub fn new(value: T, stamp: LwwStamp) -> Self {
        Self { value, stamp }
    }

    /// Write `value` if `stamp` is newer than the current one. Returns
    /// whether the write took effect.
    pub fn set(&mut self, value: T, stamp: LwwStamp) -> bool {
        if stamp > self.stamp {
            self.value = value;
            self.stamp = stamp;
            true
        } else {
            false
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn stamp(&self) -> &LwwStamp {
        &self.stamp
    }

    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.merge_in(other);
        merged
    }

    pub fn merge_in(&mut self, other: &Self) {
        if other.stamp > self.stamp {
            self.value = other.value.clone();
            self.stamp = other.stamp.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_core::LogicalClock;
    use chrono::Utc;

    #[test]
    fn newer_stamp_wins_regardless_of_merge_order() {
        let now = Utc::now();
        let a = LWWRegister::new("old", LwwStamp::new(now, LogicalClock::at("a", 1)));
        let b = LWWRegister::new("new", LwwStamp::new(now, LogicalClock::at("a", 2)));
        assert_eq!(*a.merge(&b).get(), "new");
        assert_eq!(*b.merge(&a).get(), "new");
    }

    #[test]
    fn stale_set_is_ignored() {
        let now = Utc::now();
        let mut r = LWWRegister::new(1, LwwStamp::new(now, LogicalClock::at("a", 5)));
        assert!(!r.set(2, LwwStamp::new(now, LogicalClock::at("a", 4))));
        assert_eq!(*r.get(), 1);
        assert!(r.set(3, LwwStamp::new(now, LogicalClock::at("b", 5))));
        assert_eq!(*r.get(), 3);
    }
}
