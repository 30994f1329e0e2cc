//! Last-Writer-Wins element set.
//!
//! Every key carries one entry: present or removed, plus the stamp of the
//! write that put it there. Merge keeps, per key, the entry with the greater
//! stamp. Equal wall times fall back to the logical clock (counter, then
//! replica id), so the larger replica id breaks exact ties.
//!
//! Used for: knowledge items keyed by id.
//!
//! ```
//! use chorus_crdt::LWWElementSet;
//! use chorus_core::{LogicalClock, LwwStamp};
//! use chrono::Utc;
//!
//! let now = Utc::now();
//! let mut a: LWWElementSet<&str, u32> = LWWElementSet::new();
//! a.insert("k", 1, LwwStamp::new(now, LogicalClock::at("a", 1)));
//! let mut b = a.clone();
//! b.remove("k", LwwStamp::new(now, LogicalClock::at("b", 2)));
//!
//! assert!(!a.merge(&b).contains(&"k"));
//! ```

use std::collections::BTreeMap;

use chorus_core::LwwStamp;
use serde::{Deserialize, Serialize};

/// State of one key: `value` is `None` once removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LwwEntry<V> {
    pub value: Option<V>,
    pub stamp: LwwStamp,
}

impl<V> LwwEntry<V> {
    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "K: Ord + Serialize, V: Serialize",
    deserialize = "K: Ord + Deserialize<'de>, V: Deserialize<'de>"
))]
pub struct LWWElementSet<K: Ord, V> {
    entries: BTreeMap<K, LwwEntry<V>>,
}

impl<K: Ord + Clone, V: Clone> LWWElementSet<K, V> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Add or overwrite `key`. Returns whether the write took effect.
    pub fn insert(&mut self, key: K, value: V, stamp: LwwStamp) -> bool {
        self.write(key, Some(value), stamp)
    }

    /// Remove `key`. Returns whether the write took effect.
    pub fn remove(&mut self, key: K, stamp: LwwStamp) -> bool {
        self.write(key, None, stamp)
    }

    fn write(&mut self, key: K, value: Option<V>, stamp: LwwStamp) -> bool {
        match self.entries.get_mut(&key) {
            Some(entry) if entry.stamp >= stamp => false,
            Some(entry) => {
                entry.value = value;
                entry.stamp = stamp;
                true
            }
            None => {
                self.entries.insert(key, LwwEntry { value, stamp });
                true
            }
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.get(key).is_some_and(LwwEntry::is_present)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key).and_then(|e| e.value.as_ref())
    }

    pub fn entry(&self, key: &K) -> Option<&LwwEntry<V>> {
        self.entries.get(key)
    }

    /// Present keys with their values.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries
            .iter()
            .filter_map(|(k, e)| e.value.as_ref().map(|v| (k, v)))
    }

    /// Number of present keys.
    pub fn len(&self) -> usize {
        self.entries.values().filter(|e| e.is_present()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.merge_in(other);
        merged
    }

    pub fn merge_in(&mut self, other: &Self) {
        for (key, theirs) in &other.entries {
            match self.entries.get_mut(key) {
                Some(ours) if ours.stamp >= theirs.stamp => {}
                Some(ours) => *ours = theirs.clone(),
                None => {
                    self.entries.insert(key.clone(), theirs.clone());
                }
            }
        }
    }
}

impl<K: Ord + Clone, V: Clone> Default for LWWElementSet<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_core::LogicalClock;
    use chrono::{Duration, Utc};

    #[test]
    fn later_wall_time_wins() {
        let now = Utc::now();
        let mut a: LWWElementSet<&str, ()> = LWWElementSet::new();
        a.remove("k", LwwStamp::new(now, LogicalClock::at("z", 9)));
        let mut b: LWWElementSet<&str, ()> = LWWElementSet::new();
        b.insert("k", (), LwwStamp::new(now + Duration::seconds(1), LogicalClock::at("a", 1)));
        assert!(a.merge(&b).contains(&"k"));
        assert!(b.merge(&a).contains(&"k"));
    }

    #[test]
    fn equal_wall_time_breaks_tie_on_clock() {
        let now = Utc::now();
        let mut a: LWWElementSet<&str, u8> = LWWElementSet::new();
        a.insert("k", 1, LwwStamp::new(now, LogicalClock::at("a", 3)));
        let mut b: LWWElementSet<&str, u8> = LWWElementSet::new();
        b.insert("k", 2, LwwStamp::new(now, LogicalClock::at("b", 3)));
        assert_eq!(a.merge(&b).get(&"k"), Some(&2));
        assert_eq!(b.merge(&a).get(&"k"), Some(&2));
    }

    #[test]
    fn stale_write_is_ignored() {
        let now = Utc::now();
        let mut s: LWWElementSet<&str, u8> = LWWElementSet::new();
        assert!(s.insert("k", 1, LwwStamp::new(now, LogicalClock::at("a", 2))));
        assert!(!s.remove("k", LwwStamp::new(now, LogicalClock::at("a", 1))));
        assert_eq!(s.len(), 1);
    }
}
