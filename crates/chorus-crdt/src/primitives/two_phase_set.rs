//! Two-phase set: an add set and a remove set, both grow-only. Once removed,
//! an element can never come back.

use serde::{Deserialize, Serialize};

use super::gset::GSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "T: Ord + Serialize",
    deserialize = "T: Ord + Deserialize<'de>"
))]
pub struct TwoPSet<T: Ord> {
    added: GSet<T>,
    removed: GSet<T>,
}

impl<T: Ord + Clone> TwoPSet<T> {
    pub fn new() -> Self {
        Self {
            added: GSet::new(),
            removed: GSet::new(),
        }
    }

    /// Returns `false` if the element is already present or tombstoned.
    pub fn insert(&mut self, element: T) -> bool {
        if self.removed.contains(&element) {
            return false;
        }
        self.added.insert(element)
    }

    /// Tombstone `element` permanently.
    pub fn remove(&mut self, element: T) -> bool {
        self.removed.insert(element)
    }

    pub fn contains(&self, element: &T) -> bool {
        self.added.contains(element) && !self.removed.contains(element)
    }

    pub fn is_tombstoned(&self, element: &T) -> bool {
        self.removed.contains(element)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.added.iter().filter(|e| !self.removed.contains(e))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
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
        self.added.merge_in(&other.added);
        self.removed.merge_in(&other.removed);
    }
}

impl<T: Ord + Clone> Default for TwoPSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_is_permanent() {
        let mut s = TwoPSet::new();
        s.insert("a");
        s.remove("a");
        assert!(!s.insert("a"));
        assert!(!s.contains(&"a"));

        let mut other = TwoPSet::new();
        other.insert("a");
        assert!(!other.merge(&s).contains(&"a"));
    }
}
