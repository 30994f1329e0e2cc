//! Observed-remove set with add-wins semantics.
//!
//! Concurrent add + remove of the same element leaves the element PRESENT.
//! Each add carries a [`UniqueTag`]; remove tombstones only the tags it has
//! observed, so a concurrent add brings a tag the remove never saw.
//!
//! Used for: memory membership by content hash, belief evidence.
//!
//! # Examples
//!
//! ```
//! use chorus_crdt::AddWinsSet;
//! use chorus_core::models::UniqueTag;
//!
//! let mut a = AddWinsSet::new();
//! a.add("fact", UniqueTag::new("r1", 1));
//! let mut b = a.clone();
//!
//! b.remove(&"fact");                      // removes the tag it observed
//! a.add("fact", UniqueTag::new("r1", 2)); // concurrent re-add
//!
//! assert!(a.merge(&b).contains(&"fact"));
//! ```

use std::collections::{BTreeMap, BTreeSet};

use chorus_core::models::UniqueTag;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "T: Ord + Serialize",
    deserialize = "T: Ord + Deserialize<'de>"
))]
pub struct AddWinsSet<T: Ord> {
    /// Element -> tags of every add observed for it.
    adds: BTreeMap<T, BTreeSet<UniqueTag>>,
    /// Tombstoned add tags.
    tombstones: BTreeSet<UniqueTag>,
}

impl<T: Ord + Clone> AddWinsSet<T> {
    pub fn new() -> Self {
        Self {
            adds: BTreeMap::new(),
            tombstones: BTreeSet::new(),
        }
    }

    /// Record an add of `element` under `tag`. Re-adding a known tag is a no-op.
    pub fn add(&mut self, element: T, tag: UniqueTag) -> bool {
        self.adds.entry(element).or_default().insert(tag)
    }

    /// Tombstone every live tag of `element` and return them, so the removal
    /// can be shipped to other replicas.
    pub fn remove(&mut self, element: &T) -> Vec<UniqueTag> {
        let observed = self.live_tags(element);
        self.tombstones.extend(observed.iter().cloned());
        observed
    }

    /// Apply a removal observed elsewhere.
    pub fn remove_tags<'a>(&mut self, tags: impl IntoIterator<Item = &'a UniqueTag>) {
        self.tombstones.extend(tags.into_iter().cloned());
    }

    /// Tags of `element` not yet tombstoned.
    pub fn live_tags(&self, element: &T) -> Vec<UniqueTag> {
        self.adds
            .get(element)
            .map(|tags| {
                tags.iter()
                    .filter(|t| !self.tombstones.contains(*t))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Present iff at least one add tag survives.
    pub fn contains(&self, element: &T) -> bool {
        self.adds
            .get(element)
            .is_some_and(|tags| tags.iter().any(|t| !self.tombstones.contains(t)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.adds
            .iter()
            .filter(|(_, tags)| tags.iter().any(|t| !self.tombstones.contains(t)))
            .map(|(element, _)| element)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest add sequence number `replica` has used in this set.
    pub fn max_seq(&self, replica: &chorus_core::ReplicaId) -> u64 {
        self.adds
            .values()
            .flatten()
            .filter(|t| &t.replica == replica)
            .map(|t| t.seq)
            .max()
            .unwrap_or(0)
    }

    /// Union of add tags and tombstones; membership follows from the result.
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.merge_in(other);
        merged
    }

    pub fn merge_in(&mut self, other: &Self) {
        for (element, tags) in &other.adds {
            self.adds
                .entry(element.clone())
                .or_default()
                .extend(tags.iter().cloned());
        }
        self.tombstones.extend(other.tombstones.iter().cloned());
    }
}

impl<T: Ord + Clone> Default for AddWinsSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_only_covers_observed_tags() {
        let mut s = AddWinsSet::new();
        s.add("x", UniqueTag::new("a", 1));
        let removed = s.remove(&"x");
        assert_eq!(removed, vec![UniqueTag::new("a", 1)]);
        assert!(!s.contains(&"x"));

        s.add("x", UniqueTag::new("b", 1));
        assert!(s.contains(&"x"));
        assert_eq!(s.live_tags(&"x"), vec![UniqueTag::new("b", 1)]);
    }

    #[test]
    fn remote_removal_applies_by_tag() {
        let mut local = AddWinsSet::new();
        local.add("x", UniqueTag::new("a", 1));
        local.add("x", UniqueTag::new("a", 2));
        local.remove_tags(&[UniqueTag::new("a", 1)]);
        assert!(local.contains(&"x"));
        local.remove_tags(&[UniqueTag::new("a", 2)]);
        assert!(!local.contains(&"x"));
        assert_eq!(local.max_seq(&"a".into()), 2);
    }
}
