//! Grow-only set (G-Set) CRDT.
//!
//! ```
//! use chorus_crdt::GSet;
//!
//! let mut a = GSet::new();
//! a.insert("x");
//! let mut b = GSet::new();
//! b.insert("y");
//!
//! let merged = a.merge(&b);
//! assert!(merged.contains(&"x") && merged.contains(&"y"));
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// An add-only set. Merge = union.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "T: Ord + Serialize",
    deserialize = "T: Ord + Deserialize<'de>"
))]
pub struct GSet<T: Ord> {
    elements: BTreeSet<T>,
}

impl<T: Ord + Clone> GSet<T> {
    pub fn new() -> Self {
        Self {
            elements: BTreeSet::new(),
        }
    }

    /// Add an element. Returns `true` if it was not already present.
    pub fn insert(&mut self, element: T) -> bool {
        self.elements.insert(element)
    }

    pub fn contains(&self, element: &T) -> bool {
        self.elements.contains(element)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.elements.iter()
    }

    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.merge_in(other);
        merged
    }

    pub fn merge_in(&mut self, other: &Self) {
        self.elements.extend(other.elements.iter().cloned());
    }
}

impl<T: Ord + Clone> Default for GSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord + Clone> FromIterator<T> for GSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            elements: iter.into_iter().collect(),
        }
    }
}
