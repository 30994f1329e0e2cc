//! Closed sum type over the replicated set and counter primitives.
//!
//! One `merge` with an exhaustive match replaces dynamic dispatch across
//! CRDT kinds. Two values of different kinds join by kind rank: the higher
//! ranked value wins outright. This keeps `merge` total while preserving
//! commutativity, associativity and idempotence.

use serde::{Deserialize, Serialize};

use crate::primitives::{AddWinsSet, GCounter, GSet, LWWElementSet, TwoPSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "crdt", content = "state", rename_all = "snake_case")]
#[serde(bound(
    serialize = "K: Ord + Serialize, V: Serialize",
    deserialize = "K: Ord + Deserialize<'de>, V: Deserialize<'de>"
))]
pub enum CrdtValue<K: Ord, V = ()> {
    GSet(GSet<K>),
    GCounter(GCounter),
    TwoPSet(TwoPSet<K>),
    LwwElementSet(LWWElementSet<K, V>),
    AddWinsSet(AddWinsSet<K>),
}

impl<K: Ord + Clone, V: Clone> CrdtValue<K, V> {
    pub fn kind(&self) -> &'static str {
        match self {
            CrdtValue::GSet(_) => "g_set",
            CrdtValue::GCounter(_) => "g_counter",
            CrdtValue::TwoPSet(_) => "two_p_set",
            CrdtValue::LwwElementSet(_) => "lww_element_set",
            CrdtValue::AddWinsSet(_) => "add_wins_set",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            CrdtValue::GSet(_) => 0,
            CrdtValue::GCounter(_) => 1,
            CrdtValue::TwoPSet(_) => 2,
            CrdtValue::LwwElementSet(_) => 3,
            CrdtValue::AddWinsSet(_) => 4,
        }
    }

    pub fn merge(&self, other: &Self) -> Self {
        match (self, other) {
            (CrdtValue::GSet(a), CrdtValue::GSet(b)) => CrdtValue::GSet(a.merge(b)),
            (CrdtValue::GCounter(a), CrdtValue::GCounter(b)) => CrdtValue::GCounter(a.merge(b)),
            (CrdtValue::TwoPSet(a), CrdtValue::TwoPSet(b)) => CrdtValue::TwoPSet(a.merge(b)),
            (CrdtValue::LwwElementSet(a), CrdtValue::LwwElementSet(b)) => {
                CrdtValue::LwwElementSet(a.merge(b))
            }
            (CrdtValue::AddWinsSet(a), CrdtValue::AddWinsSet(b)) => {
                CrdtValue::AddWinsSet(a.merge(b))
            }
            _ if self.rank() >= other.rank() => self.clone(),
            _ => other.clone(),
        }
    }
}
