use chorus_core::models::{BeliefUpdate, UniqueTag};
use chorus_core::{LwwStamp, ReplicaId};
use serde::{Deserialize, Serialize};

use crate::primitives::{AddWinsSet, GCounter, GSet, LWWRegister};

/// One belief: its statement, conviction per replica, who supports it, and
/// the evidence gathered for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeliefState {
    pub statement: LWWRegister<String>,
    pub conviction: GCounter,
    pub supporting_replicas: GSet<ReplicaId>,
    pub evidence: AddWinsSet<String>,
}

impl BeliefState {
    /// State holding just the effect of one update from `origin`.
    pub fn from_update(update: &BeliefUpdate, origin: &ReplicaId, stamp: LwwStamp) -> Self {
        let mut conviction = GCounter::new();
        conviction.raise_to(origin, update.conviction);
        let mut supporting_replicas = GSet::new();
        if update.conviction > 0 {
            supporting_replicas.insert(origin.clone());
        }
        let mut evidence = AddWinsSet::new();
        for item in &update.evidence {
            evidence.add(item.reference.clone(), item.tag.clone());
        }
        Self {
            statement: LWWRegister::new(update.statement.clone(), stamp),
            conviction,
            supporting_replicas,
            evidence,
        }
    }

    pub fn conviction(&self) -> u64 {
        self.conviction.value()
    }

    pub fn evidence(&self) -> impl Iterator<Item = &String> {
        self.evidence.iter()
    }

    pub fn max_tag_seq(&self, replica: &ReplicaId) -> u64 {
        self.evidence.max_seq(replica)
    }

    /// Tags of `reference` still live in this belief.
    pub fn evidence_tags(&self, reference: &String) -> Vec<UniqueTag> {
        self.evidence.live_tags(reference)
    }

    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.merge_in(other);
        merged
    }

    pub fn merge_in(&mut self, other: &Self) {
        self.statement.merge_in(&other.statement);
        self.conviction.merge_in(&other.conviction);
        self.supporting_replicas.merge_in(&other.supporting_replicas);
        self.evidence.merge_in(&other.evidence);
    }
}
