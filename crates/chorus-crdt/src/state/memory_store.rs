use std::collections::BTreeMap;

use chorus_core::models::{ContentHash, MemoryAdd, MemoryRecord, UniqueTag};
use chorus_core::{LwwStamp, ReplicaId};
use serde::{Deserialize, Serialize};

use crate::primitives::{AddWinsSet, LWWRegister};

/// Memory records keyed by content hash.
///
/// Membership is an add-wins set so a re-observed fact survives a
/// concurrent retirement; each hash's body is a last-writer-wins register
/// so dedup merges on any replica overwrite it deterministically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStore {
    members: AddWinsSet<ContentHash>,
    records: BTreeMap<ContentHash, LWWRegister<MemoryRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a memory delta: add the hash under its tag, retire superseded
    /// hashes, and write the record body.
    pub fn apply_add(&mut self, add: &MemoryAdd, stamp: LwwStamp) {
        self.members.add(add.hash.clone(), add.tag.clone());
        for retired in &add.retired {
            self.members.remove_tags(&retired.tags);
        }
        match self.records.get_mut(&add.hash) {
            Some(register) => {
                register.set(add.record.clone(), stamp);
            }
            None => {
                self.records
                    .insert(add.hash.clone(), LWWRegister::new(add.record.clone(), stamp));
            }
        }
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.members.contains(hash)
    }

    /// The live record stored under `hash`.
    pub fn get(&self, hash: &ContentHash) -> Option<&MemoryRecord> {
        if !self.members.contains(hash) {
            return None;
        }
        self.records.get(hash).map(LWWRegister::get)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&MemoryRecord> {
        self.iter().map(|(_, r)| r).find(|r| r.id == id)
    }

    /// Live records in hash order.
    pub fn iter(&self) -> impl Iterator<Item = (&ContentHash, &MemoryRecord)> {
        self.members
            .iter()
            .filter_map(|hash| self.records.get(hash).map(|r| (hash, r.get())))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add tags of `hash` this replica has observed and not yet retired.
    pub fn live_tags(&self, hash: &ContentHash) -> Vec<UniqueTag> {
        self.members.live_tags(hash)
    }

    pub fn max_tag_seq(&self, replica: &ReplicaId) -> u64 {
        self.members.max_seq(replica)
    }

    pub fn members(&self) -> &AddWinsSet<ContentHash> {
        &self.members
    }

    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.merge_in(other);
        merged
    }

    pub fn merge_in(&mut self, other: &Self) {
        self.members.merge_in(&other.members);
        for (hash, theirs) in &other.records {
            match self.records.get_mut(hash) {
                Some(ours) => ours.merge_in(theirs),
                None => {
                    self.records.insert(hash.clone(), theirs.clone());
                }
            }
        }
    }
}
