use std::collections::BTreeMap;

use chorus_core::ReplicaId;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Reachability bookkeeping for one peer. Reported, never used to bias
/// selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub id: ReplicaId,
    pub last_seen: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub pushes: u64,
}

impl PeerInfo {
    pub fn new(id: ReplicaId) -> Self {
        Self {
            id,
            last_seen: None,
            consecutive_failures: 0,
            pushes: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PeerTable {
    peers: BTreeMap<ReplicaId, PeerInfo>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the peer was already known.
    pub fn insert(&mut self, id: ReplicaId) -> bool {
        if self.peers.contains_key(&id) {
            return false;
        }
        self.peers.insert(id.clone(), PeerInfo::new(id));
        true
    }

    pub fn remove(&mut self, id: &ReplicaId) -> Option<PeerInfo> {
        self.peers.remove(id)
    }

    pub fn contains(&self, id: &ReplicaId) -> bool {
        self.peers.contains_key(id)
    }

    pub fn get(&self, id: &ReplicaId) -> Option<&PeerInfo> {
        self.peers.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &ReplicaId> {
        self.peers.keys()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Uniformly random subset of `fanout` peers, without replacement.
    pub fn select<R: Rng + ?Sized>(&self, fanout: usize, rng: &mut R) -> Vec<ReplicaId> {
        let ids: Vec<&ReplicaId> = self.peers.keys().collect();
        ids.choose_multiple(rng, fanout)
            .map(|id| (*id).clone())
            .collect()
    }

    pub fn record_success(&mut self, id: &ReplicaId) {
        if let Some(peer) = self.peers.get_mut(id) {
            peer.last_seen = Some(Utc::now());
            peer.consecutive_failures = 0;
            peer.pushes += 1;
        }
    }

    pub fn record_failure(&mut self, id: &ReplicaId) {
        if let Some(peer) = self.peers.get_mut(id) {
            peer.consecutive_failures += 1;
        }
    }
}
