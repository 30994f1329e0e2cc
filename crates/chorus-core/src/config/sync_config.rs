use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::defaults;

/// Sync coordinator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Stable identifier of this replica.
    pub replica_id: String,
    /// Reject events that carry no valid signature.
    pub require_signatures: bool,
    /// Hex-encoded ed25519 secret key of this replica. Events it
    /// originates are signed when present.
    pub signing_key: Option<String>,
    /// Hex-encoded ed25519 public key trusted for each other replica.
    pub peer_keys: BTreeMap<String, String>,
    /// Out-of-order events held while waiting for causal predecessors.
    pub causal_buffer_capacity: usize,
    /// Recently applied events replayed to newly added peers.
    pub backlog_capacity: usize,
    /// Run the merge-law self-check every this many gossip rounds (0 = never).
    pub self_check_interval_rounds: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            replica_id: defaults::DEFAULT_REPLICA_ID.to_string(),
            require_signatures: false,
            signing_key: None,
            peer_keys: BTreeMap::new(),
            causal_buffer_capacity: defaults::DEFAULT_CAUSAL_BUFFER_CAPACITY,
            backlog_capacity: defaults::DEFAULT_BACKLOG_CAPACITY,
            self_check_interval_rounds: defaults::DEFAULT_SELF_CHECK_INTERVAL_ROUNDS,
        }
    }
}
