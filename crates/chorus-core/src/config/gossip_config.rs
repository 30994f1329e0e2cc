use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults;

/// Gossip disseminator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GossipConfig {
    /// Peers contacted per round.
    pub fanout: usize,
    /// Period of the gossip timer.
    pub interval_ms: u64,
    /// How long a push may wait for the transport to acknowledge it.
    pub ack_timeout_ms: u64,
    /// Per-peer queue length beyond which deltas touching the same record
    /// are coalesced before sending.
    pub outbox_coalesce_threshold: usize,
    /// Per-peer queue bound. A peer whose queue overflows is sent the full
    /// state instead.
    pub outbox_capacity: usize,
    /// Attach this replica's delivery digest to its pushes every this many
    /// rounds (0 = only while events wait on missing predecessors).
    pub anti_entropy_interval_rounds: u64,
}

impl GossipConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            fanout: defaults::DEFAULT_FANOUT,
            interval_ms: defaults::DEFAULT_GOSSIP_INTERVAL_MS,
            ack_timeout_ms: defaults::DEFAULT_ACK_TIMEOUT_MS,
            outbox_coalesce_threshold: defaults::DEFAULT_OUTBOX_COALESCE_THRESHOLD,
            outbox_capacity: defaults::DEFAULT_OUTBOX_CAPACITY,
            anti_entropy_interval_rounds: defaults::DEFAULT_ANTI_ENTROPY_INTERVAL_ROUNDS,
        }
    }
}
