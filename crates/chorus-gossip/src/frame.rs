use std::collections::BTreeMap;

use chorus_core::constants::PROTOCOL_VERSION;
use chorus_core::errors::GossipError;
use chorus_core::{ExperienceEvent, ReplicaId};
use serde::{Deserialize, Serialize};

/// Per-origin counter up to which a replica has delivered every event.
pub type DeliveryDigest = BTreeMap<ReplicaId, u64>;

/// A replica's full state, offered to a peer that is behind. The body is
/// opaque to gossip; the signature, when present, covers its bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateOffer {
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Vec<u8>>,
}

/// One push from `sender` to a peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GossipFrame {
    pub version: String,
    pub sender: ReplicaId,
    pub round: u64,
    #[serde(default)]
    pub events: Vec<ExperienceEvent>,
    /// The sender's delivery progress; the receiver answers with its state
    /// if it has delivered more.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<DeliveryDigest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer: Option<StateOffer>,
}

impl GossipFrame {
    pub fn new(sender: ReplicaId, round: u64, events: Vec<ExperienceEvent>) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            sender,
            round,
            events,
            digest: None,
            offer: None,
        }
    }

    pub fn with_digest(mut self, digest: DeliveryDigest) -> Self {
        self.digest = Some(digest);
        self
    }

    pub fn with_offer(mut self, offer: StateOffer) -> Self {
        self.offer = Some(offer);
        self
    }

    /// Whether the frame carries nothing worth sending.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.digest.is_none() && self.offer.is_none()
    }

    pub fn encode(&self) -> Result<Vec<u8>, GossipError> {
        serde_json::to_vec(self).map_err(|e| GossipError::Transport {
            reason: format!("failed to encode frame: {e}"),
        })
    }

    /// Decode a frame, rejecting other protocol versions.
    pub fn decode(bytes: &[u8]) -> Result<Self, GossipError> {
        let frame: GossipFrame =
            serde_json::from_slice(bytes).map_err(|e| GossipError::Transport {
                reason: format!("undecodable frame: {e}"),
            })?;
        if frame.version != PROTOCOL_VERSION {
            return Err(GossipError::Transport {
                reason: format!(
                    "unsupported protocol version {} (expected {PROTOCOL_VERSION})",
                    frame.version
                ),
            });
        }
        Ok(frame)
    }
}
