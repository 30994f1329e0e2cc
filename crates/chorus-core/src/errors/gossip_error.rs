/// Gossip dissemination errors. None of these are fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GossipError {
    #[error("peer {peer} unreachable: {reason}")]
    PeerUnreachable { peer: String, reason: String },

    #[error("unknown peer: {peer}")]
    UnknownPeer { peer: String },

    #[error("ack from {peer} timed out after {timeout_ms}ms")]
    AckTimeout { peer: String, timeout_ms: u64 },

    #[error("transport error: {reason}")]
    Transport { reason: String },
}
