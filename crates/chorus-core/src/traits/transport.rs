use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::GossipError;
use crate::models::ReplicaId;

/// Callback invoked with every inbound frame.
pub type ReceiveCallback = Arc<dyn Fn(Vec<u8>) + Send + Sync>;

/// Byte transport between replicas. In-process channels, TCP, HTTP or a
/// message queue are all valid bindings.
#[async_trait]
pub trait ITransport: Send + Sync {
    /// Deliver `bytes` to `peer`. `Ok` means the peer accepted the frame.
    async fn send(&self, peer: &ReplicaId, bytes: Vec<u8>) -> Result<(), GossipError>;

    /// Register the callback for inbound frames, replacing any earlier one.
    fn install_receiver(&self, callback: ReceiveCallback);
}
