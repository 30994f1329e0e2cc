use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chorus_core::errors::GossipError;
use chorus_core::traits::{ITransport, ReceiveCallback};
use chorus_core::ReplicaId;
use dashmap::{DashMap, DashSet};

/// Shared in-process network. Every replica registers a receiver; sends are
/// delivered by calling it directly.
///
/// Partitions are simulated with [`InMemoryNetwork::set_unreachable`] and
/// slow links with [`InMemoryNetwork::set_latency`].
#[derive(Default)]
pub struct InMemoryNetwork {
    receivers: DashMap<ReplicaId, ReceiveCallback>,
    unreachable: DashSet<ReplicaId>,
    latency: DashMap<ReplicaId, Duration>,
}

impl InMemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A transport bound to `local` on this network.
    pub fn transport(self: &Arc<Self>, local: impl Into<ReplicaId>) -> Arc<InMemoryTransport> {
        Arc::new(InMemoryTransport {
            network: Arc::clone(self),
            local: local.into(),
        })
    }

    pub fn set_unreachable(&self, replica: &ReplicaId, unreachable: bool) {
        if unreachable {
            self.unreachable.insert(replica.clone());
        } else {
            self.unreachable.remove(replica);
        }
    }

    pub fn is_unreachable(&self, replica: &ReplicaId) -> bool {
        self.unreachable.contains(replica)
    }

    /// Delay every delivery to `replica` by `latency`.
    pub fn set_latency(&self, replica: &ReplicaId, latency: Option<Duration>) {
        match latency {
            Some(latency) => {
                self.latency.insert(replica.clone(), latency);
            }
            None => {
                self.latency.remove(replica);
            }
        }
    }

    pub fn registered(&self) -> usize {
        self.receivers.len()
    }

    async fn deliver(&self, peer: &ReplicaId, bytes: Vec<u8>) -> Result<(), GossipError> {
        if self.is_unreachable(peer) {
            return Err(GossipError::PeerUnreachable {
                peer: peer.to_string(),
                reason: "partitioned".to_string(),
            });
        }
        let latency = self.latency.get(peer).map(|l| *l);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        // Clone out of the map so the callback runs without holding a shard lock.
        let callback = self
            .receivers
            .get(peer)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| GossipError::PeerUnreachable {
                peer: peer.to_string(),
                reason: "no receiver registered".to_string(),
            })?;
        callback(bytes);
        Ok(())
    }
}

/// One replica's endpoint on an [`InMemoryNetwork`].
pub struct InMemoryTransport {
    network: Arc<InMemoryNetwork>,
    local: ReplicaId,
}

impl InMemoryTransport {
    pub fn local(&self) -> &ReplicaId {
        &self.local
    }
}

#[async_trait]
impl ITransport for InMemoryTransport {
    async fn send(&self, peer: &ReplicaId, bytes: Vec<u8>) -> Result<(), GossipError> {
        if self.network.is_unreachable(&self.local) {
            return Err(GossipError::PeerUnreachable {
                peer: peer.to_string(),
                reason: format!("sender {} partitioned", self.local),
            });
        }
        self.network.deliver(peer, bytes).await
    }

    fn install_receiver(&self, callback: ReceiveCallback) {
        self.network.receivers.insert(self.local.clone(), callback);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[tokio::test]
    async fn delivers_to_registered_receiver() {
        let network = InMemoryNetwork::new();
        let a = network.transport("a");
        let b = network.transport("b");
        let inbox = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&inbox);
        b.install_receiver(Arc::new(move |bytes| sink.lock().unwrap().push(bytes)));

        a.send(&ReplicaId::from("b"), vec![1, 2, 3]).await.unwrap();
        assert_eq!(inbox.lock().unwrap().as_slice(), &[vec![1, 2, 3]]);
    }

    #[tokio::test]
    async fn unregistered_and_partitioned_peers_are_unreachable() {
        let network = InMemoryNetwork::new();
        let a = network.transport("a");
        let b = network.transport("b");
        b.install_receiver(Arc::new(|_| {}));

        let err = a.send(&ReplicaId::from("c"), vec![]).await.unwrap_err();
        assert!(matches!(err, GossipError::PeerUnreachable { .. }));

        network.set_unreachable(&ReplicaId::from("b"), true);
        assert!(a.send(&ReplicaId::from("b"), vec![]).await.is_err());
        network.set_unreachable(&ReplicaId::from("b"), false);
        assert!(a.send(&ReplicaId::from("b"), vec![]).await.is_ok());
    }
}
