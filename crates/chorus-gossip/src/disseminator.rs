//! The gossip round driver.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use chorus_core::config::GossipConfig;
use chorus_core::errors::GossipError;
use chorus_core::traits::ITransport;
use chorus_core::{ExperienceEvent, ReplicaId};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::frame::{DeliveryDigest, GossipFrame, StateOffer};
use crate::outbox::Outbox;
use crate::peer::PeerTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GossipState {
    Idle,
    SelectingPeers,
    Pushing,
    AwaitingAck,
}

/// Outcome of one gossip round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundReport {
    pub round: u64,
    pub selected: Vec<ReplicaId>,
    pub delivered: Vec<ReplicaId>,
    pub unreachable: Vec<(ReplicaId, String)>,
    pub events_sent: usize,
    pub digests_sent: usize,
    pub offers_sent: usize,
}

/// What one push carried, for bookkeeping once it is acknowledged.
struct Push {
    ids: BTreeSet<Uuid>,
    count: usize,
    digest: bool,
    offer: Option<StateOffer>,
}

pub struct GossipDisseminator {
    replica: ReplicaId,
    config: GossipConfig,
    transport: Arc<dyn ITransport>,
    peers: PeerTable,
    outboxes: HashMap<ReplicaId, Outbox>,
    /// Recent events replayed to newly added peers.
    backlog: VecDeque<ExperienceEvent>,
    backlog_capacity: usize,
    /// Set once the backlog has dropped an event: replaying it alone no
    /// longer brings a new peer up to date.
    backlog_rolled_over: bool,
    digest: Option<DeliveryDigest>,
    digest_urgent: bool,
    /// Peers owed our digest regardless of selection.
    digest_requests: BTreeSet<ReplicaId>,
    /// State offers to send regardless of selection.
    offers: HashMap<ReplicaId, StateOffer>,
    /// Peers that need the full state; drained by the owner.
    state_requests: BTreeSet<ReplicaId>,
    rng: StdRng,
    state: GossipState,
    round: u64,
}

impl GossipDisseminator {
    pub fn new(
        replica: ReplicaId,
        config: GossipConfig,
        transport: Arc<dyn ITransport>,
        backlog_capacity: usize,
    ) -> Self {
        Self {
            replica,
            config,
            transport,
            peers: PeerTable::new(),
            outboxes: HashMap::new(),
            backlog: VecDeque::new(),
            backlog_capacity,
            backlog_rolled_over: false,
            digest: None,
            digest_urgent: false,
            digest_requests: BTreeSet::new(),
            offers: HashMap::new(),
            state_requests: BTreeSet::new(),
            rng: StdRng::from_entropy(),
            state: GossipState::Idle,
            round: 0,
        }
    }

    /// Deterministic peer selection.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.set_seed(seed);
        self
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn replica(&self) -> &ReplicaId {
        &self.replica
    }

    pub fn state(&self) -> GossipState {
        self.state
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    /// Events still unacknowledged by `peer`.
    pub fn pending_for(&self, peer: &ReplicaId) -> usize {
        self.outboxes.get(peer).map_or(0, Outbox::len)
    }

    /// Route inbound frames into `tx`. Frames are decoded by the consumer.
    pub fn install_receiver(&self, tx: mpsc::UnboundedSender<Vec<u8>>) {
        let replica = self.replica.clone();
        self.transport.install_receiver(Arc::new(move |bytes: Vec<u8>| {
            if tx.send(bytes).is_err() {
                warn!(replica = %replica, "inbound channel closed, frame dropped");
            }
        }));
    }

    /// Register `peer` and seed its outbox with the recent backlog. If the
    /// backlog no longer reaches back to the start, the peer is also queued
    /// for a state transfer.
    pub fn add_peer(&mut self, peer: ReplicaId) -> bool {
        if peer == self.replica || !self.peers.insert(peer.clone()) {
            return false;
        }
        let mut outbox = Outbox::new(
            self.config.outbox_coalesce_threshold,
            self.config.outbox_capacity,
        );
        for event in &self.backlog {
            if event.origin_replica != peer {
                outbox.push(event.clone());
            }
        }
        if self.backlog_rolled_over || outbox.take_overflow() {
            self.state_requests.insert(peer.clone());
        }
        info!(
            replica = %self.replica,
            peer = %peer,
            seeded = outbox.len(),
            needs_state = self.state_requests.contains(&peer),
            "peer added"
        );
        self.outboxes.insert(peer, outbox);
        true
    }

    pub fn remove_peer(&mut self, peer: &ReplicaId) -> bool {
        self.outboxes.remove(peer);
        self.offers.remove(peer);
        self.digest_requests.remove(peer);
        self.state_requests.remove(peer);
        self.peers.remove(peer).is_some()
    }

    /// Digest attached to pushes from now on. While `urgent` it goes out
    /// every round, otherwise every `anti_entropy_interval_rounds`.
    pub fn set_digest(&mut self, digest: DeliveryDigest, urgent: bool) {
        self.digest = Some(digest);
        self.digest_urgent = urgent;
    }

    /// Send our digest to `peer` next round even if it is not selected.
    pub fn request_digest(&mut self, peer: ReplicaId) {
        if peer != self.replica {
            self.digest_requests.insert(peer);
        }
    }

    /// Send `offer` to `peer` next round, replacing any older offer.
    pub fn queue_offer(&mut self, peer: ReplicaId, offer: StateOffer) {
        if peer != self.replica {
            self.offers.insert(peer, offer);
        }
    }

    /// Peers whose gap only a state transfer can close.
    pub fn take_state_requests(&mut self) -> Vec<ReplicaId> {
        std::mem::take(&mut self.state_requests).into_iter().collect()
    }

    pub fn pending_offers(&self) -> usize {
        self.offers.len()
    }

    /// Queue a locally originated event for every peer.
    pub fn enqueue_local(&mut self, event: ExperienceEvent) {
        self.enqueue_except(event, None);
    }

    /// Queue an event received from `from` for every peer other than the
    /// sender and the origin.
    pub fn enqueue_relay(&mut self, event: ExperienceEvent, from: &ReplicaId) {
        self.enqueue_except(event, Some(from));
    }

    fn enqueue_except(&mut self, event: ExperienceEvent, from: Option<&ReplicaId>) {
        for (peer, outbox) in self.outboxes.iter_mut() {
            if Some(peer) == from || *peer == event.origin_replica {
                continue;
            }
            outbox.push(event.clone());
            if outbox.take_overflow() {
                self.state_requests.insert(peer.clone());
            }
        }
        self.backlog.push_back(event);
        while self.backlog.len() > self.backlog_capacity {
            self.backlog.pop_front();
            self.backlog_rolled_over = true;
        }
    }

    /// Run one round: select peers, push each its pending events, and drop
    /// the events every peer acknowledged.
    ///
    /// Outboxes change only after acknowledgements are in, so a round that
    /// is dropped midway leaves every event queued for the next one.
    #[instrument(skip(self), fields(replica = %self.replica, round = self.round + 1))]
    pub async fn run_round(&mut self) -> RoundReport {
        self.round += 1;
        let mut report = RoundReport {
            round: self.round,
            ..RoundReport::default()
        };

        self.state = GossipState::SelectingPeers;
        report.selected = self.peers.select(self.config.fanout, &mut self.rng);

        self.state = GossipState::Pushing;
        let ack_timeout = self.config.ack_timeout();
        let every = self.config.anti_entropy_interval_rounds;
        let digest_due = self.digest_urgent || (every > 0 && self.round % every == 0);
        let mut targets: BTreeSet<ReplicaId> = report.selected.iter().cloned().collect();
        targets.extend(self.offers.keys().cloned());
        targets.extend(self.digest_requests.iter().cloned());

        let mut pushes = JoinSet::new();
        for peer in targets {
            let batch = self
                .outboxes
                .get(&peer)
                .map(Outbox::batch)
                .unwrap_or_default();
            let mut frame = GossipFrame::new(self.replica.clone(), self.round, batch);
            let requested = self.digest_requests.remove(&peer);
            let wants_digest = requested || (digest_due && report.selected.contains(&peer));
            if let Some(digest) = self.digest.clone().filter(|_| wants_digest) {
                frame = frame.with_digest(digest);
            }
            let offer = self.offers.remove(&peer);
            if let Some(offer) = offer.clone() {
                frame = frame.with_offer(offer);
            }
            if frame.is_empty() {
                continue;
            }
            let sent = Push {
                ids: frame.events.iter().map(|e| e.event_id).collect(),
                count: frame.events.len(),
                digest: frame.digest.is_some(),
                offer,
            };
            let bytes = match frame.encode() {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(peer = %peer, error = %e, "frame encoding failed");
                    report.unreachable.push((peer, e.to_string()));
                    continue;
                }
            };
            let transport = Arc::clone(&self.transport);
            pushes.spawn(async move {
                let result =
                    match tokio::time::timeout(ack_timeout, transport.send(&peer, bytes)).await {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(e)) => Err(e),
                        Err(_) => Err(GossipError::AckTimeout {
                            peer: peer.to_string(),
                            timeout_ms: ack_timeout.as_millis() as u64,
                        }),
                    };
                (peer, sent, result)
            });
        }

        self.state = GossipState::AwaitingAck;
        while let Some(joined) = pushes.join_next().await {
            let (peer, sent, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(error = %e, "push task failed");
                    continue;
                }
            };
            match result {
                Ok(()) => {
                    if let Some(outbox) = self.outboxes.get_mut(&peer) {
                        outbox.ack(&sent.ids);
                    }
                    self.peers.record_success(&peer);
                    report.events_sent += sent.count;
                    report.digests_sent += usize::from(sent.digest);
                    report.offers_sent += usize::from(sent.offer.is_some());
                    report.delivered.push(peer);
                }
                Err(e) => {
                    // Skipped for this round only; selection stays uniform.
                    debug!(peer = %peer, error = %e, "peer skipped this round");
                    if let Some(offer) = sent.offer {
                        self.offers.entry(peer.clone()).or_insert(offer);
                    }
                    self.peers.record_failure(&peer);
                    report.unreachable.push((peer, e.to_string()));
                }
            }
        }
        report.delivered.sort();
        report.unreachable.sort();

        self.state = GossipState::Idle;
        debug!(
            selected = report.selected.len(),
            delivered = report.delivered.len(),
            unreachable = report.unreachable.len(),
            events_sent = report.events_sent,
            offers_sent = report.offers_sent,
            "gossip round complete"
        );
        report
    }
}
