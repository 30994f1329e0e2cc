//! The sync coordinator: one replica's owner of the agent state.
//!
//! Local mutations go through the deduplicator, become signed events, are
//! applied to the local state and queued for gossip. Remote events are
//! validated, delivered in causal order per origin, applied, relayed, and
//! their attestations counted by the Byzantine aggregator. Accepted claims
//! land in the confirmed tier.
//!
//! Gossip frames also carry delivery digests. A replica that finds a peer
//! behind it offers its whole state, which closes gaps the peer's outbox no
//! longer covers, such as a peer that joined after the backlog rolled over.
//!
//! All state is owned by one `SyncCoordinator` value and mutated through
//! `&mut self`, so local ingest and remote application never interleave.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chorus_byzantine::ByzantineAggregator;
use chorus_core::errors::{ChorusError, ChorusResult, QuorumError};
use chorus_core::models::{
    Attestation, BeliefUpdate, ClaimDecision, ClaimState, ClaimValue, DropReason, EventPayload,
    ContentHash, KnowledgeUpdate, MemoryAdd, MemoryRecordId, RetiredKey, SyncRecord,
    TaggedEvidence, UniqueTag,
};
use chorus_core::traits::{IEventSink, ISimilarityProvider, ITransport};
use chorus_core::{
    ChorusConfig, ExperienceEvent, KnowledgeItem, LogicalClock, MemoryRecord, ReplicaId,
    SyncError, VoteRecord,
};
use chorus_crdt::AgentStateCRDT;
use chorus_dedup::{DedupOutcome, Deduplicator, SimilarityEngine};
use chorus_gossip::{DeliveryDigest, GossipDisseminator, GossipFrame, RoundReport, StateOffer};
use chorus_observability::tracing_setup::events;
use chorus_observability::{apply_span, gossip_round_span, ingest_span, vote_span};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn, Instrument};
use uuid::Uuid;

use crate::confirmed::{ConfirmedClaim, ConfirmedTier};
use crate::delivery::{Admission, DeliveryTracker, Released};
use crate::self_check::SelfCheck;
use crate::signing::{EventSigner, Keyring};
use crate::store::{Checkpoint, IDurableStore};

/// Caller-supplied attributes of a locally ingested memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetadata {
    pub importance: f64,
    pub confidence: f64,
    pub tags: BTreeSet<String>,
    pub embedding: Option<Vec<f32>>,
    /// Defaults to the time of ingest.
    pub created_at: Option<DateTime<Utc>>,
}

impl Default for MemoryMetadata {
    fn default() -> Self {
        Self {
            importance: 0.5,
            confidence: 0.5,
            tags: BTreeSet::new(),
            embedding: None,
            created_at: None,
        }
    }
}

impl MemoryMetadata {
    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }
}

/// What happened to an incoming event that was not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    Applied,
    /// Already delivered or already waiting; nothing changed.
    Duplicate,
    /// Held until earlier events of its origin arrive.
    Buffered,
}

/// Body of a state offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateTransfer {
    /// Contiguous delivery mark per origin; `state` holds everything below.
    marks: DeliveryDigest,
    state: AgentStateCRDT,
    /// Attestations of claims still being counted, as originally signed.
    #[serde(default)]
    attestations: Vec<ExperienceEvent>,
}

/// Whether `merged` holds nothing `record` lacks.
fn same_memory(merged: &MemoryRecord, record: &MemoryRecord) -> bool {
    merged.observations() == record.observations() && merged.tags == record.tags
}

/// Whether `a` has delivered more than `b` from any origin but `skip`.
fn ahead_of(a: &DeliveryDigest, b: &DeliveryDigest, skip: &ReplicaId) -> bool {
    a.iter()
        .any(|(origin, mark)| origin != skip && *mark > b.get(origin).copied().unwrap_or(0))
}

pub struct SyncCoordinator {
    replica: ReplicaId,
    config: ChorusConfig,
    state: AgentStateCRDT,
    clock: LogicalClock,
    tag_seq: u64,
    dedup: Deduplicator,
    gossip: GossipDisseminator,
    inbound: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
    aggregator: ByzantineAggregator,
    delivery: DeliveryTracker,
    confirmed: ConfirmedTier,
    /// Record key of the event that raised each open claim.
    claim_subjects: HashMap<Uuid, String>,
    /// Attestation events of claims still pending, for state offers.
    open_attestations: HashMap<Uuid, Vec<ExperienceEvent>>,
    signer: Option<EventSigner>,
    keyring: Keyring,
    store: Option<Arc<dyn IDurableStore>>,
    sink: Arc<dyn IEventSink>,
    self_check: SelfCheck,
    rounds: u64,
    halted: bool,
}

impl SyncCoordinator {
    /// Build a coordinator from validated config. Without a similarity
    /// provider the deduplicator compares content lexically.
    pub fn new(
        config: ChorusConfig,
        transport: Arc<dyn ITransport>,
        similarity: Option<Arc<dyn ISimilarityProvider>>,
        sink: Arc<dyn IEventSink>,
    ) -> ChorusResult<Self> {
        config.validate()?;
        let replica = ReplicaId::new(config.sync.replica_id.clone());
        let signer = config
            .sync
            .signing_key
            .as_deref()
            .map(EventSigner::from_hex)
            .transpose()?;
        let mut keyring = Keyring::from_hex_map(&config.sync.peer_keys)?;
        if let Some(signer) = &signer {
            keyring.trust(replica.clone(), signer.verifying_key());
        }

        let engine = match similarity {
            Some(provider) => SimilarityEngine::new(provider, Arc::clone(&sink)),
            None => SimilarityEngine::lexical().with_sink(Arc::clone(&sink)),
        }
        .with_cache_capacity(config.dedup.embedding_cache_capacity);
        let gossip = GossipDisseminator::new(
            replica.clone(),
            config.gossip.clone(),
            transport,
            config.sync.backlog_capacity,
        );
        let (tx, rx) = mpsc::unbounded_channel();
        gossip.install_receiver(tx);

        info!(
            replica = %replica,
            signed = signer.is_some(),
            trusted_keys = keyring.len(),
            "sync coordinator started"
        );
        Ok(Self {
            clock: LogicalClock::new(replica.clone()),
            dedup: Deduplicator::new(config.dedup.clone(), engine),
            aggregator: ByzantineAggregator::new(config.byzantine.clone(), 1, Arc::clone(&sink)),
            delivery: DeliveryTracker::new(config.sync.causal_buffer_capacity),
            state: AgentStateCRDT::new(),
            tag_seq: 0,
            gossip,
            inbound: Some(rx),
            confirmed: ConfirmedTier::new(),
            claim_subjects: HashMap::new(),
            open_attestations: HashMap::new(),
            signer,
            keyring,
            store: None,
            sink,
            self_check: SelfCheck::new(),
            rounds: 0,
            halted: false,
            replica,
            config,
        })
    }

    pub fn with_store(mut self, store: Arc<dyn IDurableStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Deterministic peer selection.
    pub fn with_gossip_seed(mut self, seed: u64) -> Self {
        self.gossip.set_seed(seed);
        self
    }

    pub fn replica(&self) -> &ReplicaId {
        &self.replica
    }

    pub fn config(&self) -> &ChorusConfig {
        &self.config
    }

    pub fn clock(&self) -> &LogicalClock {
        &self.clock
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn gossip(&self) -> &GossipDisseminator {
        &self.gossip
    }

    pub fn deduplicator(&self) -> &Deduplicator {
        &self.dedup
    }

    pub fn delivery(&self) -> &DeliveryTracker {
        &self.delivery
    }

    pub fn aggregator(&self) -> &ByzantineAggregator {
        &self.aggregator
    }

    /// This replica's public key as hex, when it signs its events.
    pub fn public_key_hex(&self) -> Option<String> {
        self.signer.as_ref().map(EventSigner::public_key_hex)
    }

    /// Trust `key`, a hex ed25519 public key, for events originated by
    /// `peer`. Replaces any key trusted for it before.
    pub fn trust_peer(&mut self, peer: impl Into<ReplicaId>, key: &str) -> ChorusResult<()> {
        self.keyring.trust_hex(peer.into(), key)
    }

    /// Read-only copy of the current state.
    pub fn snapshot(&self) -> AgentStateCRDT {
        self.state.clone()
    }

    /// Hand the inbound frame channel to a driver task. Afterwards
    /// [`SyncCoordinator::process_inbound`] finds nothing to do.
    pub fn take_inbound(&mut self) -> Option<mpsc::UnboundedReceiver<Vec<u8>>> {
        self.inbound.take()
    }

    /// Post ids of claims whose vote window elapses to `tx`.
    pub fn set_expiry_notifier(&mut self, tx: mpsc::UnboundedSender<Uuid>) {
        self.aggregator.set_expiry_notifier(tx);
    }

    // ── Peers ──────────────────────────────────────────────────────────────

    pub fn add_peer(&mut self, peer: impl Into<ReplicaId>) -> bool {
        let added = self.gossip.add_peer(peer.into());
        if added {
            self.aggregator
                .set_active_replicas(self.gossip.peers().len() + 1);
        }
        added
    }

    pub fn remove_peer(&mut self, peer: &ReplicaId) -> bool {
        let removed = self.gossip.remove_peer(peer);
        if removed {
            self.aggregator
                .set_active_replicas(self.gossip.peers().len() + 1);
        }
        removed
    }

    // ── Local mutations ────────────────────────────────────────────────────

    /// Deduplicate a new memory, apply it and queue it for gossip. Returns
    /// the id of the record that now holds it.
    pub fn ingest_local(
        &mut self,
        content: impl Into<String>,
        metadata: MemoryMetadata,
    ) -> Result<MemoryRecordId, SyncError> {
        self.ensure_running()?;
        let span = ingest_span!(self.replica);
        let _guard = span.enter();

        let created_at = metadata.created_at.unwrap_or_else(Utc::now);
        let mut record = MemoryRecord::new(
            Uuid::new_v4().to_string(),
            content,
            self.replica.clone(),
            created_at,
        )
        .with_importance(metadata.importance)
        .with_confidence(metadata.confidence)
        .with_tags(metadata.tags);
        if let Some(embedding) = metadata.embedding {
            record = record.with_embedding(embedding);
        }
        record.validate().map_err(|reason| SyncError::MalformedEvent {
            event_id: Uuid::nil(),
            reason,
        })?;

        let (outcome, undo) = self.dedup.ingest_tracked(record);
        let hash = outcome.hash().clone();
        let retired = match &outcome {
            DedupOutcome::Merged { retired, .. } => retired.clone(),
            DedupOutcome::Inserted { .. } => Vec::new(),
        };
        let published = self
            .memory_add_event(&hash, &retired)
            .and_then(|event| self.originate(event));
        if let Err(e) = published {
            // Nothing was applied, so the index must not keep the merge.
            self.dedup.revert(undo);
            return Err(e);
        }

        let record = match outcome {
            DedupOutcome::Inserted { id, .. } => {
                debug!(id = %id, "memory ingested");
                self.sink.publish(SyncRecord::MemoryIngested {
                    replica: self.replica.clone(),
                    id: id.clone(),
                });
                id
            }
            DedupOutcome::Merged {
                id,
                into,
                score,
                survivor,
                merge_count,
                ..
            } => {
                debug!(id = %id, into = %into, score, merge_count, "memory merged");
                self.sink.publish(SyncRecord::DedupMerged {
                    replica: self.replica.clone(),
                    id,
                    into,
                    score,
                    merge_count,
                });
                survivor
            }
        };
        Ok(record)
    }

    /// Write a knowledge item. Returns the id of the carrying event.
    pub fn record_knowledge(&mut self, item: KnowledgeItem) -> Result<Uuid, SyncError> {
        self.ensure_running()?;
        let event = self.next_event(EventPayload::KnowledgeUpdate(KnowledgeUpdate {
            item,
            present: true,
        }));
        Ok(self.originate(event)?.event_id)
    }

    pub fn retract_knowledge(&mut self, id: &str) -> Result<Uuid, SyncError> {
        self.ensure_running()?;
        let item = self
            .state
            .knowledge
            .get(&id.to_string())
            .cloned()
            .unwrap_or_else(|| KnowledgeItem::new(id, String::new(), 0.0));
        let event = self.next_event(EventPayload::KnowledgeUpdate(KnowledgeUpdate {
            item,
            present: false,
        }));
        Ok(self.originate(event)?.event_id)
    }

    /// Raise this replica's conviction in a belief by one and attach
    /// evidence. Returns the belief's total conviction.
    ///
    /// The event carries every evidence reference this replica holds live
    /// for the belief, so it stands on its own if older updates are
    /// coalesced away in transit.
    pub fn reinforce_belief<I, S>(
        &mut self,
        belief_id: &str,
        statement: impl Into<String>,
        evidence: I,
    ) -> Result<u64, SyncError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_running()?;
        let (own_conviction, mut tagged) = match self.state.belief(belief_id) {
            Some(belief) => {
                let held: Vec<TaggedEvidence> = belief
                    .evidence()
                    .flat_map(|reference| {
                        belief
                            .evidence_tags(reference)
                            .into_iter()
                            .filter(|t| t.replica == self.replica)
                            .map(|tag| TaggedEvidence {
                                reference: reference.clone(),
                                tag,
                            })
                            .collect::<Vec<_>>()
                    })
                    .collect();
                (belief.conviction.replica_value(&self.replica), held)
            }
            None => (0, Vec::new()),
        };
        for reference in evidence.into_iter().map(Into::into) {
            if !tagged.iter().any(|e| e.reference == reference) {
                let tag = self.next_tag();
                tagged.push(TaggedEvidence { reference, tag });
            }
        }
        tagged.sort();

        let event = self.next_event(EventPayload::BeliefUpdate(BeliefUpdate {
            belief_id: belief_id.to_string(),
            statement: statement.into(),
            conviction: own_conviction + 1,
            evidence: tagged,
        }));
        self.originate(event)?;
        Ok(self.state.belief(belief_id).map_or(0, |b| b.conviction()))
    }

    /// Report `value` for a claim about `item`. With no `claim_id` a new
    /// claim is raised whose id is the carrying event's id; otherwise this
    /// corroborates an existing claim. Returns the claim id.
    pub fn attest(
        &mut self,
        claim_id: Option<Uuid>,
        item: KnowledgeItem,
        value: ClaimValue,
    ) -> Result<Uuid, SyncError> {
        self.ensure_running()?;
        let mut event = self.next_event(EventPayload::KnowledgeUpdate(KnowledgeUpdate {
            item,
            present: true,
        }));
        let claim_id = claim_id.unwrap_or(event.event_id);
        event.attestation = Some(Attestation { claim_id, value });
        self.originate(event)?;
        Ok(claim_id)
    }

    /// A memory event publishing the indexed record at `hash` and retiring
    /// every live tag of `retired`.
    fn memory_add_event(
        &mut self,
        hash: &ContentHash,
        retired: &[ContentHash],
    ) -> Result<ExperienceEvent, SyncError> {
        let Some(survivor) = self.dedup.get(hash).cloned() else {
            return Err(SyncError::StateInvariantViolation {
                details: format!("deduplicator lost record {hash}"),
            });
        };
        let retired = retired
            .iter()
            .map(|h| RetiredKey {
                hash: h.clone(),
                tags: self.state.memories.live_tags(h),
            })
            .collect();
        let tag = match self
            .state
            .memories
            .live_tags(hash)
            .into_iter()
            .find(|t| t.replica == self.replica)
        {
            Some(own) => own,
            None => self.next_tag(),
        };
        Ok(self.next_event(EventPayload::MemoryAdd(MemoryAdd {
            record: survivor,
            hash: hash.clone(),
            tag,
            retired,
        })))
    }

    fn next_tag(&mut self) -> UniqueTag {
        self.tag_seq += 1;
        UniqueTag::new(self.replica.clone(), self.tag_seq)
    }

    /// An event at the next counter. The clock only moves once the event
    /// has been applied, so a rejected event leaves no gap.
    fn next_event(&self, payload: EventPayload) -> ExperienceEvent {
        ExperienceEvent::new(
            LogicalClock::at(self.replica.clone(), self.clock.counter + 1),
            payload,
        )
    }

    fn originate(&mut self, mut event: ExperienceEvent) -> Result<ExperienceEvent, SyncError> {
        event.validate_structure()?;
        if let Some(signer) = &self.signer {
            signer.sign(&mut event)?;
        }
        self.state.apply_delta(&event)?;
        self.clock.tick();
        self.delivery.mark_delivered(&event);
        trace!(event_id = %event.event_id, counter = event.logical_time.counter, "local event");
        self.register_attestation(&event);
        self.gossip.enqueue_local(event.clone());
        Ok(event)
    }

    // ── Remote events ──────────────────────────────────────────────────────

    /// Validate and apply an event from another replica.
    pub fn on_incoming_event(&mut self, event: ExperienceEvent) -> Result<ApplyOutcome, SyncError> {
        self.receive(event, None)
    }

    /// Decode a gossip frame: merge its state offer, apply its events, then
    /// answer its digest. Rejected events are reported to the sink and
    /// skipped; only a halt is returned as an error.
    pub fn handle_frame(&mut self, bytes: &[u8]) -> Result<Vec<ApplyOutcome>, SyncError> {
        self.ensure_running()?;
        let frame = match GossipFrame::decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                self.report_frame_drop(DropReason::UndecodableFrame(e.to_string()));
                return Ok(Vec::new());
            }
        };

        if let Some(offer) = &frame.offer {
            if let Err(reason) = self.accept_offer(&frame.sender, offer) {
                self.report_frame_drop(reason);
            }
        }

        let mut outcomes = Vec::with_capacity(frame.events.len());
        for event in frame.events {
            match self.receive(event, Some(&frame.sender)) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => debug!(sender = %frame.sender, error = %e, "event rejected"),
            }
        }

        if let Some(digest) = &frame.digest {
            self.answer_digest(&frame.sender, digest);
        }
        Ok(outcomes)
    }

    /// Apply every frame waiting on the inbound channel. Returns the number
    /// of events applied.
    pub fn process_inbound(&mut self) -> Result<usize, SyncError> {
        self.ensure_running()?;
        let mut frames = Vec::new();
        if let Some(rx) = self.inbound.as_mut() {
            while let Ok(bytes) = rx.try_recv() {
                frames.push(bytes);
            }
        }
        let mut applied = 0;
        for bytes in frames {
            applied += self
                .handle_frame(&bytes)?
                .iter()
                .filter(|o| **o == ApplyOutcome::Applied)
                .count();
        }
        Ok(applied)
    }

    fn receive(
        &mut self,
        event: ExperienceEvent,
        from: Option<&ReplicaId>,
    ) -> Result<ApplyOutcome, SyncError> {
        self.ensure_running()?;
        let span = apply_span!(self.replica, event.event_id, event.origin_replica);
        let _guard = span.enter();

        if let Err(e) = self.check_event(&event) {
            self.report_drop(&e);
            return Err(e);
        }

        match self.delivery.admit(&event) {
            Admission::Duplicate => {
                debug!("duplicate event");
                self.sink.publish(SyncRecord::DuplicateObserved {
                    replica: self.replica.clone(),
                    event_id: event.event_id,
                    origin: event.origin_replica,
                });
                Ok(ApplyOutcome::Duplicate)
            }
            Admission::Waiting(missing) => {
                let event_id = event.event_id;
                if let Err(e) = self.delivery.buffer(event) {
                    self.report_drop(&e);
                    return Err(e);
                }
                debug!(waiting_for = %missing, "event buffered");
                self.sink.publish(SyncRecord::EventBuffered {
                    replica: self.replica.clone(),
                    event_id,
                    waiting_for: missing,
                });
                Ok(ApplyOutcome::Buffered)
            }
            Admission::Ready => {
                self.apply(event, from)?;
                self.drain();
                Ok(ApplyOutcome::Applied)
            }
        }
    }

    /// Structure, then signature: always when signatures are required,
    /// otherwise whenever the event is signed by an origin we hold a key for.
    fn check_event(&self, event: &ExperienceEvent) -> Result<(), SyncError> {
        event.validate_structure()?;
        let checkable = event.signature.is_some() && self.keyring.knows(&event.origin_replica);
        if self.config.sync.require_signatures || checkable {
            self.keyring.verify(event)?;
        }
        Ok(())
    }

    fn apply(&mut self, event: ExperienceEvent, from: Option<&ReplicaId>) -> Result<(), SyncError> {
        let field = match self.state.apply_delta(&event) {
            Ok(field) => field,
            Err(e) => {
                self.report_drop(&e);
                return Err(e);
            }
        };
        self.delivery.mark_delivered(&event);
        self.index_memory(&event);
        self.register_attestation(&event);

        trace!(field = field.as_str(), "remote delta applied");
        self.sink.publish(SyncRecord::DeltaApplied {
            replica: self.replica.clone(),
            event_id: event.event_id,
            origin: event.origin_replica.clone(),
            kind: event.kind(),
        });
        let sender = from
            .cloned()
            .unwrap_or_else(|| event.origin_replica.clone());
        self.gossip.enqueue_relay(event, &sender);
        Ok(())
    }

    /// Release buffered events whose predecessors have now arrived.
    fn drain(&mut self) {
        while let Some(released) = self.delivery.next_release() {
            match released {
                Released::Ready(event) => {
                    let event_id = event.event_id;
                    if let Err(e) = self.apply(event, None) {
                        warn!(event_id = %event_id, error = %e, "buffered event rejected");
                    }
                }
                Released::Stale(event) => {
                    self.sink.publish(SyncRecord::DuplicateObserved {
                        replica: self.replica.clone(),
                        event_id: event.event_id,
                        origin: event.origin_replica,
                    });
                }
            }
        }
    }

    /// Keep the dedup index in line with the memories a remote event touched.
    ///
    /// The remote record is deduplicated against the local index. When that
    /// merges it with local near-duplicates, or the index held observations
    /// the record lacks, the merged record is published as a new memory
    /// event retiring what it absorbed. Folding is deterministic, so the
    /// peers' answers to that event add nothing and the exchange stops.
    fn index_memory(&mut self, event: &ExperienceEvent) {
        let EventPayload::MemoryAdd(add) = &event.payload else {
            return;
        };
        for retired in &add.retired {
            if !self.state.memories.contains(&retired.hash) {
                self.dedup.forget(&retired.hash);
            }
        }
        let Some(record) = self.state.memories.get(&add.hash).cloned() else {
            self.dedup.forget(&add.hash);
            return;
        };

        let (outcome, undo) = self.dedup.ingest_tracked(record.clone());
        let hash = outcome.hash().clone();
        let retired = match &outcome {
            DedupOutcome::Merged { retired, .. } => retired.clone(),
            DedupOutcome::Inserted { .. } => Vec::new(),
        };
        let unchanged = hash == add.hash
            && retired.is_empty()
            && self.dedup.get(&hash).is_some_and(|m| same_memory(m, &record));
        if unchanged {
            return;
        }

        let published = self
            .memory_add_event(&hash, &retired)
            .and_then(|merge| self.originate(merge));
        match (published, outcome) {
            (Err(e), _) => {
                warn!(hash = %add.hash, error = %e, "remote memory merge not published");
                self.dedup.revert(undo);
                self.dedup.observe(record);
            }
            (
                Ok(_),
                DedupOutcome::Merged {
                    id,
                    into,
                    score,
                    merge_count,
                    ..
                },
            ) => {
                debug!(id = %id, into = %into, score, merge_count, "remote memory merged");
                self.sink.publish(SyncRecord::DedupMerged {
                    replica: self.replica.clone(),
                    id,
                    into,
                    score,
                    merge_count,
                });
            }
            (Ok(_), DedupOutcome::Inserted { id, .. }) => {
                debug!(id = %id, "remote memory refolded");
            }
        }
    }

    /// Rebuild the dedup index from the live memories.
    fn reindex(&mut self) {
        let stale: Vec<_> = self.dedup.records().map(|r| r.content_hash()).collect();
        for hash in &stale {
            self.dedup.forget(hash);
        }
        for (_, record) in self.state.memories.iter() {
            self.dedup.observe(record.clone());
        }
    }

    fn report_frame_drop(&self, reason: DropReason) {
        events::event_dropped(&self.replica, None, &reason);
        self.sink.publish(SyncRecord::EventDropped {
            replica: self.replica.clone(),
            event_id: None,
            reason,
        });
    }

    fn report_drop(&self, error: &SyncError) {
        let reason = match error {
            SyncError::MalformedEvent { reason, .. } => DropReason::Malformed(reason.clone()),
            SyncError::InvalidSignature { .. } => DropReason::InvalidSignature,
            SyncError::PayloadMismatch {
                expected, found, ..
            } => DropReason::PayloadMismatch(format!("expected {expected}, found {found}")),
            SyncError::CausalBufferFull { .. } => DropReason::CausalBufferFull,
            SyncError::StateInvariantViolation { .. } | SyncError::Halted => return,
        };
        let event_id = error.event_id();
        events::event_dropped(&self.replica, event_id.map(|id| id.to_string()), &reason);
        self.sink.publish(SyncRecord::EventDropped {
            replica: self.replica.clone(),
            event_id,
            reason,
        });
    }

    // ── Claims ─────────────────────────────────────────────────────────────

    fn register_attestation(&mut self, event: &ExperienceEvent) {
        let Some(attestation) = &event.attestation else {
            return;
        };
        let claim_id = attestation.claim_id;
        let span = vote_span!(claim_id, event.origin_replica);
        let _guard = span.enter();

        if self.aggregator.claim_state(&claim_id).is_none() {
            self.claim_subjects
                .entry(claim_id)
                .or_insert_with(|| event.record_key());
        }
        let vote = VoteRecord::new(claim_id, event.origin_replica.clone(), attestation.value);
        match self.aggregator.register_vote(vote) {
            Ok(state) => {
                trace!(state = %state, "vote counted");
                if state == ClaimState::Pending {
                    self.open_attestations
                        .entry(claim_id)
                        .or_default()
                        .push(event.clone());
                }
            }
            Err(QuorumError::AlreadyDecided { state, .. }) => {
                debug!(state = %state, "vote for decided claim ignored");
            }
            Err(e) => warn!(error = %e, "vote not counted"),
        }
        self.settle(claim_id);
    }

    /// Promote a claim that just got decided.
    fn settle(&mut self, claim_id: Uuid) {
        let Some(decision) = self.aggregator.decision(&claim_id) else {
            return;
        };
        self.open_attestations.remove(&claim_id);
        let Some(subject) = self.claim_subjects.remove(&claim_id) else {
            return;
        };
        events::claim_decided(decision);
        if self.confirmed.promote(decision, Some(subject)) {
            info!(claim_id = %claim_id, value = ?decision.value, "claim confirmed");
        }
    }

    /// Expire claims whose vote window has elapsed.
    pub fn process_expirations(&mut self) -> Result<Vec<ClaimDecision>, SyncError> {
        self.ensure_running()?;
        let expired = self.aggregator.process_expirations();
        for decision in &expired {
            events::claim_decided(decision);
        }
        let aggregator = &self.aggregator;
        self.claim_subjects
            .retain(|id, _| aggregator.claim_state(id) == Some(ClaimState::Pending));
        self.open_attestations
            .retain(|id, _| aggregator.claim_state(id) == Some(ClaimState::Pending));
        Ok(expired)
    }

    pub fn claim_state(&self, claim_id: &Uuid) -> Option<ClaimState> {
        self.aggregator.claim_state(claim_id)
    }

    pub fn confirmed(&self) -> &ConfirmedTier {
        &self.confirmed
    }

    pub fn confirmed_claims(&self) -> Vec<ConfirmedClaim> {
        self.confirmed.iter().cloned().collect()
    }

    // ── Anti-entropy ───────────────────────────────────────────────────────

    /// Everything a lagging peer needs to catch up, signed when this
    /// replica signs its events.
    fn state_offer(&self) -> Option<StateOffer> {
        let marks = self.delivery.digest();
        let attestations = self
            .open_attestations
            .values()
            .flatten()
            .filter(|e| {
                e.logical_time.counter <= marks.get(&e.origin_replica).copied().unwrap_or(0)
            })
            .cloned()
            .collect();
        let transfer = StateTransfer {
            marks,
            state: self.state.clone(),
            attestations,
        };
        let body = match serde_json::to_string(&transfer) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "state offer encoding failed");
                return None;
            }
        };
        let signature = self
            .signer
            .as_ref()
            .map(|signer| signer.sign_bytes(body.as_bytes()));
        Some(StateOffer { body, signature })
    }

    fn queue_state_offer(&mut self, peer: ReplicaId) {
        if let Some(offer) = self.state_offer() {
            debug!(peer = %peer, "state offer queued");
            self.gossip.queue_offer(peer, offer);
        }
    }

    /// Offer our state to a peer whose digest shows it behind us, and ask
    /// for the peer's state when we are behind it.
    fn answer_digest(&mut self, from: &ReplicaId, theirs: &DeliveryDigest) {
        let ours = self.delivery.digest();
        if ahead_of(&ours, theirs, from) {
            self.queue_state_offer(from.clone());
        }
        if ahead_of(theirs, &ours, &self.replica) {
            trace!(peer = %from, "peer is ahead, sending our digest");
            self.gossip.request_digest(from.clone());
        }
    }

    /// Merge a peer's whole state and treat everything below its marks as
    /// delivered.
    fn accept_offer(&mut self, from: &ReplicaId, offer: &StateOffer) -> Result<(), DropReason> {
        let trusted = match &offer.signature {
            Some(signature) if self.keyring.knows(from) => {
                self.keyring
                    .verify_bytes(from, offer.body.as_bytes(), signature)
            }
            _ => !self.config.sync.require_signatures,
        };
        if !trusted {
            return Err(DropReason::InvalidSignature);
        }
        let transfer: StateTransfer = serde_json::from_str(&offer.body)
            .map_err(|e| DropReason::UndecodableFrame(format!("state offer: {e}")))?;

        self.state.merge_in(&transfer.state);
        for (origin, mark) in &transfer.marks {
            if *origin != self.replica {
                self.delivery.advance_to(origin, *mark);
            }
        }
        self.tag_seq = self.tag_seq.max(self.state.max_tag_seq(&self.replica));
        self.reindex();
        for event in &transfer.attestations {
            let counted = event.attestation.as_ref().is_some_and(|a| {
                self.open_attestations
                    .get(&a.claim_id)
                    .is_some_and(|seen| seen.iter().any(|e| e.event_id == event.event_id))
            });
            if counted {
                continue;
            }
            match self.check_event(event) {
                Ok(()) => self.register_attestation(event),
                Err(e) => {
                    debug!(event_id = %event.event_id, error = %e, "transferred vote skipped");
                }
            }
        }
        self.drain();

        let memories = self.state.memories.len();
        info!(from = %from, memories, "state transfer merged");
        self.sink.publish(SyncRecord::StateTransferred {
            replica: self.replica.clone(),
            from: from.clone(),
            memories,
        });
        Ok(())
    }

    // ── Gossip ─────────────────────────────────────────────────────────────

    /// Run one gossip round now, then the self-check when it is due.
    ///
    /// Peers the gossip layer can no longer serve from their outbox get a
    /// state offer first, and every push may carry our delivery digest.
    pub async fn run_sync_round(&mut self) -> Result<RoundReport, SyncError> {
        self.ensure_running()?;
        for peer in self.gossip.take_state_requests() {
            self.queue_state_offer(peer);
        }
        let urgent = self.delivery.buffered() > 0;
        self.gossip.set_digest(self.delivery.digest(), urgent);
        let span = gossip_round_span!(self.replica, self.gossip.round() + 1);
        let report = self.gossip.run_round().instrument(span).await;

        for (peer, reason) in &report.unreachable {
            self.sink.publish(SyncRecord::PeerSkipped {
                replica: self.replica.clone(),
                peer: peer.clone(),
                round: report.round,
                reason: reason.clone(),
            });
        }
        self.sink.publish(SyncRecord::GossipRoundCompleted {
            replica: self.replica.clone(),
            round: report.round,
            selected: report.selected.len(),
            delivered: report.delivered.len(),
            unreachable: report.unreachable.len(),
            events_sent: report.events_sent,
        });

        self.rounds += 1;
        let every = self.config.sync.self_check_interval_rounds;
        if every > 0 && self.rounds % every == 0 {
            self.run_self_check()?;
        }
        Ok(report)
    }

    // ── Integrity ──────────────────────────────────────────────────────────

    /// Check the merge laws on the live state. A failure halts the
    /// coordinator for good.
    pub fn run_self_check(&mut self) -> Result<(), SyncError> {
        self.ensure_running()?;
        if let Err(e) = self.self_check.check(&self.state, &self.clock) {
            self.halt(&e);
            return Err(e);
        }
        Ok(())
    }

    fn halt(&mut self, error: &SyncError) {
        self.halted = true;
        let details = error.to_string();
        events::invariant_violated(&self.replica, &details);
        self.sink.publish(SyncRecord::InvariantViolation {
            replica: self.replica.clone(),
            details,
        });
    }

    fn ensure_running(&self) -> Result<(), SyncError> {
        if self.halted {
            Err(SyncError::Halted)
        } else {
            Ok(())
        }
    }

    // ── Checkpoints ────────────────────────────────────────────────────────

    /// Capture the state, clock and delivery progress, saving it to the
    /// store when one is configured.
    pub fn checkpoint(&self) -> ChorusResult<Checkpoint> {
        self.ensure_running()?;
        let checkpoint = Checkpoint::new(
            self.clock.clone(),
            self.state.clone(),
            self.delivery.clone(),
            self.confirmed.clone(),
        );
        if let Some(store) = &self.store {
            store.save(&checkpoint)?;
            debug!(counter = self.clock.counter, "checkpoint saved");
        }
        Ok(checkpoint)
    }

    /// Replace the local state with `checkpoint`. Votes still being
    /// collected are not part of a checkpoint and carry on as they are.
    pub fn restore(&mut self, checkpoint: Checkpoint) -> ChorusResult<()> {
        self.ensure_running()?;
        if checkpoint.replica != self.replica {
            return Err(ChorusError::StoreError {
                reason: format!(
                    "checkpoint belongs to {}, not {}",
                    checkpoint.replica, self.replica
                ),
            });
        }
        self.tag_seq = checkpoint.state.max_tag_seq(&self.replica);
        self.clock = checkpoint.clock;
        self.state = checkpoint.state;
        self.delivery = checkpoint.delivery;
        self.confirmed = checkpoint.confirmed;
        self.reindex();
        info!(replica = %self.replica, counter = self.clock.counter, "state restored");
        Ok(())
    }

    /// Restore the latest checkpoint from the store. Returns whether one
    /// was found.
    pub fn restore_latest(&mut self) -> ChorusResult<bool> {
        let Some(store) = self.store.clone() else {
            return Ok(false);
        };
        match store.load()? {
            Some(checkpoint) => {
                self.restore(checkpoint)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
