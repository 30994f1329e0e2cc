//! Structured records the engine publishes to its injected event sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::PayloadKind;
use super::memory::MemoryRecordId;
use super::replica::{LogicalClock, ReplicaId};
use super::vote::ClaimDecision;

/// A degradation event when a subsystem falls back to a lower-quality mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradationEvent {
    pub component: String,
    pub failure: String,
    pub fallback_used: String,
    pub timestamp: DateTime<Utc>,
}

/// Why an incoming event was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "details", rename_all = "snake_case")]
pub enum DropReason {
    Malformed(String),
    InvalidSignature,
    PayloadMismatch(String),
    CausalBufferFull,
    UndecodableFrame(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum SyncRecord {
    MemoryIngested {
        replica: ReplicaId,
        id: MemoryRecordId,
    },
    DedupMerged {
        replica: ReplicaId,
        id: MemoryRecordId,
        into: MemoryRecordId,
        score: f64,
        merge_count: u32,
    },
    DeltaApplied {
        replica: ReplicaId,
        event_id: Uuid,
        origin: ReplicaId,
        kind: PayloadKind,
    },
    DuplicateObserved {
        replica: ReplicaId,
        event_id: Uuid,
        origin: ReplicaId,
    },
    EventDropped {
        replica: ReplicaId,
        event_id: Option<Uuid>,
        reason: DropReason,
    },
    EventBuffered {
        replica: ReplicaId,
        event_id: Uuid,
        waiting_for: LogicalClock,
    },
    GossipRoundCompleted {
        replica: ReplicaId,
        round: u64,
        selected: usize,
        delivered: usize,
        unreachable: usize,
        events_sent: usize,
    },
    PeerSkipped {
        replica: ReplicaId,
        peer: ReplicaId,
        round: u64,
        reason: String,
    },
    VoteRegistered {
        claim_id: Uuid,
        voter: ReplicaId,
    },
    ClaimDecided(ClaimDecision),
    Degradation(DegradationEvent),
    InvariantViolation {
        replica: ReplicaId,
        details: String,
    },
    /// A peer's full state was merged in to close a gap gossip could not.
    StateTransferred {
        replica: ReplicaId,
        from: ReplicaId,
        memories: usize,
    },
}

impl SyncRecord {
    /// Stable snake_case name, used as a metrics key.
    pub fn name(&self) -> &'static str {
        match self {
            SyncRecord::MemoryIngested { .. } => "memory_ingested",
            SyncRecord::DedupMerged { .. } => "dedup_merged",
            SyncRecord::DeltaApplied { .. } => "delta_applied",
            SyncRecord::DuplicateObserved { .. } => "duplicate_observed",
            SyncRecord::EventDropped { .. } => "event_dropped",
            SyncRecord::EventBuffered { .. } => "event_buffered",
            SyncRecord::GossipRoundCompleted { .. } => "gossip_round_completed",
            SyncRecord::PeerSkipped { .. } => "peer_skipped",
            SyncRecord::VoteRegistered { .. } => "vote_registered",
            SyncRecord::ClaimDecided(_) => "claim_decided",
            SyncRecord::Degradation(_) => "degradation",
            SyncRecord::InvariantViolation { .. } => "invariant_violation",
            SyncRecord::StateTransferred { .. } => "state_transferred",
        }
    }
}
