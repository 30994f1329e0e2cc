//! The unit of replication: one experience event per local mutation.
//!
//! # Examples
//!
//! ```
//! use chorus_core::models::{EventPayload, ExperienceEvent, KnowledgeItem, KnowledgeUpdate, LogicalClock};
//!
//! let event = ExperienceEvent::new(
//!     LogicalClock::at("replica-a", 1),
//!     EventPayload::KnowledgeUpdate(KnowledgeUpdate {
//!         item: KnowledgeItem::new("k1", "water boils at 100C", 0.9),
//!         present: true,
//!     }),
//! );
//! assert!(event.validate_structure().is_ok());
//! assert_eq!(event.record_key(), "knowledge:k1");
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::belief::BeliefUpdate;
use super::knowledge::KnowledgeUpdate;
use super::memory::{ContentHash, MemoryRecord};
use super::replica::{LogicalClock, LwwStamp, ReplicaId, UniqueTag};
use super::vote::Attestation;
use crate::errors::SyncError;

/// A content hash withdrawn from the memory set, with the add tags the
/// retiring replica had observed for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetiredKey {
    pub hash: ContentHash,
    pub tags: Vec<UniqueTag>,
}

/// Wire payload of a `memory_add` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryAdd {
    pub record: MemoryRecord,
    pub hash: ContentHash,
    pub tag: UniqueTag,
    /// Representatives superseded by this record during deduplication.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retired: Vec<RetiredKey>,
}

/// Tagged union of the three replicated payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    MemoryAdd(MemoryAdd),
    KnowledgeUpdate(KnowledgeUpdate),
    BeliefUpdate(BeliefUpdate),
}

/// Discriminant of [`EventPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    MemoryAdd,
    KnowledgeUpdate,
    BeliefUpdate,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::MemoryAdd => "memory_add",
            PayloadKind::KnowledgeUpdate => "knowledge_update",
            PayloadKind::BeliefUpdate => "belief_update",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EventPayload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            EventPayload::MemoryAdd(_) => PayloadKind::MemoryAdd,
            EventPayload::KnowledgeUpdate(_) => PayloadKind::KnowledgeUpdate,
            EventPayload::BeliefUpdate(_) => PayloadKind::BeliefUpdate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceEvent {
    pub event_id: Uuid,
    pub origin_replica: ReplicaId,
    pub logical_time: LogicalClock,
    pub wall_time: DateTime<Utc>,
    pub payload: EventPayload,
    /// Present when the event asks for corroboration by the authoritative tier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation: Option<Attestation>,
    /// Clocks of older events from the same origin this one supersedes
    /// after outbox coalescing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub covers: Vec<LogicalClock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Vec<u8>>,
}

impl ExperienceEvent {
    /// A fresh unsigned event stamped now, originating at `logical_time.replica`.
    pub fn new(logical_time: LogicalClock, payload: EventPayload) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            origin_replica: logical_time.replica.clone(),
            logical_time,
            wall_time: Utc::now(),
            payload,
            attestation: None,
            covers: Vec::new(),
            signature: None,
        }
    }

    pub fn with_attestation(mut self, attestation: Attestation) -> Self {
        self.attestation = Some(attestation);
        self
    }

    pub fn kind(&self) -> PayloadKind {
        self.payload.kind()
    }

    /// LWW stamp of the write this event carries.
    pub fn stamp(&self) -> LwwStamp {
        LwwStamp::new(self.wall_time, self.logical_time.clone())
    }

    /// Key of the replicated record this event touches. Events with equal
    /// keys from one origin may be coalesced.
    pub fn record_key(&self) -> String {
        match &self.payload {
            EventPayload::MemoryAdd(add) => format!("memory:{}", add.hash),
            EventPayload::KnowledgeUpdate(update) => format!("knowledge:{}", update.item.id),
            EventPayload::BeliefUpdate(update) => format!("belief:{}", update.belief_id),
        }
    }

    /// Canonical bytes covered by the signature: the JSON encoding of the
    /// event with `signature` and `covers` cleared. `covers` is added by
    /// relays while coalescing and is not part of what the origin signed.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut unsigned = self.clone();
        unsigned.signature = None;
        unsigned.covers.clear();
        serde_json::to_vec(&unsigned)
    }

    /// Schema checks that need no replica state.
    pub fn validate_structure(&self) -> Result<(), SyncError> {
        let malformed = |reason: String| SyncError::MalformedEvent {
            event_id: self.event_id,
            reason,
        };

        if self.origin_replica.as_str().trim().is_empty() {
            return Err(malformed("origin replica is empty".to_string()));
        }
        if self.logical_time.replica != self.origin_replica {
            return Err(malformed(format!(
                "logical time {} does not belong to origin {}",
                self.logical_time, self.origin_replica
            )));
        }
        if self.logical_time.counter == 0 {
            return Err(malformed("logical counter must start at 1".to_string()));
        }
        for covered in &self.covers {
            if covered.replica != self.origin_replica
                || covered.counter == 0
                || covered.counter >= self.logical_time.counter
            {
                return Err(malformed(format!(
                    "covered clock {covered} is not an earlier clock of {}",
                    self.origin_replica
                )));
            }
        }

        match &self.payload {
            EventPayload::MemoryAdd(add) => {
                add.record.validate().map_err(&malformed)?;
                if add.hash != add.record.content_hash() {
                    return Err(malformed(format!(
                        "content hash {} does not match record {}",
                        add.hash, add.record.id
                    )));
                }
                if add.tag.seq == 0 {
                    return Err(malformed("memory tag sequence must start at 1".to_string()));
                }
            }
            EventPayload::KnowledgeUpdate(update) => update.item.validate().map_err(&malformed)?,
            EventPayload::BeliefUpdate(update) => update.validate().map_err(&malformed)?,
        }

        if let Some(attestation) = &self.attestation {
            attestation.value.validate().map_err(&malformed)?;
        }
        Ok(())
    }
}
