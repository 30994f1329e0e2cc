//! Replicated data model: identities, clocks, records, events, votes, and
//! the structured records published to the event sink.

mod belief;
mod event;
mod knowledge;
mod memory;
mod replica;
mod sync_record;
mod vote;

pub use belief::{BeliefUpdate, TaggedEvidence};
pub use event::{EventPayload, ExperienceEvent, MemoryAdd, PayloadKind, RetiredKey};
pub use knowledge::{KnowledgeItem, KnowledgeUpdate};
pub use memory::{content_hash, normalize_content, ContentHash, MemoryRecord, MemoryRecordId, Observation};
pub use replica::{LogicalClock, LwwStamp, ReplicaId, UniqueTag};
pub use sync_record::{DegradationEvent, DropReason, SyncRecord};
pub use vote::{Attestation, ClaimDecision, ClaimState, ClaimValue, VoteRecord};
