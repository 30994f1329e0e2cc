//! # chorus-core
//!
//! Foundation crate for the Chorus experience synchronization engine.
//! Defines the replicated record types, the wire event, votes, config,
//! errors, and the collaborator traits consumed by the engine.
//! Every other crate in the workspace depends on this.

pub mod config;
pub mod constants;
pub mod errors;
pub mod models;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use config::ChorusConfig;
pub use errors::{ChorusError, ChorusResult, SyncError};
pub use models::{
    ExperienceEvent, KnowledgeItem, LogicalClock, LwwStamp, MemoryRecord, ReplicaId, VoteRecord,
};
