//! Error taxonomy for the engine.
//!
//! Subsystem errors live in their own modules and convert into the umbrella
//! [`ChorusError`]. Only [`SyncError::StateInvariantViolation`] (and the
//! [`SyncError::Halted`] state it leaves behind) is fatal.

mod embedding_error;
mod gossip_error;
mod quorum_error;
mod sync_error;

pub use embedding_error::EmbeddingError;
pub use gossip_error::GossipError;
pub use quorum_error::QuorumError;
pub use sync_error::SyncError;

/// Umbrella error for all Chorus operations.
#[derive(Debug, thiserror::Error)]
pub enum ChorusError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Gossip(#[from] GossipError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Quorum(#[from] QuorumError),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("invalid configuration: {reason}")]
    ConfigError { reason: String },

    #[error("durable store error: {reason}")]
    StoreError { reason: String },
}

impl ChorusError {
    /// Whether this error must halt the coordinator.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChorusError::Sync(e) if e.is_fatal())
    }
}

/// Convenience alias used across the workspace.
pub type ChorusResult<T> = Result<T, ChorusError>;
