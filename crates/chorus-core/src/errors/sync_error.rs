use uuid::Uuid;

/// Errors raised while validating and applying experience events.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    #[error("malformed event {event_id}: {reason}")]
    MalformedEvent { event_id: Uuid, reason: String },

    #[error("invalid signature on event {event_id}")]
    InvalidSignature { event_id: Uuid },

    #[error("payload mismatch on event {event_id}: expected {expected}, found {found}")]
    PayloadMismatch {
        event_id: Uuid,
        expected: String,
        found: String,
    },

    #[error("causal buffer full ({capacity} events), dropped event {event_id}")]
    CausalBufferFull { event_id: Uuid, capacity: usize },

    #[error("state invariant violated: {details}")]
    StateInvariantViolation { details: String },

    #[error("coordinator halted after invariant violation; operator intervention required")]
    Halted,
}

impl SyncError {
    /// Only an invariant violation (and the halted state it causes) is fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::StateInvariantViolation { .. } | SyncError::Halted
        )
    }

    /// Id of the offending event, when the error concerns one.
    pub fn event_id(&self) -> Option<Uuid> {
        match self {
            SyncError::MalformedEvent { event_id, .. }
            | SyncError::InvalidSignature { event_id }
            | SyncError::PayloadMismatch { event_id, .. }
            | SyncError::CausalBufferFull { event_id, .. } => Some(*event_id),
            SyncError::StateInvariantViolation { .. } | SyncError::Halted => None,
        }
    }
}
