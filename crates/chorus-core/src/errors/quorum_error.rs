use uuid::Uuid;

/// Byzantine vote collection errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QuorumError {
    #[error("unknown claim: {claim_id}")]
    UnknownClaim { claim_id: Uuid },

    #[error("claim {claim_id} already decided as {state}")]
    AlreadyDecided { claim_id: Uuid, state: String },

    #[error("voter {voter} changed its vote on claim {claim_id}")]
    EquivocatingVote { claim_id: Uuid, voter: String },

    #[error("claim {claim_id} mixes numeric and presence votes")]
    MixedClaimKinds { claim_id: Uuid },
}
