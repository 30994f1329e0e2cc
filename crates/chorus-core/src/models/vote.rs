use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::replica::ReplicaId;

/// The value a replica reports for a claim.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ClaimValue {
    /// An aggregate quantity such as a confidence.
    Numeric(f64),
    /// "This memory exists" style claims.
    Presence(bool),
}

impl ClaimValue {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ClaimValue::Numeric(v) if !v.is_finite() => {
                Err(format!("numeric claim value must be finite, got {v}"))
            }
            _ => Ok(()),
        }
    }

    pub fn same_kind(&self, other: &ClaimValue) -> bool {
        matches!(
            (self, other),
            (ClaimValue::Numeric(_), ClaimValue::Numeric(_))
                | (ClaimValue::Presence(_), ClaimValue::Presence(_))
        )
    }
}

impl fmt::Display for ClaimValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimValue::Numeric(v) => write!(f, "{v}"),
            ClaimValue::Presence(v) => write!(f, "{v}"),
        }
    }
}

/// Marks an event for the authoritative tier: the origin replica reports
/// `value` for the claim `claim_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attestation {
    pub claim_id: Uuid,
    pub value: ClaimValue,
}

/// One replica's report for a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    /// The claim being voted on (the proposing event's id).
    pub event_id: Uuid,
    pub voter_replica: ReplicaId,
    pub claimed_value: ClaimValue,
    pub received_at: DateTime<Utc>,
}

impl VoteRecord {
    pub fn new(event_id: Uuid, voter_replica: ReplicaId, claimed_value: ClaimValue) -> Self {
        Self {
            event_id,
            voter_replica,
            claimed_value,
            received_at: Utc::now(),
        }
    }
}

/// Lifecycle of a claim. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimState {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

impl ClaimState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ClaimState::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimState::Pending => "pending",
            ClaimState::Accepted => "accepted",
            ClaimState::Rejected => "rejected",
            ClaimState::Expired => "expired",
        }
    }
}

impl fmt::Display for ClaimState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimDecision {
    pub claim_id: Uuid,
    pub state: ClaimState,
    /// Aggregated value, present only when accepted.
    pub value: Option<ClaimValue>,
    /// Replicas whose votes made it into the aggregate.
    pub voters: Vec<ReplicaId>,
    /// Replicas whose votes were fenced out or dissented.
    pub outliers: Vec<ReplicaId>,
    pub equivocators: Vec<ReplicaId>,
    pub votes_received: usize,
    pub quorum: usize,
    pub reason: String,
    pub decided_at: DateTime<Utc>,
}
