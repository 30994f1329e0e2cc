//! Structured log events for key engine operations.
//!
//! Each function emits a `tracing` event with an `event` field naming it.

use chorus_core::models::{ClaimDecision, DropReason};
use chorus_core::ReplicaId;

pub fn degradation_triggered(component: &str, failure: &str, fallback: &str) {
    tracing::warn!(
        event = "degradation_triggered",
        component = %component,
        failure = %failure,
        fallback = %fallback,
        "degradation triggered"
    );
}

pub fn event_dropped(replica: &ReplicaId, event_id: Option<String>, reason: &DropReason) {
    tracing::warn!(
        event = "event_dropped",
        replica = %replica,
        event_id = ?event_id,
        reason = ?reason,
        "incoming event dropped"
    );
}

pub fn claim_decided(decision: &ClaimDecision) {
    tracing::info!(
        event = "claim_decided",
        claim_id = %decision.claim_id,
        state = %decision.state,
        value = ?decision.value,
        votes = decision.votes_received,
        quorum = decision.quorum,
        "claim decided"
    );
}

pub fn invariant_violated(replica: &ReplicaId, details: &str) {
    tracing::error!(
        event = "invariant_violated",
        replica = %replica,
        details = %details,
        "state invariant violated, coordinator halted"
    );
}
