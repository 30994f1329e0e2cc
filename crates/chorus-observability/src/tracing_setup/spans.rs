//! Span definitions per operation: ingest, gossip round, apply, vote.

/// Create an ingest span.
#[macro_export]
macro_rules! ingest_span {
    ($replica:expr) => {
        tracing::info_span!("chorus.ingest", replica = %$replica)
    };
}

/// Create a gossip round span.
#[macro_export]
macro_rules! gossip_round_span {
    ($replica:expr, $round:expr) => {
        tracing::info_span!("chorus.gossip_round", replica = %$replica, round = $round)
    };
}

/// Create a delta apply span.
#[macro_export]
macro_rules! apply_span {
    ($replica:expr, $event_id:expr, $origin:expr) => {
        tracing::debug_span!(
            "chorus.apply",
            replica = %$replica,
            event_id = %$event_id,
            origin = %$origin
        )
    };
}

/// Create a vote span.
#[macro_export]
macro_rules! vote_span {
    ($claim_id:expr, $voter:expr) => {
        tracing::debug_span!("chorus.vote", claim_id = %$claim_id, voter = %$voter)
    };
}

/// Span names as constants for programmatic use.
pub mod names {
    pub const INGEST: &str = "chorus.ingest";
    pub const GOSSIP_ROUND: &str = "chorus.gossip_round";
    pub const APPLY: &str = "chorus.apply";
    pub const VOTE: &str = "chorus.vote";
}
