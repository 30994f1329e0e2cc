//! The confirmed tier: claims a quorum of replicas corroborated.

use std::collections::BTreeMap;

use chorus_core::models::{ClaimDecision, ClaimState, ClaimValue};
use chorus_core::ReplicaId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedClaim {
    pub claim_id: Uuid,
    pub value: ClaimValue,
    pub voters: Vec<ReplicaId>,
    /// Record key of the proposing event, when it was seen locally.
    pub subject: Option<String>,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedTier {
    claims: BTreeMap<Uuid, ConfirmedClaim>,
}

impl ConfirmedTier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Promote an accepted decision. Anything else is ignored.
    pub fn promote(&mut self, decision: &ClaimDecision, subject: Option<String>) -> bool {
        let (ClaimState::Accepted, Some(value)) = (decision.state, decision.value) else {
            return false;
        };
        self.claims.insert(
            decision.claim_id,
            ConfirmedClaim {
                claim_id: decision.claim_id,
                value,
                voters: decision.voters.clone(),
                subject,
                decided_at: decision.decided_at,
            },
        );
        true
    }

    pub fn get(&self, claim_id: &Uuid) -> Option<&ConfirmedClaim> {
        self.claims.get(claim_id)
    }

    pub fn contains(&self, claim_id: &Uuid) -> bool {
        self.claims.contains_key(claim_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfirmedClaim> {
        self.claims.values()
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(state: ClaimState, value: Option<ClaimValue>) -> ClaimDecision {
        ClaimDecision {
            claim_id: Uuid::new_v4(),
            state,
            value,
            voters: vec![ReplicaId::from("a")],
            outliers: Vec::new(),
            equivocators: Vec::new(),
            votes_received: 1,
            quorum: 1,
            reason: String::new(),
            decided_at: Utc::now(),
        }
    }

    #[test]
    fn only_accepted_claims_are_promoted() {
        let mut tier = ConfirmedTier::new();
        let accepted = decision(ClaimState::Accepted, Some(ClaimValue::Numeric(0.5)));
        assert!(tier.promote(&accepted, Some("knowledge:k".to_string())));
        assert!(!tier.promote(&decision(ClaimState::Expired, None), None));
        assert!(!tier.promote(&decision(ClaimState::Rejected, None), None));
        assert_eq!(tier.len(), 1);
        let claim = tier.get(&accepted.claim_id).unwrap();
        assert_eq!(claim.value, ClaimValue::Numeric(0.5));
        assert_eq!(claim.subject.as_deref(), Some("knowledge:k"));
    }
}
