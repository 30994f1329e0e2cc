//! Sync counters derived from published records.

use std::collections::BTreeMap;

use chorus_core::models::{ClaimState, SyncRecord};
use serde::{Deserialize, Serialize};

use crate::degradation::DegradationTracker;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncMetrics {
    /// Records seen, keyed by record name.
    pub records: BTreeMap<String, u64>,
    pub events_sent: u64,
    pub claims_accepted: u64,
    pub claims_rejected: u64,
    pub claims_expired: u64,
    pub degradation: DegradationTracker,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub records: BTreeMap<String, u64>,
    pub events_sent: u64,
    pub claims_accepted: u64,
    pub claims_rejected: u64,
    pub claims_expired: u64,
    pub active_degradations: usize,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, record: &SyncRecord) {
        *self.records.entry(record.name().to_string()).or_default() += 1;
        match record {
            SyncRecord::GossipRoundCompleted { events_sent, .. } => {
                self.events_sent += *events_sent as u64;
            }
            SyncRecord::ClaimDecided(decision) => match decision.state {
                ClaimState::Accepted => self.claims_accepted += 1,
                ClaimState::Rejected => self.claims_rejected += 1,
                ClaimState::Expired => self.claims_expired += 1,
                ClaimState::Pending => {}
            },
            SyncRecord::Degradation(event) => self.degradation.record(event.clone()),
            _ => {}
        }
    }

    pub fn count(&self, name: &str) -> u64 {
        self.records.get(name).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records: self.records.clone(),
            events_sent: self.events_sent,
            claims_accepted: self.claims_accepted,
            claims_rejected: self.claims_rejected,
            claims_expired: self.claims_expired,
            active_degradations: self.degradation.degraded_count(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
