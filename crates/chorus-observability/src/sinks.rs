//! [`IEventSink`] implementations.

use std::sync::{Arc, Mutex, PoisonError};

use chorus_core::models::SyncRecord;
use chorus_core::traits::IEventSink;

use crate::metrics::{MetricsSnapshot, SyncMetrics};
use crate::tracing_setup::events;

/// Logs every record through `tracing` at a level matching its severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl IEventSink for TracingSink {
    fn publish(&self, record: SyncRecord) {
        match &record {
            SyncRecord::Degradation(event) => events::degradation_triggered(
                &event.component,
                &event.failure,
                &event.fallback_used,
            ),
            SyncRecord::EventDropped {
                replica,
                event_id,
                reason,
            } => events::event_dropped(replica, event_id.map(|id| id.to_string()), reason),
            SyncRecord::ClaimDecided(decision) => events::claim_decided(decision),
            SyncRecord::InvariantViolation { replica, details } => {
                events::invariant_violated(replica, details)
            }
            SyncRecord::PeerSkipped {
                replica,
                peer,
                round,
                reason,
            } => tracing::debug!(
                event = "peer_skipped",
                replica = %replica,
                peer = %peer,
                round,
                reason = %reason,
                "peer skipped"
            ),
            other => tracing::debug!(event = other.name(), record = ?other, "sync record"),
        }
    }
}

/// Keeps every record in memory. Meant for tests and diagnostics.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<SyncRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<SyncRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Records whose name is `name`.
    pub fn named(&self, name: &str) -> Vec<SyncRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.name() == name)
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.name() == name)
            .count()
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl IEventSink for MemorySink {
    fn publish(&self, record: SyncRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }
}

/// Folds records into [`SyncMetrics`].
#[derive(Debug, Default)]
pub struct MetricsSink {
    metrics: Mutex<SyncMetrics>,
}

impl MetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    pub fn metrics(&self) -> SyncMetrics {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn mark_recovered(&self, component: &str) -> bool {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .degradation
            .mark_recovered(component)
    }
}

impl IEventSink for MetricsSink {
    fn publish(&self, record: SyncRecord) {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observe(&record);
    }
}

/// Forwards every record to each inner sink in order.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn IEventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn IEventSink>>) -> Self {
        Self { sinks }
    }

    pub fn with(mut self, sink: Arc<dyn IEventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl IEventSink for FanoutSink {
    fn publish(&self, record: SyncRecord) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.publish(record.clone());
            }
            last.publish(record);
        }
    }
}
