//! Per-component degradation state.
//!
//! A component is degraded from its first reported failure until it is
//! marked recovered. Repeated failures during one outage only bump its
//! occurrence count.

use std::collections::BTreeMap;

use chorus_core::models::DegradationEvent;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStatus {
    Degraded,
    Recovered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: RecoveryStatus,
    /// Start of the current outage, or of the last one once recovered.
    pub degraded_since: DateTime<Utc>,
    pub recovered_at: Option<DateTime<Utc>>,
    pub last_failure: String,
    pub fallback_used: String,
    /// Failures reported over the component's lifetime.
    pub occurrences: u64,
    pub outages: u64,
}

impl ComponentHealth {
    fn open(event: &DegradationEvent) -> Self {
        Self {
            status: RecoveryStatus::Degraded,
            degraded_since: event.timestamp,
            recovered_at: None,
            last_failure: event.failure.clone(),
            fallback_used: event.fallback_used.clone(),
            occurrences: 0,
            outages: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DegradationTracker {
    components: BTreeMap<String, ComponentHealth>,
}

impl DegradationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: DegradationEvent) {
        let health = self
            .components
            .entry(event.component.clone())
            .or_insert_with(|| ComponentHealth::open(&event));
        if health.status == RecoveryStatus::Recovered {
            health.status = RecoveryStatus::Degraded;
            health.degraded_since = event.timestamp;
            health.recovered_at = None;
            health.outages += 1;
        }
        health.occurrences += 1;
        health.last_failure = event.failure;
        health.fallback_used = event.fallback_used;
    }

    /// Close the component's current outage. Returns whether it had one.
    pub fn mark_recovered(&mut self, component: &str) -> bool {
        match self.components.get_mut(component) {
            Some(health) if health.status == RecoveryStatus::Degraded => {
                health.status = RecoveryStatus::Recovered;
                health.recovered_at = Some(Utc::now());
                true
            }
            _ => false,
        }
    }

    pub fn health(&self, component: &str) -> Option<&ComponentHealth> {
        self.components.get(component)
    }

    pub fn is_degraded(&self, component: &str) -> bool {
        self.health(component)
            .is_some_and(|h| h.status == RecoveryStatus::Degraded)
    }

    pub fn degraded_components(&self) -> Vec<&str> {
        self.components
            .iter()
            .filter(|(_, h)| h.status == RecoveryStatus::Degraded)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn degraded_count(&self) -> usize {
        self.degraded_components().len()
    }

    /// Length of the component's current outage as of `now`.
    pub fn degraded_for(&self, component: &str, now: DateTime<Utc>) -> Option<Duration> {
        self.health(component)
            .filter(|h| h.status == RecoveryStatus::Degraded)
            .map(|h| now - h.degraded_since)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(component: &str, at: DateTime<Utc>) -> DegradationEvent {
        DegradationEvent {
            component: component.to_string(),
            failure: "provider offline".to_string(),
            fallback_used: "lexical-token-overlap".to_string(),
            timestamp: at,
        }
    }

    #[test]
    fn repeated_failures_form_one_outage() {
        let start = Utc::now();
        let mut tracker = DegradationTracker::new();
        tracker.record(failure("similarity", start));
        tracker.record(failure("similarity", start + Duration::seconds(5)));

        let health = tracker.health("similarity").unwrap();
        assert_eq!(health.occurrences, 2);
        assert_eq!(health.outages, 1);
        assert_eq!(
            tracker.degraded_for("similarity", start + Duration::seconds(30)),
            Some(Duration::seconds(30))
        );
    }

    #[test]
    fn recovery_then_failure_opens_a_new_outage() {
        let start = Utc::now();
        let mut tracker = DegradationTracker::new();
        tracker.record(failure("similarity", start));
        assert!(tracker.mark_recovered("similarity"));
        assert!(!tracker.mark_recovered("similarity"));
        assert!(!tracker.is_degraded("similarity"));
        assert!(tracker.degraded_for("similarity", start).is_none());

        let later = start + Duration::minutes(2);
        tracker.record(failure("similarity", later));
        let health = tracker.health("similarity").unwrap();
        assert_eq!(health.outages, 2);
        assert_eq!(health.degraded_since, later);
        assert!(health.recovered_at.is_none());
    }

    #[test]
    fn components_recover_independently() {
        let now = Utc::now();
        let mut tracker = DegradationTracker::new();
        tracker.record(failure("similarity", now));
        tracker.record(failure("transport", now));
        tracker.mark_recovered("transport");
        assert_eq!(tracker.degraded_components(), vec!["similarity"]);
        assert_eq!(tracker.degraded_count(), 1);
    }
}
