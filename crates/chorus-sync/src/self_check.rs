//! Runtime check of the merge laws on live state.
//!
//! Every component must be idempotent under merge and commute with its value
//! at the previous check, and the replica's logical clock must never move
//! backwards.

use chorus_core::{LogicalClock, SyncError};
use chorus_crdt::AgentStateCRDT;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct SelfCheck {
    previous: Option<AgentStateCRDT>,
    last_counter: u64,
    runs: u64,
}

impl SelfCheck {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> u64 {
        self.runs
    }

    pub fn check(&mut self, state: &AgentStateCRDT, clock: &LogicalClock) -> Result<(), SyncError> {
        self.runs += 1;
        if clock.counter < self.last_counter {
            return Err(violation(format!(
                "logical clock of {} moved backwards from {} to {}",
                clock.replica, self.last_counter, clock.counter
            )));
        }

        let previous = self.previous.take().unwrap_or_default();
        let before = previous.components();
        for (name, value) in state.components() {
            if value.merge(&value) != value {
                return Err(violation(format!("merge of {name} is not idempotent")));
            }
            if let Some((_, old)) = before.iter().find(|(n, _)| *n == name) {
                if value.merge(old) != old.merge(&value) {
                    return Err(violation(format!("merge of {name} does not commute")));
                }
            }
        }
        if state.merge(state) != *state {
            return Err(violation("agent state merge is not idempotent".to_string()));
        }
        if state.merge(&previous) != previous.merge(state) {
            return Err(violation("agent state merge does not commute".to_string()));
        }

        debug!(run = self.runs, counter = clock.counter, "self-check passed");
        self.last_counter = clock.counter;
        self.previous = Some(state.clone());
        Ok(())
    }
}

fn violation(details: String) -> SyncError {
    SyncError::StateInvariantViolation { details }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_fixtures::{belief_event, knowledge_event, memory_event};

    fn state_with(events: &[chorus_core::ExperienceEvent]) -> AgentStateCRDT {
        let mut state = AgentStateCRDT::new();
        for event in events {
            state.apply_delta(event).unwrap();
        }
        state
    }

    #[test]
    fn healthy_state_passes_repeatedly() {
        let mut check = SelfCheck::new();
        let early = state_with(&[memory_event("a", 1, "fact")]);
        check.check(&early, &LogicalClock::at("a", 1)).unwrap();
        let later = state_with(&[
            memory_event("a", 1, "fact"),
            knowledge_event("a", 2, "k", 0.5, true),
            belief_event("a", 3, "b", 2, &["e1"]),
        ]);
        check.check(&later, &LogicalClock::at("a", 3)).unwrap();
        assert_eq!(check.runs(), 2);
    }

    #[test]
    fn clock_regression_is_a_violation() {
        let mut check = SelfCheck::new();
        let state = AgentStateCRDT::new();
        check.check(&state, &LogicalClock::at("a", 5)).unwrap();
        let err = check.check(&state, &LogicalClock::at("a", 2)).unwrap_err();
        assert!(err.is_fatal());
    }
}
