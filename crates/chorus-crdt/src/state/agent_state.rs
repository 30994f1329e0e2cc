use std::collections::BTreeMap;

use chorus_core::models::{EventPayload, KnowledgeItem, PayloadKind};
use chorus_core::{ExperienceEvent, ReplicaId, SyncError};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::belief_state::BeliefState;
use super::memory_store::MemoryStore;
use crate::primitives::LWWElementSet;
use crate::value::CrdtValue;

/// Field of [`AgentStateCRDT`] a delta targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    Memories,
    Knowledge,
    Beliefs,
}

impl StateField {
    /// The field a payload of `kind` is allowed to touch.
    pub fn for_kind(kind: PayloadKind) -> Self {
        match kind {
            PayloadKind::MemoryAdd => StateField::Memories,
            PayloadKind::KnowledgeUpdate => StateField::Knowledge,
            PayloadKind::BeliefUpdate => StateField::Beliefs,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StateField::Memories => "memories",
            StateField::Knowledge => "knowledge",
            StateField::Beliefs => "beliefs",
        }
    }
}

/// Replicated memories, knowledge and beliefs of one logical agent.
///
/// Merge is field-wise; every field is a CRDT, so the composition is too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentStateCRDT {
    pub memories: MemoryStore,
    pub knowledge: LWWElementSet<String, KnowledgeItem>,
    pub beliefs: BTreeMap<String, BeliefState>,
}

impl AgentStateCRDT {
    pub fn new() -> Self {
        Self::default()
    }

    /// State holding just the effect of `event`.
    pub fn from_event(event: &ExperienceEvent) -> Result<Self, SyncError> {
        event.validate_structure()?;
        let stamp = event.stamp();
        let mut delta = Self::new();
        match &event.payload {
            EventPayload::MemoryAdd(add) => delta.memories.apply_add(add, stamp),
            EventPayload::KnowledgeUpdate(update) => {
                if update.present {
                    delta
                        .knowledge
                        .insert(update.item.id.clone(), update.item.clone(), stamp);
                } else {
                    delta.knowledge.remove(update.item.id.clone(), stamp);
                }
            }
            EventPayload::BeliefUpdate(update) => {
                delta.beliefs.insert(
                    update.belief_id.clone(),
                    BeliefState::from_update(update, &event.origin_replica, stamp),
                );
            }
        }
        Ok(delta)
    }

    /// Apply one delta. The event's effect is built as a state of its own and
    /// merged in, so delivering the same event again changes nothing.
    pub fn apply_delta(&mut self, event: &ExperienceEvent) -> Result<StateField, SyncError> {
        let field = StateField::for_kind(event.kind());
        self.apply_delta_to(field, event)?;
        Ok(field)
    }

    /// Apply a delta aimed at `field`, rejecting payloads of another kind.
    pub fn apply_delta_to(
        &mut self,
        field: StateField,
        event: &ExperienceEvent,
    ) -> Result<(), SyncError> {
        let expected = StateField::for_kind(event.kind());
        if expected != field {
            return Err(SyncError::PayloadMismatch {
                event_id: event.event_id,
                expected: field.as_str().to_string(),
                found: event.kind().to_string(),
            });
        }
        let delta = Self::from_event(event)?;
        self.merge_in(&delta);
        trace!(event_id = %event.event_id, field = field.as_str(), "delta applied");
        Ok(())
    }

    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.merge_in(other);
        merged
    }

    pub fn merge_in(&mut self, other: &Self) {
        self.memories.merge_in(&other.memories);
        self.knowledge.merge_in(&other.knowledge);
        for (id, theirs) in &other.beliefs {
            match self.beliefs.get_mut(id) {
                Some(ours) => ours.merge_in(theirs),
                None => {
                    self.beliefs.insert(id.clone(), theirs.clone());
                }
            }
        }
    }

    pub fn belief(&self, id: &str) -> Option<&BeliefState> {
        self.beliefs.get(id)
    }

    /// Highest add-tag sequence `replica` has used anywhere in this state.
    pub fn max_tag_seq(&self, replica: &ReplicaId) -> u64 {
        self.beliefs
            .values()
            .map(|b| b.max_tag_seq(replica))
            .fold(self.memories.max_tag_seq(replica), u64::max)
    }

    /// The set-valued components as closed CRDT values, for law checks.
    pub fn components(&self) -> Vec<(String, CrdtValue<String, KnowledgeItem>)> {
        let mut out = vec![
            (
                "memories.members".to_string(),
                CrdtValue::AddWinsSet(self.memories.members().clone()),
            ),
            (
                "knowledge".to_string(),
                CrdtValue::LwwElementSet(self.knowledge.clone()),
            ),
        ];
        for (id, belief) in &self.beliefs {
            out.push((
                format!("beliefs.{id}.conviction"),
                CrdtValue::GCounter(belief.conviction.clone()),
            ));
            out.push((
                format!("beliefs.{id}.supporting_replicas"),
                CrdtValue::GSet(
                    belief
                        .supporting_replicas
                        .iter()
                        .map(|r| r.as_str().to_string())
                        .collect(),
                ),
            ));
            out.push((
                format!("beliefs.{id}.evidence"),
                CrdtValue::AddWinsSet(belief.evidence.clone()),
            ));
        }
        out
    }
}
