use serde::{Deserialize, Serialize};

use super::replica::UniqueTag;

/// One evidence reference added to a belief, tagged for add-wins semantics.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaggedEvidence {
    pub reference: String,
    pub tag: UniqueTag,
}

/// Wire payload of a `belief_update` event.
///
/// `conviction` is the origin replica's absolute conviction count after the
/// update, not an increment, so redelivery is harmless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeliefUpdate {
    pub belief_id: String,
    pub statement: String,
    pub conviction: u64,
    #[serde(default)]
    pub evidence: Vec<TaggedEvidence>,
}

impl BeliefUpdate {
    pub fn validate(&self) -> Result<(), String> {
        if self.belief_id.trim().is_empty() {
            return Err("belief id is empty".to_string());
        }
        if self.evidence.iter().any(|e| e.tag.seq == 0) {
            return Err(format!(
                "belief {} carries an evidence tag with sequence 0",
                self.belief_id
            ));
        }
        Ok(())
    }
}
