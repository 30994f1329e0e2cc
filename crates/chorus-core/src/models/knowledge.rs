use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A scored claim backed by evidence references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: String,
    pub claim: String,
    pub score: f64,
    #[serde(default)]
    pub evidence: BTreeSet<String>,
}

impl KnowledgeItem {
    pub fn new(id: impl Into<String>, claim: impl Into<String>, score: f64) -> Self {
        Self {
            id: id.into(),
            claim: claim.into(),
            score,
            evidence: BTreeSet::new(),
        }
    }

    pub fn with_evidence<I, S>(mut self, evidence: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.evidence = evidence.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("knowledge item id is empty".to_string());
        }
        if !(self.score.is_finite() && (0.0..=1.0).contains(&self.score)) {
            return Err(format!(
                "score of knowledge item {} must be in [0, 1], got {}",
                self.id, self.score
            ));
        }
        Ok(())
    }
}

/// Wire payload of a `knowledge_update` event. `present = false` retracts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeUpdate {
    pub item: KnowledgeItem,
    #[serde(default = "default_present")]
    pub present: bool,
}

fn default_present() -> bool {
    true
}
