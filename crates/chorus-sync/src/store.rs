//! Durable checkpoints. Only the serialization boundary lives here; where
//! the bytes go is up to the [`IDurableStore`] binding.

use std::sync::{Mutex, PoisonError};

use chorus_core::constants::PROTOCOL_VERSION;
use chorus_core::errors::{ChorusError, ChorusResult};
use chorus_core::{LogicalClock, ReplicaId};
use chorus_crdt::AgentStateCRDT;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::confirmed::ConfirmedTier;
use crate::delivery::DeliveryTracker;

/// Everything a replica needs to resume where it stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: String,
    pub replica: ReplicaId,
    pub clock: LogicalClock,
    pub state: AgentStateCRDT,
    pub delivery: DeliveryTracker,
    pub confirmed: ConfirmedTier,
    pub taken_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(
        clock: LogicalClock,
        state: AgentStateCRDT,
        delivery: DeliveryTracker,
        confirmed: ConfirmedTier,
    ) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            replica: clock.replica.clone(),
            clock,
            state,
            delivery,
            confirmed,
            taken_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> ChorusResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> ChorusResult<Self> {
        let checkpoint: Checkpoint = serde_json::from_slice(bytes)?;
        if checkpoint.version != PROTOCOL_VERSION {
            return Err(ChorusError::StoreError {
                reason: format!(
                    "checkpoint version {} is not supported (expected {})",
                    checkpoint.version, PROTOCOL_VERSION
                ),
            });
        }
        Ok(checkpoint)
    }
}

/// Where checkpoints are kept.
pub trait IDurableStore: Send + Sync {
    fn save(&self, checkpoint: &Checkpoint) -> ChorusResult<()>;

    /// The latest checkpoint, if one was saved.
    fn load(&self) -> ChorusResult<Option<Checkpoint>>;
}

/// Holds the latest checkpoint as JSON bytes in memory.
#[derive(Debug, Default)]
pub struct JsonStateStore {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl JsonStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw JSON of the latest checkpoint.
    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl IDurableStore for JsonStateStore {
    fn save(&self, checkpoint: &Checkpoint) -> ChorusResult<()> {
        let bytes = checkpoint.to_json()?;
        *self.bytes.lock().unwrap_or_else(PoisonError::into_inner) = Some(bytes);
        Ok(())
    }

    fn load(&self) -> ChorusResult<Option<Checkpoint>> {
        self.bytes()
            .map(|bytes| Checkpoint::from_json(&bytes))
            .transpose()
    }
}
