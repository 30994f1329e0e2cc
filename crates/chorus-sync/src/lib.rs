//! # chorus-sync
//!
//! The sync coordinator that ties the engine together: local ingest through
//! the deduplicator, causal delivery of remote events, signing, gossip,
//! Byzantine corroboration and the confirmed tier, plus checkpoints and a
//! runtime self-check of the merge laws.

pub mod confirmed;
pub mod coordinator;
pub mod delivery;
pub mod handle;
pub mod self_check;
pub mod signing;
pub mod store;

pub use confirmed::{ConfirmedClaim, ConfirmedTier};
pub use coordinator::{ApplyOutcome, MemoryMetadata, SyncCoordinator};
pub use delivery::{Admission, DeliveryTracker, Released};
pub use handle::SyncHandle;
pub use self_check::SelfCheck;
pub use signing::{EventSigner, Keyring};
pub use store::{Checkpoint, IDurableStore, JsonStateStore};
