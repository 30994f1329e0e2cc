//! # chorus-crdt
//!
//! Conflict-free replicated data types for Chorus replicas.
//!
//! ## Primitives
//! - [`GSet`]: grow-only set
//! - [`GCounter`]: grow-only counter, per-replica max
//! - [`LWWElementSet`]: last-writer-wins element set
//! - [`TwoPSet`]: two-phase set, removal is permanent
//! - [`AddWinsSet`]: observed-remove set, concurrent add beats remove
//! - [`LWWRegister`]: last-writer-wins register
//!
//! [`CrdtValue`] closes the five set/counter primitives into one sum type.
//! [`AgentStateCRDT`] composes them into the replicated memory, knowledge
//! and belief collections.
//!
//! Every `merge` is commutative, associative and idempotent.

pub mod primitives;
pub mod state;
pub mod value;

pub use primitives::{AddWinsSet, GCounter, GSet, LWWElementSet, LWWRegister, TwoPSet};
pub use state::{AgentStateCRDT, BeliefState, MemoryStore, StateField};
pub use value::CrdtValue;
