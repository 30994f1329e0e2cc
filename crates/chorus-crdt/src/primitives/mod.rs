//! CRDT primitive data structures.
//!
//! Each type offers a pure `merge(&self, &other) -> Self` and the in-place
//! `merge_in`. Merges never fail and never touch their inputs.

pub mod add_wins_set;
pub mod gcounter;
pub mod gset;
pub mod lww_element_set;
pub mod lww_register;
pub mod two_phase_set;

pub use add_wins_set::AddWinsSet;
pub use gcounter::GCounter;
pub use gset::GSet;
pub use lww_element_set::{LWWElementSet, LwwEntry};
pub use lww_register::LWWRegister;
pub use two_phase_set::TwoPSet;
