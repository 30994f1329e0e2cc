//! The replicated state of one logical agent.

mod agent_state;
mod belief_state;
mod memory_store;

pub use agent_state::{AgentStateCRDT, StateField};
pub use belief_state::BeliefState;
pub use memory_store::MemoryStore;
