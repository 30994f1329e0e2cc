//! Transport bindings. Only the in-process binding ships here; real
//! deployments implement [`chorus_core::traits::ITransport`] over their own
//! channel.

mod in_memory;

pub use in_memory::{InMemoryNetwork, InMemoryTransport};
