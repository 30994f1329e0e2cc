//! Narrow interfaces to the collaborators the engine consumes.

mod event_sink;
mod similarity;
mod transport;

pub use event_sink::{IEventSink, NoopSink};
pub use similarity::ISimilarityProvider;
pub use transport::{ITransport, ReceiveCallback};
