//! # chorus-gossip
//!
//! Push gossip of experience events. Each round the disseminator picks a
//! random subset of peers and pushes every event that peer has not yet
//! acknowledged. Delivery is at-least-once; receivers apply idempotently.
//!
//! Anti-entropy closes the gaps pushes cannot: frames may carry the
//! sender's delivery digest, and a peer that has delivered more answers
//! with a state offer sent directly, outside peer selection.
//!
//! Round state machine: `Idle → SelectingPeers → Pushing → AwaitingAck → Idle`.

pub mod disseminator;
pub mod frame;
pub mod outbox;
pub mod peer;
pub mod transport;

pub use disseminator::{GossipDisseminator, GossipState, RoundReport};
pub use frame::{DeliveryDigest, GossipFrame, StateOffer};
pub use outbox::Outbox;
pub use peer::{PeerInfo, PeerTable};
pub use transport::{InMemoryNetwork, InMemoryTransport};
