//! Peer bookkeeping, gossip hygiene and flooding.

pub mod dedup;
pub mod flood;
pub mod limiter;
pub mod peer_container;

pub use dedup::MessageDedup;
pub use flood::Flooder;
pub use limiter::BandwidthLimiter;
pub use peer_container::{Peer, PeerContainer, MAX_PEERS};
