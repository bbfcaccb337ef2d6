//! Wire codec and node-id handshake.

pub mod codec;
pub mod handshake;
pub mod version;

pub use codec::{deserialize_message, serialize_message, ProtocolError};
pub use handshake::{prove_ownership, SynCookies, HANDSHAKE_TIMEOUT_SECS};
pub use version::negotiate_version;
