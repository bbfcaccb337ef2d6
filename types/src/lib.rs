//! Fundamental types for the cobalt protocol.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: accounts, hashes, amounts, keys, timestamps, epochs, and the
//! per-network constant profiles.

pub mod account;
pub mod amount;
pub mod epoch;
pub mod hash;
pub mod keys;
pub mod network;
pub mod time;

pub use account::Account;
pub use amount::Amount;
pub use epoch::{Epoch, Epochs};
pub use hash::{BlockHash, Link, Root};
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use network::{NetworkId, NetworkProfile, WorkThresholds};
pub use time::Timestamp;
