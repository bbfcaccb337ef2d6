//! Hashing, signing and address encoding for the cobalt protocol.

pub mod address;
pub mod hash;
pub mod keys;
pub mod sign;

pub use address::{decode_account, encode_account};
pub use hash::{blake2b_256, blake2b_256_multi, blake2b_checksum};
pub use keys::{derive_key, generate_keypair, keypair_from_private, public_from_private};
pub use sign::{sign_message, verify_batch, verify_signature};
