//! Work nonce valuation.

use blake2::digest::consts::U8;
use blake2::{Blake2b, Digest};
use cobalt_types::Root;

type Blake2b64 = Blake2b<U8>;

/// The difficulty value a nonce achieves against a root: an 8-byte Blake2b
/// digest of `nonce_le ‖ root`, read little-endian. Higher is harder.
pub fn work_value(root: &Root, work: u64) -> u64 {
    let mut hasher = Blake2b64::new();
    hasher.update(work.to_le_bytes());
    hasher.update(root.as_bytes());
    let digest = hasher.finalize();
    u64::from_le_bytes(digest.into())
}
