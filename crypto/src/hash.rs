//! Blake2b hashing for blocks, votes and addresses.

use blake2::digest::consts::U32;
use blake2::digest::{Update, VariableOutput};
use blake2::{Blake2b, Blake2bVar, Digest};

type Blake2b256 = Blake2b<U32>;

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    Digest::update(&mut hasher, data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        Digest::update(&mut hasher, part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// The 40-bit address checksum: a 5-byte Blake2b digest of the public key.
pub fn blake2b_checksum(data: &[u8]) -> [u8; 5] {
    let mut hasher = Blake2bVar::new(5).expect("5 is a valid blake2b output length");
    hasher.update(data);
    let mut output = [0u8; 5];
    hasher
        .finalize_variable(&mut output)
        .expect("output length matches");
    output
}
