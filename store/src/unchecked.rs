//! Blocks buffered until their dependencies arrive.

use cobalt_types::{BlockHash, Timestamp};
use serde::{Deserialize, Serialize};

/// Outcome of signature checking recorded with a buffered block, so the
/// batch verifier's work is not repeated when the block is re-submitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SignatureVerification {
    #[default]
    Unknown,
    Invalid,
    Valid,
    /// Valid against the epoch signer rather than the account key.
    ValidEpoch,
}

/// Composite key `(missing dependency hash, buffered block hash)`; all
/// blocks waiting on one dependency are contiguous under range scans.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UncheckedKey {
    pub dependency: BlockHash,
    pub hash: BlockHash,
}

impl UncheckedKey {
    pub fn new(dependency: BlockHash, hash: BlockHash) -> Self {
        Self { dependency, hash }
    }

    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(self.dependency.as_bytes());
        out[32..].copy_from_slice(self.hash.as_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 64 {
            return None;
        }
        let mut dependency = [0u8; 32];
        let mut hash = [0u8; 32];
        dependency.copy_from_slice(&bytes[..32]);
        hash.copy_from_slice(&bytes[32..]);
        Some(Self {
            dependency: BlockHash::new(dependency),
            hash: BlockHash::new(hash),
        })
    }
}

/// A buffered block with its ingestion metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncheckedInfo {
    /// Wire-encoded block.
    pub block: Vec<u8>,
    pub modified: Timestamp,
    pub verified: SignatureVerification,
    /// Whether the block arrived inside a confirmed-election payload.
    pub confirmed: bool,
}
