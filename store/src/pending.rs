//! Receivable transfers: sends not yet matched by a receive.

use cobalt_types::{Account, Amount, BlockHash, Epoch};
use serde::{Deserialize, Serialize};

/// Composite key `(destination account, send block hash)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PendingKey {
    pub account: Account,
    pub hash: BlockHash,
}

impl PendingKey {
    pub fn new(account: Account, hash: BlockHash) -> Self {
        Self { account, hash }
    }

    /// 64-byte ordered key: destination then hash, so one account's
    /// receivables are contiguous under range scans.
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(self.account.as_bytes());
        out[32..].copy_from_slice(self.hash.as_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 64 {
            return None;
        }
        let mut account = [0u8; 32];
        let mut hash = [0u8; 32];
        account.copy_from_slice(&bytes[..32]);
        hash.copy_from_slice(&bytes[32..]);
        Some(Self {
            account: Account::new(account),
            hash: BlockHash::new(hash),
        })
    }
}

/// What a receivable is worth and where it came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInfo {
    pub source: Account,
    pub amount: Amount,
    /// Epoch of the send block. A receive of a higher-epoch send upgrades
    /// the receiving account.
    pub epoch: Epoch,
}
