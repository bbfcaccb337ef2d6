//! Per-account head record.

use cobalt_types::{Account, Amount, BlockHash, Epoch, Timestamp};
use serde::{Deserialize, Serialize};

/// Everything the ledger tracks per account, keyed by the account itself.
/// Mutated only by the ledger inside a write transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Hash of the newest block on the chain.
    pub head: BlockHash,
    /// Hash of the first block on the chain.
    pub open_block: BlockHash,
    /// The account's current representative, denormalized from the head
    /// block so weight accounting never needs a second block fetch.
    pub representative: Account,
    pub balance: Amount,
    pub modified: Timestamp,
    pub block_count: u64,
    pub epoch: Epoch,
    /// Mirrored from the `confirmation_height` table; updated atomically
    /// with it when cementing.
    pub confirmation_height: u64,
}

impl AccountInfo {
    /// Height the next block on this chain will have.
    pub fn next_height(&self) -> u64 {
        self.block_count + 1
    }
}
