//! The transaction contract every backend implements.
//!
//! Read transactions are snapshot-consistent and may be long-lived (`renew`
//! refreshes the snapshot). Write transactions declare the tables they will
//! touch at begin, serialize against conflicting writers, and commit
//! atomically across all of them. Dropping a write transaction without
//! committing rolls every staged operation back.

use crate::account::AccountInfo;
use crate::confirmation_height::ConfirmationHeightInfo;
use crate::error::StoreError;
use crate::pending::{PendingInfo, PendingKey};
use crate::unchecked::{UncheckedInfo, UncheckedKey};
use cobalt_types::{Account, Amount, BlockHash, Root, Timestamp};

/// The logical tables; the backend maps each to a named database.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Table {
    Accounts,
    Blocks,
    Pending,
    Unchecked,
    Frontiers,
    Representation,
    Peers,
    OnlineWeight,
    ConfirmationHeight,
    FinalVotes,
    Meta,
}

/// Read-only view over all tables.
pub trait ReadTransaction {
    // ── accounts ────────────────────────────────────────────────────────
    fn account_get(&self, account: &Account) -> Result<Option<AccountInfo>, StoreError>;
    fn account_count(&self) -> Result<u64, StoreError>;

    // ── blocks ──────────────────────────────────────────────────────────
    /// Encoded block + sideband bytes. Decoding lives in the ledger crate.
    fn block_get(&self, hash: &BlockHash) -> Result<Option<Vec<u8>>, StoreError>;
    fn block_exists(&self, hash: &BlockHash) -> Result<bool, StoreError>;
    fn block_count(&self) -> Result<u64, StoreError>;
    /// Uniformly random stored block: probe a random key, take the next
    /// entry in iteration order, wrap to the first on overshoot.
    fn block_random(&self) -> Result<Option<(BlockHash, Vec<u8>)>, StoreError>;

    // ── pending ─────────────────────────────────────────────────────────
    fn pending_get(&self, key: &PendingKey) -> Result<Option<PendingInfo>, StoreError>;
    fn pending_exists(&self, key: &PendingKey) -> Result<bool, StoreError>;
    /// All receivables for one destination account.
    fn pending_iter_account(
        &self,
        account: &Account,
    ) -> Result<Vec<(PendingKey, PendingInfo)>, StoreError>;
    fn pending_count(&self) -> Result<u64, StoreError>;

    // ── unchecked ───────────────────────────────────────────────────────
    /// All blocks buffered against one missing dependency.
    fn unchecked_get(
        &self,
        dependency: &BlockHash,
    ) -> Result<Vec<(UncheckedKey, UncheckedInfo)>, StoreError>;
    fn unchecked_count(&self) -> Result<u64, StoreError>;

    // ── frontiers (legacy reverse index) ────────────────────────────────
    fn frontier_get(&self, hash: &BlockHash) -> Result<Option<Account>, StoreError>;

    // ── representation ──────────────────────────────────────────────────
    /// Cached weight delegated to a representative; absent means zero.
    fn rep_weight_get(&self, representative: &Account) -> Result<Amount, StoreError>;
    fn rep_weights_iter(&self) -> Result<Vec<(Account, Amount)>, StoreError>;

    // ── confirmation height ─────────────────────────────────────────────
    fn confirmation_height_get(
        &self,
        account: &Account,
    ) -> Result<Option<ConfirmationHeightInfo>, StoreError>;

    // ── final votes ─────────────────────────────────────────────────────
    fn final_vote_get(&self, root: &Root) -> Result<Option<BlockHash>, StoreError>;

    // ── online weight ───────────────────────────────────────────────────
    fn online_weight_iter(&self) -> Result<Vec<(Timestamp, Amount)>, StoreError>;

    // ── peers ───────────────────────────────────────────────────────────
    fn peers_iter(&self) -> Result<Vec<(String, Timestamp)>, StoreError>;

    // ── meta ────────────────────────────────────────────────────────────
    /// Schema version; 0 for a fresh database.
    fn version_get(&self) -> Result<u32, StoreError>;

    /// Refresh the snapshot. Long-lived readers call this between batches
    /// so writers' pages can be reclaimed.
    fn renew(&mut self) -> Result<(), StoreError>;
}

/// Mutating view; every method stages into the transaction, nothing is
/// visible to other transactions until `commit`.
pub trait WriteTransaction: ReadTransaction {
    fn account_put(&mut self, account: &Account, info: &AccountInfo) -> Result<(), StoreError>;
    fn account_del(&mut self, account: &Account) -> Result<(), StoreError>;

    fn block_put(&mut self, hash: &BlockHash, bytes: &[u8]) -> Result<(), StoreError>;
    fn block_del(&mut self, hash: &BlockHash) -> Result<(), StoreError>;

    fn pending_put(&mut self, key: &PendingKey, info: &PendingInfo) -> Result<(), StoreError>;
    fn pending_del(&mut self, key: &PendingKey) -> Result<(), StoreError>;

    fn unchecked_put(&mut self, key: &UncheckedKey, info: &UncheckedInfo)
        -> Result<(), StoreError>;
    fn unchecked_del(&mut self, key: &UncheckedKey) -> Result<(), StoreError>;

    fn frontier_put(&mut self, hash: &BlockHash, account: &Account) -> Result<(), StoreError>;
    fn frontier_del(&mut self, hash: &BlockHash) -> Result<(), StoreError>;

    /// Set the cached weight; a zero amount removes the row.
    fn rep_weight_put(&mut self, representative: &Account, weight: Amount)
        -> Result<(), StoreError>;

    fn confirmation_height_put(
        &mut self,
        account: &Account,
        info: &ConfirmationHeightInfo,
    ) -> Result<(), StoreError>;
    fn confirmation_height_del(&mut self, account: &Account) -> Result<(), StoreError>;

    fn final_vote_put(&mut self, root: &Root, hash: &BlockHash) -> Result<(), StoreError>;
    fn final_vote_del(&mut self, root: &Root) -> Result<(), StoreError>;

    fn online_weight_put(&mut self, sample_time: Timestamp, weight: Amount)
        -> Result<(), StoreError>;
    fn online_weight_del(&mut self, sample_time: Timestamp) -> Result<(), StoreError>;

    fn peer_put(&mut self, endpoint: &str, last_contact: Timestamp) -> Result<(), StoreError>;
    fn peer_del(&mut self, endpoint: &str) -> Result<(), StoreError>;

    fn version_put(&mut self, version: u32) -> Result<(), StoreError>;

    /// Atomically publish every staged operation. Consumes the transaction;
    /// a dropped transaction publishes nothing.
    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// A storage backend: hands out transactions over the logical tables.
pub trait Store: Send + Sync {
    fn tx_begin_read(&self) -> Result<Box<dyn ReadTransaction + '_>, StoreError>;

    /// `tables` declares the write set. Backends without sub-environment
    /// locking may serialize all writers regardless.
    fn tx_begin_write(
        &self,
        tables: &[Table],
    ) -> Result<Box<dyn WriteTransaction + '_>, StoreError>;
}
