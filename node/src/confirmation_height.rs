//! Confirmation-height processor — cements quorum winners.
//!
//! Cementing a block fixes its account chain up to that height. Because a
//! receive depends on a send on another chain, confirming one block can
//! implicitly confirm ancestors across accounts: the processor walks those
//! dependencies and cements them first. The bounded mode recycles the write
//! transaction between accounts so readers and the block processor are not
//! starved during deep catch-up; the unbounded mode cements the whole
//! subgraph in one transaction and is selected for initial sync.

use cobalt_ledger::{Block, Ledger};
use cobalt_store::{
    ConfirmationHeightInfo, ReadTransaction, Store, StoreError, Table, WriteTransaction,
};
use cobalt_types::{Account, BlockHash};
use std::sync::Arc;

/// Walker selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CementMode {
    Bounded,
    Unbounded,
}

/// Observer events emitted by a cementing run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CementEvent {
    /// An account chain was cemented up to `height`.
    Cemented {
        account: Account,
        height: u64,
        frontier: BlockHash,
    },
    /// The requested hash was cemented before this run — a benign race
    /// between confirmation signals and cemented-state queries.
    AlreadyCemented(BlockHash),
}

pub struct ConfirmationHeightProcessor {
    ledger: Arc<Ledger>,
    store: Arc<dyn Store>,
    unbounded_cutoff: u64,
    batch_write_size: u64,
}

impl ConfirmationHeightProcessor {
    pub fn new(
        ledger: Arc<Ledger>,
        store: Arc<dyn Store>,
        unbounded_cutoff: u64,
        batch_write_size: u64,
    ) -> Self {
        Self {
            ledger,
            store,
            unbounded_cutoff,
            batch_write_size,
        }
    }

    /// Bounded by default; unbounded when the uncemented backlog says the
    /// node is catching up from scratch.
    pub fn select_mode(&self, block_count: u64, cemented_count: u64) -> CementMode {
        if block_count.saturating_sub(cemented_count) > self.unbounded_cutoff {
            CementMode::Unbounded
        } else {
            CementMode::Bounded
        }
    }

    /// Cement `target` and every uncemented dependency under it.
    /// Re-cementing an already-cemented hash is a no-op that reports
    /// `AlreadyCemented`.
    pub fn cement(
        &self,
        target: &BlockHash,
        mode: CementMode,
    ) -> Result<Vec<CementEvent>, StoreError> {
        let mut events = Vec::new();
        loop {
            let store = Arc::clone(&self.store);
            let mut txn = store.tx_begin_write(&[
                Table::Accounts,
                Table::ConfirmationHeight,
                Table::Blocks,
            ])?;
            let budget = match mode {
                CementMode::Bounded => self.batch_write_size,
                CementMode::Unbounded => u64::MAX,
            };
            let done = self.cement_walk(txn.as_mut(), target, budget, &mut events)?;
            txn.commit()?;
            if done {
                return Ok(events);
            }
        }
    }

    /// One transaction's worth of the dependency walk. Returns true when
    /// the target is fully cemented (or unknown/raced), false when the
    /// write budget ran out and the caller should re-enter with a fresh
    /// transaction — cemented progress is durable, so re-entry converges.
    fn cement_walk(
        &self,
        txn: &mut dyn WriteTransaction,
        target: &BlockHash,
        budget: u64,
        events: &mut Vec<CementEvent>,
    ) -> Result<bool, StoreError> {
        let Some(target_stored) = self.ledger.stored_block(txn, target)? else {
            tracing::warn!(%target, "cement requested for unknown block");
            return Ok(true);
        };
        {
            let account = target_stored.sideband.account;
            let current = self.cemented_height(txn, &account)?;
            if target_stored.sideband.height <= current {
                if events.is_empty() {
                    events.push(CementEvent::AlreadyCemented(*target));
                }
                return Ok(true);
            }
        }

        let mut cemented_this_txn = 0u64;
        let mut stack: Vec<BlockHash> = vec![*target];
        while let Some(&hash) = stack.last() {
            let Some(stored) = self.ledger.stored_block(txn, &hash)? else {
                stack.pop();
                continue;
            };
            let account = stored.sideband.account;
            let current = self.cemented_height(txn, &account)?;
            if stored.sideband.height <= current {
                stack.pop();
                continue;
            }

            // Scan the uncemented span of this chain for receive sources
            // that themselves are not cemented yet.
            let mut dependencies = Vec::new();
            let mut cursor = hash;
            loop {
                let Some(span) = self.ledger.stored_block(txn, &cursor)? else {
                    break;
                };
                if span.sideband.height <= current {
                    break;
                }
                if span.sideband.details.is_receive {
                    if let Some(source) = source_of(&span.block) {
                        if let Some(source_stored) = self.ledger.stored_block(txn, &source)? {
                            let source_current =
                                self.cemented_height(txn, &source_stored.sideband.account)?;
                            if source_stored.sideband.height > source_current {
                                dependencies.push(source);
                            }
                        }
                    }
                }
                if span.sideband.height == current + 1 {
                    break;
                }
                cursor = span.block.previous();
            }
            if !dependencies.is_empty() {
                stack.extend(dependencies);
                continue;
            }

            // All dependencies cemented: fix this chain up to `hash`.
            let height = stored.sideband.height;
            txn.confirmation_height_put(&account, &ConfirmationHeightInfo::new(height, hash))?;
            if let Some(mut info) = txn.account_get(&account)? {
                info.confirmation_height = height;
                txn.account_put(&account, &info)?;
            }
            events.push(CementEvent::Cemented {
                account,
                height,
                frontier: hash,
            });
            tracing::debug!(%account, height, frontier = %hash, "chain cemented");
            cemented_this_txn += height - current;
            stack.pop();

            if cemented_this_txn >= budget && !stack.is_empty() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn cemented_height(
        &self,
        txn: &dyn WriteTransaction,
        account: &Account,
    ) -> Result<u64, StoreError> {
        Ok(txn
            .confirmation_height_get(account)?
            .map(|c| c.height)
            .unwrap_or(0))
    }
}

/// The send a receive-classified block consumed.
fn source_of(block: &Block) -> Option<BlockHash> {
    match block {
        Block::Receive(b) => Some(b.source),
        Block::Open(b) => Some(b.source),
        Block::State(b) => Some(b.link.as_block_hash()),
        Block::State2(b) => Some(b.link.as_block_hash()),
        _ => None,
    }
}
