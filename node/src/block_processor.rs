//! Block ingress pipeline.
//!
//! Three inputs — network blocks, local blocks and forced blocks from fork
//! resolution — funnel into the ledger under one recycled write
//! transaction. State-block signatures are verified in batches before
//! admission; gaps are parked in the persistent unchecked table and
//! resubmitted at the front of the queue when their dependency lands, so
//! dependents usually apply inside the same transaction.

use cobalt_crypto::{verify_batch, verify_signature};
use cobalt_ledger::{Block, Ledger, ProcessResult, RollbackError};
use cobalt_store::{
    ReadTransaction, SignatureVerification, Store, Table, UncheckedInfo, UncheckedKey,
    WriteTransaction,
};
use cobalt_types::{BlockHash, PublicKey, Timestamp};
use cobalt_utils::StatsCounter;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Where an ingress block came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockSource {
    Network,
    Local,
    Forced,
    /// Resubmitted from the unchecked table.
    Unchecked,
}

/// Outcome of one block, emitted after the batch's transaction commits so
/// observers (flooding, election creation, wallet follow-ups) see committed
/// state.
#[derive(Clone, Debug)]
pub struct ProcessedEvent {
    pub result: ProcessResult,
    pub block: Block,
    pub source: BlockSource,
    /// Hashes rolled back to make room for a winning forced block.
    pub rolled_back: Vec<BlockHash>,
}

const STAT_NAMES: &[&str] = &[
    "blocks_in",
    "bad_signature_dropped",
    "queue_full_dropped",
    "forced_rollback_refused",
];

pub struct BlockProcessor {
    ledger: Arc<Ledger>,
    store: Arc<dyn Store>,
    awaiting_verification: VecDeque<(Block, BlockSource)>,
    queue: VecDeque<(Block, BlockSource, SignatureVerification)>,
    forced: VecDeque<Block>,
    updates: VecDeque<Block>,
    verification_size: usize,
    batch_size: usize,
    batch_max_time: Duration,
    full_threshold: usize,
    pub stats: StatsCounter,
}

impl BlockProcessor {
    pub fn new(
        ledger: Arc<Ledger>,
        store: Arc<dyn Store>,
        verification_size: usize,
        batch_size: usize,
        batch_max_time: Duration,
        full_threshold: usize,
    ) -> Self {
        Self {
            ledger,
            store,
            awaiting_verification: VecDeque::new(),
            queue: VecDeque::new(),
            forced: VecDeque::new(),
            updates: VecDeque::new(),
            verification_size,
            batch_size,
            batch_max_time,
            full_threshold,
            stats: StatsCounter::new(STAT_NAMES),
        }
    }

    /// Back-pressure signal: network callers drop instead of enqueueing
    /// when this is set.
    pub fn full(&self) -> bool {
        self.backlog() > self.full_threshold
    }

    pub fn backlog(&self) -> usize {
        self.awaiting_verification.len() + self.queue.len() + self.forced.len() + self.updates.len()
    }

    /// Enqueue an ingress block. State blocks pass through the batch
    /// signature verifier first; legacy blocks resolve their signer inside
    /// the ledger. Returns false when dropped for back-pressure.
    pub fn add(&mut self, block: Block, source: BlockSource) -> bool {
        if self.full() {
            self.stats.increment("queue_full_dropped");
            return false;
        }
        self.stats.increment("blocks_in");
        if block.is_legacy() {
            self.queue
                .push_back((block, source, SignatureVerification::Unknown));
        } else {
            self.awaiting_verification.push_back((block, source));
        }
        true
    }

    /// Queue a replacement block from fork resolution; drains ahead of
    /// normal blocks.
    pub fn force(&mut self, block: Block) {
        self.forced.push_back(block);
    }

    /// Queue a stored-block rewrite; drains ahead of everything.
    pub fn add_update(&mut self, block: Block) {
        self.updates.push_back(block);
    }

    /// Drain the verification backlog in batches, admitting valid blocks
    /// into the main queue and dropping the rest with a stat.
    pub fn verify_pending(&mut self) {
        while !self.awaiting_verification.is_empty() {
            let take = self.verification_size.min(self.awaiting_verification.len());
            let batch: Vec<(Block, BlockSource)> =
                self.awaiting_verification.drain(..take).collect();

            let hashes: Vec<BlockHash> = batch.iter().map(|(b, _)| b.hash()).collect();
            let messages: Vec<&[u8]> = hashes.iter().map(|h| h.as_bytes().as_slice()).collect();
            let signatures: Vec<_> = batch.iter().map(|(b, _)| *b.signature()).collect();
            let keys: Vec<PublicKey> = batch
                .iter()
                .map(|(b, _)| {
                    b.account_field()
                        .expect("only state blocks reach the verifier")
                        .public_key()
                })
                .collect();

            let results = verify_batch(&messages, &signatures, &keys);
            for (((block, source), ok), hash) in batch.into_iter().zip(results).zip(&hashes) {
                if ok {
                    self.queue
                        .push_back((block, source, SignatureVerification::Valid));
                    continue;
                }
                // Signer unknown: an epoch-marker link means the epoch
                // signer must be re-checked before rejecting.
                let epoch_signed = block
                    .link_field()
                    .and_then(|link| self.ledger.constants.epochs.epoch_of_link(&link))
                    .and_then(|epoch| self.ledger.constants.epochs.signer(epoch))
                    .map(|signer| {
                        verify_signature(hash.as_bytes(), block.signature(), &signer.public_key())
                    })
                    .unwrap_or(false);
                if epoch_signed {
                    self.queue
                        .push_back((block, source, SignatureVerification::ValidEpoch));
                } else {
                    self.stats.increment("bad_signature_dropped");
                    tracing::debug!(%hash, "state block dropped: bad signature");
                }
            }
        }
    }

    /// Drain one batch into the ledger: updates, then forced, then normal
    /// blocks, bounded by count and wall clock. The write transaction
    /// commits before the events are returned, so every observer sees
    /// committed state.
    pub fn process_batch(&mut self) -> Result<Vec<ProcessedEvent>, cobalt_store::StoreError> {
        self.verify_pending();
        if self.queue.is_empty() && self.forced.is_empty() && self.updates.is_empty() {
            return Ok(Vec::new());
        }

        let store = Arc::clone(&self.store);
        let mut txn = store.tx_begin_write(&[
            Table::Accounts,
            Table::Blocks,
            Table::Pending,
            Table::Unchecked,
            Table::Frontiers,
            Table::Representation,
        ])?;

        let deadline = Instant::now() + self.batch_max_time;
        let mut events = Vec::new();
        while events.len() < self.batch_size && Instant::now() < deadline {
            if let Some(block) = self.updates.pop_front() {
                self.apply_update(txn.as_mut(), block)?;
                continue;
            }
            let (block, source) = if let Some(block) = self.forced.pop_front() {
                (block, BlockSource::Forced)
            } else if let Some((block, source, _)) = self.queue.pop_front() {
                (block, source)
            } else {
                break;
            };
            let event = self.process_one(txn.as_mut(), block, source)?;
            events.push(event);
        }

        txn.commit()?;
        Ok(events)
    }

    /// Rewrite the stored bytes for a known hash, keeping its sideband.
    fn apply_update(
        &self,
        txn: &mut dyn WriteTransaction,
        block: Block,
    ) -> Result<(), cobalt_store::StoreError> {
        let hash = block.hash();
        if let Some(mut stored) = self.ledger.stored_block(txn, &hash)? {
            stored.block = block;
            txn.block_put(&hash, &stored.to_bytes())?;
        }
        Ok(())
    }

    fn process_one(
        &mut self,
        txn: &mut dyn WriteTransaction,
        block: Block,
        source: BlockSource,
    ) -> Result<ProcessedEvent, cobalt_store::StoreError> {
        let hash = block.hash();
        let mut result = self.ledger.process(txn, &block)?;
        let mut rolled_back = Vec::new();

        match result {
            ProcessResult::Progress => {
                self.resubmit_dependents(txn, &block, &hash)?;
            }
            ProcessResult::GapPrevious => {
                self.buffer_unchecked(txn, &block, block.previous())?;
            }
            ProcessResult::GapSource => {
                let dependency = block
                    .source_field()
                    .or_else(|| block.link_field().map(|l| l.as_block_hash()))
                    .unwrap_or(BlockHash::ZERO);
                self.buffer_unchecked(txn, &block, dependency)?;
            }
            ProcessResult::GapEpochOpenPending => {
                // Keyed on the opening account: any send to it unparks the
                // epoch open.
                let dependency = block
                    .account_field()
                    .map(|a| BlockHash::new(*a.as_bytes()))
                    .unwrap_or(BlockHash::ZERO);
                self.buffer_unchecked(txn, &block, dependency)?;
            }
            ProcessResult::Fork if source == BlockSource::Forced => {
                // Fork resolution decided against the stored chain: roll it
                // back and publish the replacement.
                if let Some(conflict) = self.conflicting_block(txn, &block)? {
                    match self.ledger.rollback(txn, &conflict) {
                        Ok(hashes) => {
                            rolled_back = hashes;
                            result = self.ledger.process(txn, &block)?;
                            if result == ProcessResult::Progress {
                                self.resubmit_dependents(txn, &block, &hash)?;
                            }
                        }
                        Err(RollbackError::Cemented) => {
                            self.stats.increment("forced_rollback_refused");
                            tracing::error!(
                                %hash,
                                %conflict,
                                "forced block dropped: rollback would cross a cemented height"
                            );
                        }
                        Err(err) => {
                            tracing::error!(%hash, %err, "forced rollback failed");
                        }
                    }
                }
            }
            _ => {}
        }

        Ok(ProcessedEvent {
            result,
            block,
            source,
            rolled_back,
        })
    }

    /// The block currently occupying this block's root.
    fn conflicting_block(
        &self,
        txn: &dyn cobalt_store::ReadTransaction,
        block: &Block,
    ) -> Result<Option<BlockHash>, cobalt_store::StoreError> {
        let previous = block.previous();
        if !previous.is_zero() {
            return self.ledger.block_successor(txn, &previous);
        }
        let Some(account) = block.account_field() else {
            return Ok(None);
        };
        Ok(txn.account_get(&account)?.map(|info| info.open_block))
    }

    fn buffer_unchecked(
        &self,
        txn: &mut dyn WriteTransaction,
        block: &Block,
        dependency: BlockHash,
    ) -> Result<(), cobalt_store::StoreError> {
        let key = UncheckedKey::new(dependency, block.hash());
        let info = UncheckedInfo {
            block: block.serialize(),
            modified: Timestamp::now(),
            verified: if block.is_legacy() {
                SignatureVerification::Unknown
            } else {
                SignatureVerification::Valid
            },
            confirmed: false,
        };
        txn.unchecked_put(&key, &info)
    }

    /// Pull blocks waiting on this hash (and, for sends, on the destination
    /// account) out of the unchecked table and resubmit them at the front
    /// of the queue so they apply inside the same transaction.
    fn resubmit_dependents(
        &mut self,
        txn: &mut dyn WriteTransaction,
        block: &Block,
        hash: &BlockHash,
    ) -> Result<(), cobalt_store::StoreError> {
        let mut dependencies = vec![*hash];
        let destination = match block {
            Block::Send(b) => Some(b.destination),
            _ => block
                .link_field()
                .map(|l| l.as_account())
                .filter(|_| self.is_send_shape(block)),
        };
        if let Some(destination) = destination {
            dependencies.push(BlockHash::new(*destination.as_bytes()));
        }

        for dependency in dependencies {
            for (key, info) in txn.unchecked_get(&dependency)? {
                txn.unchecked_del(&key)?;
                match Block::deserialize(&info.block) {
                    Ok(dependent) => {
                        self.queue
                            .push_front((dependent, BlockSource::Unchecked, info.verified));
                    }
                    Err(err) => {
                        tracing::warn!(%err, "corrupt unchecked entry dropped");
                    }
                }
            }
        }
        Ok(())
    }

    fn is_send_shape(&self, block: &Block) -> bool {
        matches!(block, Block::State(_) | Block::State2(_))
    }
}

impl BlockProcessor {
    /// Test/bootstrap convenience: keep draining until the backlog is
    /// empty, returning every event in order.
    pub fn drain(&mut self) -> Result<Vec<ProcessedEvent>, cobalt_store::StoreError> {
        let mut events = Vec::new();
        loop {
            let batch = self.process_batch()?;
            if batch.is_empty() {
                return Ok(events);
            }
            events.extend(batch);
        }
    }
}
