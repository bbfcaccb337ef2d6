//! Confirming set — the queue between quorum and cementing.
//!
//! Elections hand their winners here; the confirmation-height thread drains
//! it in batches. Duplicate hashes collapse, and a near-full queue raises a
//! back-pressure flag the election scheduler consults before confirming
//! more work into it.

use cobalt_types::BlockHash;
use std::collections::{HashSet, VecDeque};

const MAX_QUEUED: usize = 16_384;
const BATCH_SIZE: usize = 256;

pub struct ConfirmingSet {
    queue: VecDeque<BlockHash>,
    queued: HashSet<BlockHash>,
    cemented_total: u64,
}

impl ConfirmingSet {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            queued: HashSet::new(),
            cemented_total: 0,
        }
    }

    /// Queue a confirmed hash for cementing. Duplicates and overflow are
    /// refused; overflow callers retry after the next drain.
    pub fn add(&mut self, hash: BlockHash) -> bool {
        if self.queued.contains(&hash) {
            return true;
        }
        if self.queue.len() >= MAX_QUEUED {
            return false;
        }
        self.queue.push_back(hash);
        self.queued.insert(hash);
        true
    }

    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.queued.contains(hash)
    }

    /// Take the next cementing batch.
    pub fn next_batch(&mut self) -> Vec<BlockHash> {
        let count = BATCH_SIZE.min(self.queue.len());
        let batch: Vec<BlockHash> = self.queue.drain(..count).collect();
        for hash in &batch {
            self.queued.remove(hash);
        }
        batch
    }

    /// Back-pressure: sized against 80% of capacity.
    pub fn is_near_full(&self) -> bool {
        self.queue.len() >= MAX_QUEUED * 80 / 100
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn record_cemented(&mut self, count: u64) {
        self.cemented_total += count;
    }

    pub fn cemented_total(&self) -> u64 {
        self.cemented_total
    }
}

impl Default for ConfirmingSet {
    fn default() -> Self {
        Self::new()
    }
}
