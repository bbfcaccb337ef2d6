//! Block instance deduplication.
//!
//! The same block routinely arrives on several paths at once — gossip,
//! bootstrap, vote payloads. Handles are reference-counted; the uniquer
//! keeps a weak registry keyed on content hash so all of them collapse to
//! one allocation, and entries vanish once the last strong handle drops.

use crate::block::Block;
use cobalt_types::BlockHash;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

const PRUNE_INTERVAL: usize = 256;

pub struct BlockUniquer {
    blocks: Mutex<HashMap<BlockHash, Weak<Block>>>,
    inserts: Mutex<usize>,
}

impl BlockUniquer {
    pub fn new() -> Self {
        Self {
            blocks: Mutex::new(HashMap::new()),
            inserts: Mutex::new(0),
        }
    }

    /// Return the canonical shared instance for this block's content,
    /// registering `block` if it is the first.
    pub fn unique(&self, block: Arc<Block>) -> Arc<Block> {
        let hash = block.hash();
        let mut blocks = self.blocks.lock().unwrap();
        let canonical = match blocks.get(&hash).and_then(Weak::upgrade) {
            Some(existing) => existing,
            None => {
                blocks.insert(hash, Arc::downgrade(&block));
                block
            }
        };
        drop(blocks);

        let mut inserts = self.inserts.lock().unwrap();
        *inserts += 1;
        if *inserts >= PRUNE_INTERVAL {
            *inserts = 0;
            drop(inserts);
            self.prune();
        }
        canonical
    }

    /// Drop registry entries whose last strong handle is gone.
    pub fn prune(&self) {
        self.blocks
            .lock()
            .unwrap()
            .retain(|_, weak| weak.strong_count() > 0);
    }

    pub fn len(&self) -> usize {
        self.blocks.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.lock().unwrap().is_empty()
    }
}

impl Default for BlockUniquer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::SendBlock;
    use cobalt_types::{Account, Amount, Signature};

    fn block(byte: u8) -> Arc<Block> {
        Arc::new(Block::Send(SendBlock {
            previous: BlockHash::new([byte; 32]),
            destination: Account::new([2u8; 32]),
            balance: Amount::new(1),
            signature: Signature::ZERO,
            work: 0,
        }))
    }

    #[test]
    fn identical_content_collapses_to_one_instance() {
        let uniquer = BlockUniquer::new();
        let a = uniquer.unique(block(1));
        let b = uniquer.unique(block(1));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(uniquer.len(), 1);
    }

    #[test]
    fn different_content_stays_distinct() {
        let uniquer = BlockUniquer::new();
        let a = uniquer.unique(block(1));
        let b = uniquer.unique(block(2));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(uniquer.len(), 2);
    }

    #[test]
    fn dropped_blocks_are_pruned() {
        let uniquer = BlockUniquer::new();
        let a = uniquer.unique(block(1));
        drop(a);
        uniquer.prune();
        assert!(uniquer.is_empty());
    }

    #[test]
    fn registry_survives_while_handles_live() {
        let uniquer = BlockUniquer::new();
        let a = uniquer.unique(block(1));
        uniquer.prune();
        assert_eq!(uniquer.len(), 1);
        let b = uniquer.unique(block(1));
        assert!(Arc::ptr_eq(&a, &b));
    }
}
