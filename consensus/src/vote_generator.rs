//! Local vote generation for representative nodes.
//!
//! Confirmed-as-winner hashes queue here; every generation pass signs one
//! vote covering up to 12 of them. Vote spacing refuses to vote twice on
//! the same root within the spacing window unless it is for the same hash,
//! which keeps a rep from flip-flopping across a fork.

use cobalt_ledger::{Vote, FINAL_VOTE_SEQUENCE, MAX_VOTE_HASHES};
use cobalt_types::{BlockHash, KeyPair, Root, Timestamp};
use std::collections::{HashMap, VecDeque};

/// Window within which a rep will not re-vote on a root for a different hash.
pub const VOTE_SPACING_SECS: u64 = 1;

/// Per-root re-vote guard.
pub struct VoteSpacing {
    recent: HashMap<Root, (BlockHash, Timestamp)>,
}

impl VoteSpacing {
    pub fn new() -> Self {
        Self {
            recent: HashMap::new(),
        }
    }

    /// Whether voting for `hash` at `root` is allowed right now.
    pub fn votable(&self, root: &Root, hash: &BlockHash, now: Timestamp) -> bool {
        match self.recent.get(root) {
            Some((voted_hash, at)) => {
                voted_hash == hash || at.has_expired(VOTE_SPACING_SECS, now)
            }
            None => true,
        }
    }

    pub fn flag(&mut self, root: Root, hash: BlockHash, now: Timestamp) {
        self.recent.insert(root, (hash, now));
    }

    pub fn prune(&mut self, now: Timestamp) {
        self.recent
            .retain(|_, (_, at)| !at.has_expired(VOTE_SPACING_SECS * 60, now));
    }
}

impl Default for VoteSpacing {
    fn default() -> Self {
        Self::new()
    }
}

/// Batches winner hashes into signed votes from the local rep key.
pub struct VoteGenerator {
    keys: KeyPair,
    sequence: u64,
    queue: VecDeque<(Root, BlockHash)>,
    final_queue: VecDeque<(Root, BlockHash)>,
    spacing: VoteSpacing,
}

impl VoteGenerator {
    pub fn new(keys: KeyPair) -> Self {
        Self {
            keys,
            sequence: 0,
            queue: VecDeque::new(),
            final_queue: VecDeque::new(),
            spacing: VoteSpacing::new(),
        }
    }

    /// Queue a hash for a normal vote.
    pub fn add(&mut self, root: Root, hash: BlockHash, now: Timestamp) {
        if self.spacing.votable(&root, &hash, now) {
            self.queue.push_back((root, hash));
        }
    }

    /// Queue a hash for a final vote (the election reached quorum here).
    pub fn add_final(&mut self, root: Root, hash: BlockHash) {
        self.final_queue.push_back((root, hash));
    }

    pub fn pending(&self) -> usize {
        self.queue.len() + self.final_queue.len()
    }

    /// Sign one vote over up to 12 queued hashes. Final votes drain first
    /// and never mix with normal ones, since their sequence differs.
    pub fn generate(&mut self, now: Timestamp) -> Option<Vote> {
        if !self.final_queue.is_empty() {
            let hashes = self.take_batch(true, now);
            if !hashes.is_empty() {
                return Some(Vote::new(&self.keys, FINAL_VOTE_SEQUENCE, hashes));
            }
        }
        let hashes = self.take_batch(false, now);
        if hashes.is_empty() {
            return None;
        }
        self.sequence += 1;
        Some(Vote::new(&self.keys, self.sequence, hashes))
    }

    fn take_batch(&mut self, final_votes: bool, now: Timestamp) -> Vec<BlockHash> {
        let queue = if final_votes {
            &mut self.final_queue
        } else {
            &mut self.queue
        };
        let mut hashes = Vec::new();
        while hashes.len() < MAX_VOTE_HASHES {
            let Some((root, hash)) = queue.pop_front() else {
                break;
            };
            if !self.spacing.votable(&root, &hash, now) {
                continue;
            }
            self.spacing.flag(root, hash, now);
            hashes.push(hash);
        }
        hashes
    }
}
