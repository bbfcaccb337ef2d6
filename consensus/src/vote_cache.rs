//! Vote cache — holds votes that arrive before their election exists.
//!
//! Votes routinely beat the blocks they confirm across the network. The
//! cache keeps the most recent vote per (hash, voter) so a starting election
//! can be seeded instantly, and replays cached votes to peers requesting
//! confirmation of a hash that was already decided.

use cobalt_ledger::Vote;
use cobalt_types::{Account, Amount, BlockHash, Timestamp};
use std::collections::HashMap;

const MAX_CACHE_ENTRIES: usize = 65_536;
const MAX_VOTERS_PER_HASH: usize = 64;
const VOTE_CACHE_TTL_SECS: u64 = 900;

#[derive(Clone, Debug)]
struct CachedVote {
    voter: Account,
    sequence: u64,
    weight: Amount,
    vote: Vote,
    arrived: Timestamp,
}

#[derive(Default)]
struct CacheEntry {
    votes: Vec<CachedVote>,
}

impl CacheEntry {
    fn tally(&self) -> Amount {
        self.votes
            .iter()
            .fold(Amount::ZERO, |sum, v| sum.saturating_add(v.weight))
    }
}

/// Pre-election vote storage with per-voter replacement and weight-ordered
/// eviction.
pub struct VoteCache {
    entries: HashMap<BlockHash, CacheEntry>,
}

impl VoteCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Record a vote against one of its hashes. Higher sequences replace a
    /// voter's earlier entry; at the per-hash voter cap the lightest voter
    /// is evicted if the newcomer is heavier.
    pub fn insert(&mut self, hash: BlockHash, vote: &Vote, weight: Amount, now: Timestamp) {
        if self.entries.len() >= MAX_CACHE_ENTRIES && !self.entries.contains_key(&hash) {
            self.cleanup(now);
            if self.entries.len() >= MAX_CACHE_ENTRIES {
                return;
            }
        }
        let entry = self.entries.entry(hash).or_default();

        if let Some(existing) = entry.votes.iter_mut().find(|v| v.voter == vote.account) {
            if vote.sequence > existing.sequence {
                existing.sequence = vote.sequence;
                existing.weight = weight;
                existing.vote = vote.clone();
                existing.arrived = now;
            }
            return;
        }

        if entry.votes.len() >= MAX_VOTERS_PER_HASH {
            let Some(min_idx) = entry
                .votes
                .iter()
                .enumerate()
                .min_by_key(|(_, v)| v.weight)
                .map(|(i, _)| i)
            else {
                return;
            };
            if weight <= entry.votes[min_idx].weight {
                return;
            }
            entry.votes.remove(min_idx);
        }

        entry.votes.push(CachedVote {
            voter: vote.account,
            sequence: vote.sequence,
            weight,
            vote: vote.clone(),
            arrived: now,
        });
    }

    /// Remove and return all cached votes for a hash — called when its
    /// election starts.
    pub fn drain(&mut self, hash: &BlockHash) -> Vec<Vote> {
        self.entries
            .remove(hash)
            .map(|entry| entry.votes.into_iter().map(|v| v.vote).collect())
            .unwrap_or_default()
    }

    /// Peek the cached votes for a hash without consuming them — used to
    /// answer confirm_reqs from the cache.
    pub fn find(&self, hash: &BlockHash) -> Vec<Vote> {
        self.entries
            .get(hash)
            .map(|entry| entry.votes.iter().map(|v| v.vote.clone()).collect())
            .unwrap_or_default()
    }

    /// Accumulated weight cached for a hash.
    pub fn tally(&self, hash: &BlockHash) -> Amount {
        self.entries
            .get(hash)
            .map(|e| e.tally())
            .unwrap_or(Amount::ZERO)
    }

    /// The `n` hashes with the heaviest cached support, descending.
    pub fn top(&self, n: usize) -> Vec<(BlockHash, Amount)> {
        let mut all: Vec<(BlockHash, Amount)> = self
            .entries
            .iter()
            .map(|(hash, entry)| (*hash, entry.tally()))
            .collect();
        all.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        all.truncate(n);
        all
    }

    /// Drop votes older than the TTL, and entries left empty by it.
    pub fn cleanup(&mut self, now: Timestamp) {
        self.entries.retain(|_, entry| {
            entry
                .votes
                .retain(|v| !v.arrived.has_expired(VOTE_CACHE_TTL_SECS, now));
            !entry.votes.is_empty()
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for VoteCache {
    fn default() -> Self {
        Self::new()
    }
}
