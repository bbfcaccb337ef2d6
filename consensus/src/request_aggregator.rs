//! Request aggregator — coalesces confirm_req traffic into batched replies.
//!
//! Requests for the same hashes pile up per channel; on each flush every
//! non-empty bucket drains into confirm_ack messages of at most
//! [`cobalt_ledger::MAX_VOTE_HASHES`] hashes. Hashes with no cached or fresh
//! vote are reported back so the requester can time out cleanly.

use cobalt_ledger::{Vote, MAX_VOTE_HASHES};
use cobalt_types::{BlockHash, Root, Timestamp};
use std::collections::{HashMap, VecDeque};

/// Seconds between bucket flushes.
pub const AGGREGATOR_FLUSH_INTERVAL_SECS: u64 = 1;

const MAX_BUCKETS: usize = 1024;
const MAX_REQUESTS_PER_BUCKET: usize = 512;

/// One flushed reply for one channel.
#[derive(Clone, Debug)]
pub struct AggregatorReply {
    pub channel: String,
    /// Votes to send as confirm_acks, each covering up to 12 hashes.
    pub votes: Vec<Vote>,
    /// Requested hashes we could not vote on; an empty ack covers them.
    pub unknown: Vec<BlockHash>,
}

/// Per-channel buckets of pending confirm_req entries.
pub struct RequestAggregator {
    buckets: HashMap<String, VecDeque<(BlockHash, Root)>>,
    last_flush: Timestamp,
}

impl RequestAggregator {
    pub fn new() -> Self {
        Self {
            buckets: HashMap::new(),
            last_flush: Timestamp::EPOCH,
        }
    }

    /// Append a request's (hash, root) pairs to the requester's bucket.
    /// Returns false when the request was dropped for capacity.
    pub fn add_request(&mut self, channel: &str, pairs: Vec<(BlockHash, Root)>) -> bool {
        if self.buckets.len() >= MAX_BUCKETS && !self.buckets.contains_key(channel) {
            return false;
        }
        let bucket = self.buckets.entry(channel.to_string()).or_default();
        if bucket.len() + pairs.len() > MAX_REQUESTS_PER_BUCKET {
            return false;
        }
        bucket.extend(pairs);
        true
    }

    pub fn should_flush(&self, now: Timestamp) -> bool {
        self.last_flush.has_expired(AGGREGATOR_FLUSH_INTERVAL_SECS, now)
    }

    pub fn pending_channels(&self) -> usize {
        self.buckets.len()
    }

    /// Drain every bucket into replies. `resolve` produces a vote for a
    /// hash when one is available (vote cache hit or a fresh local vote).
    pub fn flush(
        &mut self,
        now: Timestamp,
        mut resolve: impl FnMut(&BlockHash, &Root) -> Option<Vote>,
    ) -> Vec<AggregatorReply> {
        self.last_flush = now;
        let mut replies = Vec::with_capacity(self.buckets.len());
        for (channel, mut bucket) in self.buckets.drain() {
            let mut votes: Vec<Vote> = Vec::new();
            let mut covered: Vec<BlockHash> = Vec::new();
            let mut unknown = Vec::new();
            while let Some((hash, root)) = bucket.pop_front() {
                if covered.contains(&hash) {
                    continue;
                }
                match resolve(&hash, &root) {
                    Some(vote) => {
                        covered.extend(vote.hashes.iter().copied());
                        votes.push(vote);
                    }
                    None => {
                        if !unknown.contains(&hash) {
                            unknown.push(hash);
                        }
                    }
                }
            }
            debug_assert!(votes.iter().all(|v| v.hashes.len() <= MAX_VOTE_HASHES));
            replies.push(AggregatorReply {
                channel,
                votes,
                unknown,
            });
        }
        replies
    }
}

impl Default for RequestAggregator {
    fn default() -> Self {
        Self::new()
    }
}
