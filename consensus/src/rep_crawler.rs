//! Representative crawler — maps voting accounts to network channels.
//!
//! The node periodically probes peers with a `confirm_req` for a block it
//! knows to be cemented. Any vote coming back is proof the channel speaks
//! for that representative. Reps that stop acking fall out after a timeout.

use cobalt_types::{Account, Amount, BlockHash, Timestamp};
use std::collections::HashMap;

/// Reps not re-confirmed within this window are dropped.
pub const REP_CRAWLER_TIMEOUT_SECS: u64 = 300;
/// Minimum interval between crawl rounds.
pub const CRAWL_INTERVAL_SECS: u64 = 7;

/// A representative reachable through a channel.
#[derive(Clone, Debug)]
pub struct Representative {
    pub account: Account,
    pub channel: String,
    pub weight: Amount,
    pub last_response: Timestamp,
}

/// A crawl probe to send: a cemented block's hash to one channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrawlTarget {
    pub channel: String,
    pub hash: BlockHash,
}

pub struct RepCrawler {
    /// Keyed by representative account; a rep moving to a new channel
    /// replaces its entry.
    reps: HashMap<Account, Representative>,
    last_crawl: Timestamp,
}

impl RepCrawler {
    pub fn new() -> Self {
        Self {
            reps: HashMap::new(),
            last_crawl: Timestamp::EPOCH,
        }
    }

    pub fn should_crawl(&self, now: Timestamp) -> bool {
        self.last_crawl.has_expired(CRAWL_INTERVAL_SECS, now)
    }

    /// Build probes for one crawl round: the cemented hash is sent to every
    /// supplied channel.
    pub fn start_crawl(
        &mut self,
        cemented_hash: BlockHash,
        channels: &[String],
        now: Timestamp,
    ) -> Vec<CrawlTarget> {
        self.last_crawl = now;
        channels
            .iter()
            .map(|channel| CrawlTarget {
                channel: channel.clone(),
                hash: cemented_hash,
            })
            .collect()
    }

    /// Credit a vote (solicited or not) as representative evidence.
    pub fn response(
        &mut self,
        channel: &str,
        account: Account,
        weight: Amount,
        now: Timestamp,
    ) {
        self.reps.insert(
            account,
            Representative {
                account,
                channel: channel.to_string(),
                weight,
                last_response: now,
            },
        );
    }

    /// Drop reps whose last ack is past the timeout. Returns the dropped
    /// accounts.
    pub fn purge(&mut self, now: Timestamp) -> Vec<Account> {
        let stale: Vec<Account> = self
            .reps
            .values()
            .filter(|r| r.last_response.has_expired(REP_CRAWLER_TIMEOUT_SECS, now))
            .map(|r| r.account)
            .collect();
        for account in &stale {
            self.reps.remove(account);
            tracing::debug!(rep = %account, "representative timed out");
        }
        stale
    }

    /// All known reps with at least `min_weight`, heaviest first.
    pub fn representatives(&self, count: usize, min_weight: Amount) -> Vec<Representative> {
        let mut reps: Vec<Representative> = self
            .reps
            .values()
            .filter(|r| r.weight >= min_weight)
            .cloned()
            .collect();
        reps.sort_by(|a, b| b.weight.cmp(&a.weight));
        reps.truncate(count);
        reps
    }

    /// Principal representatives: weight ≥ online stake / factor.
    pub fn principal_representatives(
        &self,
        count: usize,
        online: Amount,
        factor: u128,
    ) -> Vec<Representative> {
        let min = Amount::new(online.raw() / factor.max(1));
        self.representatives(count, min)
    }

    pub fn total_weight(&self) -> Amount {
        self.reps
            .values()
            .fold(Amount::ZERO, |sum, r| sum.saturating_add(r.weight))
    }

    pub fn len(&self) -> usize {
        self.reps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reps.is_empty()
    }
}

impl Default for RepCrawler {
    fn default() -> Self {
        Self::new()
    }
}
