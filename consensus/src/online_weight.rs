//! Online representative tracking and the quorum delta.
//!
//! Quorum is a fraction of *online* stake, not total stake, so the network
//! keeps confirming when large holders go dark. Online weight is sampled
//! periodically into the store; the trended value is the median of recent
//! samples, floored at the profile's minimum.

use cobalt_types::{Account, Amount, Timestamp};
use std::collections::HashMap;

/// Representatives seen voting within this window count as online.
pub const ONLINE_WEIGHT_PERIOD_SECS: u64 = 300;

/// Tracks which representatives were recently seen voting.
pub struct OnlineReps {
    seen: HashMap<Account, Timestamp>,
}

impl OnlineReps {
    pub fn new() -> Self {
        Self {
            seen: HashMap::new(),
        }
    }

    /// Record a vote arrival from a representative.
    pub fn observe(&mut self, rep: Account, now: Timestamp) {
        self.seen.insert(rep, now);
    }

    /// Drop representatives not seen within the online window.
    pub fn purge(&mut self, now: Timestamp) {
        self.seen
            .retain(|_, last| !last.has_expired(ONLINE_WEIGHT_PERIOD_SECS, now));
    }

    pub fn is_online(&self, rep: &Account) -> bool {
        self.seen.contains_key(rep)
    }

    pub fn online_count(&self) -> usize {
        self.seen.len()
    }

    /// Sum the weight of online reps through the caller's weight lookup.
    pub fn online_weight(&self, weight_of: impl Fn(&Account) -> Amount) -> Amount {
        self.seen
            .keys()
            .fold(Amount::ZERO, |sum, rep| sum.saturating_add(weight_of(rep)))
    }

    pub fn reps(&self) -> impl Iterator<Item = &Account> {
        self.seen.keys()
    }
}

impl Default for OnlineReps {
    fn default() -> Self {
        Self::new()
    }
}

/// Derives the quorum delta from stored online-weight samples.
pub struct OnlineWeightSampler {
    samples: Vec<Amount>,
    minimum: Amount,
    quorum_percent: u8,
    max_samples: usize,
}

impl OnlineWeightSampler {
    pub fn new(minimum: Amount, quorum_percent: u8) -> Self {
        Self {
            samples: Vec::new(),
            minimum,
            quorum_percent,
            // ~2 weeks of 5-minute samples.
            max_samples: 4032,
        }
    }

    /// Seed from the `online_weight` table at startup.
    pub fn set_samples(&mut self, samples: Vec<Amount>) {
        self.samples = samples;
        self.samples.truncate(self.max_samples);
    }

    /// Record a fresh sample. Returns true when the oldest sample should be
    /// trimmed from the store.
    pub fn add_sample(&mut self, sample: Amount) -> bool {
        self.samples.push(sample);
        if self.samples.len() > self.max_samples {
            self.samples.remove(0);
            return true;
        }
        false
    }

    /// Median of the stored samples, floored at the minimum.
    pub fn trended(&self) -> Amount {
        if self.samples.is_empty() {
            return self.minimum;
        }
        let mut sorted = self.samples.clone();
        sorted.sort();
        sorted[sorted.len() / 2].max(self.minimum)
    }

    /// The quorum delta: `max(online, trended) * quorum%`.
    pub fn delta(&self, online: Amount) -> Amount {
        let stake = online.max(self.trended());
        Amount::new(stake.raw() / 100 * self.quorum_percent as u128)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rep(byte: u8) -> Account {
        Account::new([byte; 32])
    }

    fn ts(secs: u64) -> Timestamp {
        Timestamp::new(secs)
    }

    #[test]
    fn observe_and_purge() {
        let mut online = OnlineReps::new();
        online.observe(rep(1), ts(100));
        online.observe(rep(2), ts(300));
        assert_eq!(online.online_count(), 2);

        online.purge(ts(100 + ONLINE_WEIGHT_PERIOD_SECS));
        assert!(!online.is_online(&rep(1)));
        assert!(online.is_online(&rep(2)));
    }

    #[test]
    fn online_weight_sums_lookups() {
        let mut online = OnlineReps::new();
        online.observe(rep(1), ts(100));
        online.observe(rep(2), ts(100));
        let weight = online.online_weight(|r| {
            if *r == rep(1) {
                Amount::new(100)
            } else {
                Amount::new(50)
            }
        });
        assert_eq!(weight, Amount::new(150));
    }

    #[test]
    fn trended_is_median_with_floor() {
        let mut sampler = OnlineWeightSampler::new(Amount::new(10), 67);
        assert_eq!(sampler.trended(), Amount::new(10));

        sampler.set_samples(vec![Amount::new(5), Amount::new(30), Amount::new(100)]);
        assert_eq!(sampler.trended(), Amount::new(30));

        sampler.set_samples(vec![Amount::new(1), Amount::new(2), Amount::new(3)]);
        assert_eq!(sampler.trended(), Amount::new(10)); // floored
    }

    #[test]
    fn delta_uses_the_larger_of_online_and_trended() {
        let mut sampler = OnlineWeightSampler::new(Amount::ZERO, 67);
        sampler.set_samples(vec![Amount::new(1000)]);
        // Online below trend: trend rules.
        assert_eq!(sampler.delta(Amount::new(100)), Amount::new(670));
        // Online above trend: online rules.
        assert_eq!(sampler.delta(Amount::new(2000)), Amount::new(1340));
    }

    #[test]
    fn sample_window_is_bounded() {
        let mut sampler = OnlineWeightSampler::new(Amount::ZERO, 67);
        for i in 0..4032 {
            assert!(!sampler.add_sample(Amount::new(i)));
        }
        assert!(sampler.add_sample(Amount::new(99999)));
    }
}
