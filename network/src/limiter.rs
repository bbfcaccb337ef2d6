//! Outbound bandwidth limiter.
//!
//! Token bucket over bytes with a trended (EMA) rate estimate. Droppable
//! paths consult `should_drop` and skip the send when the bucket is dry;
//! mandatory paths (`no_limiter_drop`) always send and still charge the
//! bucket so the estimate covers all traffic.

use std::time::{Duration, Instant};

/// EMA smoothing for the trended rate.
const RATE_ALPHA: f64 = 0.1;
/// The bucket can pre-charge up to this many seconds of the limit.
const BURST_SECS: f64 = 1.0;
/// Mandatory traffic can drive the bucket this many seconds into debt.
const DEBT_SECS: f64 = 2.0;

pub struct BandwidthLimiter {
    limit_bytes_per_sec: u64,
    tokens: f64,
    last_refill: Instant,
    trended_rate: f64,
    rate_window_bytes: u64,
    rate_window_start: Instant,
}

impl BandwidthLimiter {
    /// `limit = 0` disables limiting entirely.
    pub fn new(limit_bytes_per_sec: u64) -> Self {
        let now = Instant::now();
        Self {
            limit_bytes_per_sec,
            tokens: limit_bytes_per_sec as f64 * BURST_SECS,
            last_refill: now,
            trended_rate: 0.0,
            rate_window_bytes: 0,
            rate_window_start: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.limit_bytes_per_sec as f64)
            .min(self.limit_bytes_per_sec as f64 * BURST_SECS);
        self.last_refill = now;

        // Fold the elapsed window into the trend once per second.
        let window = now.duration_since(self.rate_window_start);
        if window >= Duration::from_secs(1) {
            let observed = self.rate_window_bytes as f64 / window.as_secs_f64();
            self.trended_rate = RATE_ALPHA * observed + (1.0 - RATE_ALPHA) * self.trended_rate;
            self.rate_window_bytes = 0;
            self.rate_window_start = now;
        }
    }

    /// Droppable path: consume tokens or report the message should be
    /// dropped.
    pub fn should_drop(&mut self, size: usize) -> bool {
        if self.limit_bytes_per_sec == 0 {
            return false;
        }
        self.refill(Instant::now());
        if self.tokens < size as f64 {
            return true;
        }
        self.tokens -= size as f64;
        self.rate_window_bytes += size as u64;
        false
    }

    /// Mandatory path: always sends; charges the bucket, possibly into
    /// bounded debt, so droppable traffic backs off afterwards.
    pub fn add(&mut self, size: usize) {
        if self.limit_bytes_per_sec == 0 {
            return;
        }
        self.refill(Instant::now());
        let floor = -(self.limit_bytes_per_sec as f64 * DEBT_SECS);
        self.tokens = (self.tokens - size as f64).max(floor);
        self.rate_window_bytes += size as u64;
    }

    /// The trended outbound rate in bytes per second.
    pub fn trended_rate(&self) -> f64 {
        self.trended_rate
    }

    pub fn limit(&self) -> u64 {
        self.limit_bytes_per_sec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn allows_up_to_burst_then_drops() {
        let mut limiter = BandwidthLimiter::new(1000);
        assert!(!limiter.should_drop(600));
        assert!(!limiter.should_drop(400));
        assert!(limiter.should_drop(100));
    }

    #[test]
    fn refills_over_time() {
        let mut limiter = BandwidthLimiter::new(10_000);
        assert!(!limiter.should_drop(10_000));
        assert!(limiter.should_drop(1000));
        thread::sleep(Duration::from_millis(200));
        assert!(!limiter.should_drop(500));
    }

    #[test]
    fn mandatory_traffic_charges_into_debt() {
        let mut limiter = BandwidthLimiter::new(1000);
        limiter.add(5000);
        // The droppable path is starved until the debt refills.
        assert!(limiter.should_drop(1));
    }

    #[test]
    fn zero_limit_disables() {
        let mut limiter = BandwidthLimiter::new(0);
        assert!(!limiter.should_drop(usize::MAX / 2));
        limiter.add(usize::MAX / 2);
        assert!(!limiter.should_drop(1));
    }

    #[test]
    fn trended_rate_tracks_traffic() {
        let mut limiter = BandwidthLimiter::new(1_000_000);
        for _ in 0..10 {
            let _ = limiter.should_drop(10_000);
        }
        thread::sleep(Duration::from_millis(1100));
        let _ = limiter.should_drop(1);
        assert!(limiter.trended_rate() > 0.0);
    }
}
