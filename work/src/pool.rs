//! Work generation interface.
//!
//! Proof-of-work generation proper (GPU offload, distributed work peers) is a
//! wallet concern. The core only needs an interface it can call and cancel;
//! [`LocalWorkPool`] is the CPU fallback used by tests and the dev network.

use crate::value::work_value;
use cobalt_types::Root;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Mutex;

/// A source of work nonces. `cancel` frees CPU as soon as an election for
/// the root completes.
pub trait WorkGenerator: Send + Sync {
    /// Find a nonce whose value against `root` clears `threshold`.
    /// Returns `None` when cancelled.
    fn generate(&self, root: &Root, threshold: u64) -> Option<u64>;

    /// Abort any in-flight generation for `root`.
    fn cancel(&self, root: &Root);
}

/// Single-threaded CPU work generation with cooperative cancellation.
pub struct LocalWorkPool {
    cancelled: Mutex<HashSet<Root>>,
}

impl LocalWorkPool {
    pub fn new() -> Self {
        Self {
            cancelled: Mutex::new(HashSet::new()),
        }
    }
}

impl Default for LocalWorkPool {
    fn default() -> Self {
        Self::new()
    }
}

const CANCEL_CHECK_INTERVAL: u64 = 4096;

impl WorkGenerator for LocalWorkPool {
    fn generate(&self, root: &Root, threshold: u64) -> Option<u64> {
        self.cancelled.lock().unwrap().remove(root);
        let mut nonce: u64 = rand::thread_rng().gen();
        let mut since_check = 0u64;
        loop {
            if work_value(root, nonce) >= threshold {
                return Some(nonce);
            }
            nonce = nonce.wrapping_add(1);
            since_check += 1;
            if since_check >= CANCEL_CHECK_INTERVAL {
                since_check = 0;
                if self.cancelled.lock().unwrap().remove(root) {
                    return None;
                }
            }
        }
    }

    fn cancel(&self, root: &Root) {
        self.cancelled.lock().unwrap().insert(*root);
    }
}

/// Generate work without a pool — test helper and genesis bootstrap for the
/// dev network, where thresholds are low enough to brute-force inline.
pub fn generate_blocking(root: &Root, threshold: u64) -> u64 {
    let mut nonce: u64 = 0;
    loop {
        if work_value(root, nonce) >= threshold {
            return nonce;
        }
        nonce = nonce.wrapping_add(1);
    }
}
