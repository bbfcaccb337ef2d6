//! Node-id handshake: syn cookies and ownership proofs.
//!
//! A new channel is challenged with a random 32-byte cookie. The peer
//! proves its node id by signing the exact cookie it was issued; anything
//! else closes the channel. Cookies are bounded per source IP and globally,
//! and expire with the handshake window.

use cobalt_crypto::{sign_message, verify_signature};
use cobalt_types::{KeyPair, PublicKey, Signature, Timestamp};
use rand::RngCore;
use std::collections::HashMap;
use std::net::SocketAddr;

/// An inbound channel that has not completed the handshake within this
/// window is closed.
pub const HANDSHAKE_TIMEOUT_SECS: u64 = 5;

const MAX_COOKIES: usize = 10_000;
const MAX_COOKIES_PER_IP: usize = 32;

/// Sign a received cookie with the local node-id key.
pub fn prove_ownership(cookie: &[u8; 32], node_keys: &KeyPair) -> (PublicKey, Signature) {
    (node_keys.public, sign_message(cookie, &node_keys.private))
}

/// Outstanding handshake cookies, keyed by remote endpoint.
pub struct SynCookies {
    cookies: HashMap<SocketAddr, ([u8; 32], Timestamp)>,
    per_ip: HashMap<std::net::IpAddr, usize>,
}

impl SynCookies {
    pub fn new() -> Self {
        Self {
            cookies: HashMap::new(),
            per_ip: HashMap::new(),
        }
    }

    /// Issue a cookie for an endpoint, or `None` when the per-IP or global
    /// cap is hit. Re-assigning to the same endpoint reuses the pending
    /// cookie so retransmitted queries stay verifiable.
    pub fn assign(&mut self, endpoint: SocketAddr, now: Timestamp) -> Option<[u8; 32]> {
        if let Some((cookie, _)) = self.cookies.get(&endpoint) {
            return Some(*cookie);
        }
        if self.cookies.len() >= MAX_COOKIES {
            return None;
        }
        let ip_count = self.per_ip.entry(endpoint.ip()).or_insert(0);
        if *ip_count >= MAX_COOKIES_PER_IP {
            return None;
        }
        *ip_count += 1;
        let mut cookie = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut cookie);
        self.cookies.insert(endpoint, (cookie, now));
        Some(cookie)
    }

    /// Verify a handshake response against the cookie issued to the
    /// endpoint. The cookie is consumed on success.
    pub fn validate(
        &mut self,
        endpoint: &SocketAddr,
        node_id: &PublicKey,
        signature: &Signature,
    ) -> bool {
        let Some((cookie, _)) = self.cookies.get(endpoint) else {
            return false;
        };
        if !verify_signature(cookie, signature, node_id) {
            return false;
        }
        self.remove(endpoint);
        true
    }

    /// Drop cookies past the handshake window. The caller closes the
    /// matching channels.
    pub fn purge(&mut self, now: Timestamp) -> Vec<SocketAddr> {
        let expired: Vec<SocketAddr> = self
            .cookies
            .iter()
            .filter(|(_, (_, issued))| issued.has_expired(HANDSHAKE_TIMEOUT_SECS, now))
            .map(|(endpoint, _)| *endpoint)
            .collect();
        for endpoint in &expired {
            self.remove(endpoint);
        }
        expired
    }

    fn remove(&mut self, endpoint: &SocketAddr) {
        if self.cookies.remove(endpoint).is_some() {
            if let Some(count) = self.per_ip.get_mut(&endpoint.ip()) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    self.per_ip.remove(&endpoint.ip());
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

impl Default for SynCookies {
    fn default() -> Self {
        Self::new()
    }
}
