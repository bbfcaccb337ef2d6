//! The peer table.
//!
//! A bounded set of live endpoints with contact times, protocol versions
//! and discovered representative identities. Inserts gate on self-address,
//! reserved/private ranges and the protocol floor; over the cap the
//! least-recently-contacted peer is replaced.

use cobalt_messages::{WireEndpoint, KEEPALIVE_PEERS};
use cobalt_types::{Account, Amount, PublicKey, Timestamp};
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Legacy peer cap.
pub const MAX_PEERS: usize = 500;
/// Re-contact window: a peer inserted or reached-out-to within this window
/// is not contacted again (keepalive storm protection).
pub const REACHOUT_WINDOW_SECS: u64 = 60;
/// Flood fanout ceiling.
const FANOUT_CAP: usize = 32;

#[derive(Clone, Debug)]
pub struct Peer {
    pub endpoint: SocketAddr,
    pub last_contact: Timestamp,
    pub protocol_version: u8,
    pub node_id: Option<PublicKey>,
    /// Representative identity learned from confirm_ack traffic.
    pub rep_account: Option<Account>,
    pub rep_weight: Amount,
}

/// Extract the IPv4 form of an address if it is v4 or v4-mapped.
fn as_ipv4(addr: &SocketAddr) -> Option<Ipv4Addr> {
    match addr.ip() {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(v6) => v6.to_ipv4_mapped(),
    }
}

/// Documentation/reserved ranges that never belong to a real peer:
/// 0.0.0.0/8, 192.0.2.0/24, 198.51.100.0/24, 203.0.113.0/24,
/// 233.252.0.0/24, 240.0.0.0/4 and the broadcast address.
fn is_reserved(addr: &SocketAddr) -> bool {
    let Some(v4) = as_ipv4(addr) else {
        return false;
    };
    let octets = v4.octets();
    octets[0] == 0
        || (octets[0] == 192 && octets[1] == 0 && octets[2] == 2)
        || (octets[0] == 198 && octets[1] == 51 && octets[2] == 100)
        || (octets[0] == 203 && octets[1] == 0 && octets[2] == 113)
        || (octets[0] == 233 && octets[1] == 252 && octets[2] == 0)
        || octets[0] >= 240
}

fn is_private(addr: &SocketAddr) -> bool {
    match addr.ip() {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6
                    .to_ipv4_mapped()
                    .map(|v4| v4.is_private() || v4.is_loopback() || v4.is_link_local())
                    .unwrap_or(false)
        }
    }
}

type DisconnectObserver = Box<dyn Fn() + Send + Sync>;

pub struct PeerContainer {
    peers: HashMap<SocketAddr, Peer>,
    reachouts: HashMap<SocketAddr, Timestamp>,
    self_endpoint: SocketAddr,
    protocol_version_min: u8,
    allow_local_peers: bool,
    max_peers: usize,
    disconnect_observer: Option<DisconnectObserver>,
}

impl PeerContainer {
    pub fn new(self_endpoint: SocketAddr, protocol_version_min: u8) -> Self {
        Self {
            peers: HashMap::new(),
            reachouts: HashMap::new(),
            self_endpoint,
            protocol_version_min,
            allow_local_peers: false,
            max_peers: MAX_PEERS,
            disconnect_observer: None,
        }
    }

    /// Accept loopback/private peers — dev networks and tests.
    pub fn set_allow_local_peers(&mut self, allow: bool) {
        self.allow_local_peers = allow;
    }

    pub fn set_max_peers(&mut self, max: usize) {
        self.max_peers = max;
    }

    /// Called when the container becomes empty after a purge.
    pub fn set_disconnect_observer(&mut self, observer: DisconnectObserver) {
        self.disconnect_observer = Some(observer);
    }

    /// Admit a peer. Self, reserved ranges, private ranges (unless allowed)
    /// and stale protocol versions are refused. Over the cap the
    /// least-recently-contacted peer is replaced. Returns true when the
    /// endpoint was newly inserted.
    pub fn insert(&mut self, endpoint: SocketAddr, version: u8, now: Timestamp) -> bool {
        if endpoint == self.self_endpoint {
            return false;
        }
        if is_reserved(&endpoint) {
            return false;
        }
        if is_private(&endpoint) && !self.allow_local_peers {
            return false;
        }
        if version < self.protocol_version_min {
            return false;
        }
        if let Some(peer) = self.peers.get_mut(&endpoint) {
            peer.last_contact = now;
            peer.protocol_version = version;
            return false;
        }
        if self.peers.len() >= self.max_peers {
            let Some(oldest) = self
                .peers
                .values()
                .min_by_key(|p| p.last_contact)
                .map(|p| p.endpoint)
            else {
                return false;
            };
            self.peers.remove(&oldest);
        }
        self.peers.insert(
            endpoint,
            Peer {
                endpoint,
                last_contact: now,
                protocol_version: version,
                node_id: None,
                rep_account: None,
                rep_weight: Amount::ZERO,
            },
        );
        true
    }

    /// Record inbound traffic: refresh `last_contact`, adopt the version,
    /// de-peer anything that has fallen below the floor.
    pub fn contacted(&mut self, endpoint: SocketAddr, version: u8, now: Timestamp) {
        if version < self.protocol_version_min {
            self.peers.remove(&endpoint);
            return;
        }
        match self.peers.get_mut(&endpoint) {
            Some(peer) => {
                peer.last_contact = now;
                peer.protocol_version = version;
            }
            None => {
                self.insert(endpoint, version, now);
            }
        }
    }

    pub fn set_node_id(&mut self, endpoint: &SocketAddr, node_id: PublicKey) {
        if let Some(peer) = self.peers.get_mut(endpoint) {
            peer.node_id = Some(node_id);
        }
    }

    /// Remove peers whose last contact is before `cutoff`. Reachout records
    /// age out on the same cutoff. Fires the disconnect observer when the
    /// table empties.
    pub fn purge_list(&mut self, cutoff: Timestamp) -> Vec<SocketAddr> {
        let removed: Vec<SocketAddr> = self
            .peers
            .values()
            .filter(|p| p.last_contact < cutoff)
            .map(|p| p.endpoint)
            .collect();
        for endpoint in &removed {
            self.peers.remove(endpoint);
        }
        self.reachouts.retain(|_, at| *at >= cutoff);
        if !removed.is_empty() && self.peers.is_empty() {
            if let Some(observer) = &self.disconnect_observer {
                observer();
            }
        }
        removed
    }

    /// Keepalive-storm guard. Returns true when the endpoint is already
    /// known or was reached out to within the window — i.e. do not contact.
    /// A false return records the reachout.
    pub fn reachout(&mut self, endpoint: SocketAddr, now: Timestamp) -> bool {
        if self.peers.contains_key(&endpoint) {
            return true;
        }
        if let Some(at) = self.reachouts.get(&endpoint) {
            if !at.has_expired(REACHOUT_WINDOW_SECS, now) {
                return true;
            }
        }
        self.reachouts.insert(endpoint, now);
        false
    }

    /// Fill the 8 keepalive slots with random peers, padding with the
    /// any-address sentinel.
    pub fn random_fill(&self, slots: &mut [WireEndpoint; KEEPALIVE_PEERS]) {
        let mut endpoints: Vec<SocketAddr> = self.peers.keys().copied().collect();
        endpoints.shuffle(&mut rand::thread_rng());
        for (i, slot) in slots.iter_mut().enumerate() {
            *slot = match endpoints.get(i) {
                Some(endpoint) => WireEndpoint::from_socket_addr(endpoint),
                None => WireEndpoint::ANY,
            };
        }
    }

    /// ⌈√n⌉ random peers, capped — the flood fanout set.
    pub fn list_fanout(&self) -> Vec<SocketAddr> {
        self.fanout_of(self.peers.keys().copied().collect())
    }

    /// Fanout over peers not known to be representatives.
    pub fn non_rep_fanout(&self) -> Vec<SocketAddr> {
        self.fanout_of(
            self.peers
                .values()
                .filter(|p| p.rep_account.is_none())
                .map(|p| p.endpoint)
                .collect(),
        )
    }

    fn fanout_of(&self, mut endpoints: Vec<SocketAddr>) -> Vec<SocketAddr> {
        let count = ((endpoints.len() as f64).sqrt().ceil() as usize).min(FANOUT_CAP);
        endpoints.shuffle(&mut rand::thread_rng());
        endpoints.truncate(count);
        endpoints
    }

    /// Record that an endpoint answers for a representative.
    pub fn rep_response(&mut self, endpoint: &SocketAddr, rep: Account, weight: Amount) {
        if let Some(peer) = self.peers.get_mut(endpoint) {
            peer.rep_account = Some(rep);
            peer.rep_weight = weight;
        }
    }

    /// Top-n representatives by weight with their endpoints.
    pub fn representatives(&self, n: usize) -> Vec<(Account, Amount, SocketAddr)> {
        let mut reps: Vec<(Account, Amount, SocketAddr)> = self
            .peers
            .values()
            .filter_map(|p| p.rep_account.map(|rep| (rep, p.rep_weight, p.endpoint)))
            .collect();
        reps.sort_by(|a, b| b.1.cmp(&a.1));
        reps.truncate(n);
        reps
    }

    /// Endpoints of representatives at or above `min_weight`.
    pub fn representative_endpoints(&self, min_weight: Amount) -> Vec<SocketAddr> {
        self.peers
            .values()
            .filter(|p| p.rep_account.is_some() && p.rep_weight >= min_weight)
            .map(|p| p.endpoint)
            .collect()
    }

    pub fn get(&self, endpoint: &SocketAddr) -> Option<&Peer> {
        self.peers.get(endpoint)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
