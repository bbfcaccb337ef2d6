//! Flood paths.
//!
//! The flooder never touches sockets: it queues `(endpoint, bytes)` onto
//! the outbound channel that the connection layer drains. Four shapes:
//! blocks go to ⌈√n⌉ peers, initial publishes additionally hit every
//! principal representative without limiter drops, votes go to principal
//! reps or to the √n fallback set.

use crate::limiter::BandwidthLimiter;
use crate::peer_container::PeerContainer;
use cobalt_types::Amount;
use std::net::SocketAddr;
use tokio::sync::mpsc;

#[derive(Clone)]
pub struct Flooder {
    outbound: mpsc::Sender<(SocketAddr, Vec<u8>)>,
}

impl Flooder {
    pub fn new(outbound: mpsc::Sender<(SocketAddr, Vec<u8>)>) -> Self {
        Self { outbound }
    }

    /// Publish to ⌈√n⌉ random peers. Droppable.
    pub fn flood_block(
        &self,
        peers: &PeerContainer,
        payload: &[u8],
        limiter: &mut BandwidthLimiter,
    ) -> usize {
        self.send_many(peers.list_fanout(), payload, true, limiter)
    }

    /// First publish of a local block: every principal representative is
    /// hit regardless of the limiter, plus the droppable √n fallback.
    pub fn flood_block_initial(
        &self,
        peers: &PeerContainer,
        principal_weight: Amount,
        payload: &[u8],
        limiter: &mut BandwidthLimiter,
    ) -> usize {
        let reps = peers.representative_endpoints(principal_weight);
        let mut sent = self.send_many(reps, payload, false, limiter);
        sent += self.send_many(peers.non_rep_fanout(), payload, true, limiter);
        sent
    }

    /// Vote to every principal representative. Droppable.
    pub fn flood_vote_pr(
        &self,
        peers: &PeerContainer,
        principal_weight: Amount,
        payload: &[u8],
        limiter: &mut BandwidthLimiter,
    ) -> usize {
        self.send_many(
            peers.representative_endpoints(principal_weight),
            payload,
            true,
            limiter,
        )
    }

    /// Vote to ⌈√n⌉ non-representative peers. Droppable.
    pub fn flood_vote(
        &self,
        peers: &PeerContainer,
        payload: &[u8],
        limiter: &mut BandwidthLimiter,
    ) -> usize {
        self.send_many(peers.non_rep_fanout(), payload, true, limiter)
    }

    fn send_many(
        &self,
        targets: Vec<SocketAddr>,
        payload: &[u8],
        droppable: bool,
        limiter: &mut BandwidthLimiter,
    ) -> usize {
        let mut sent = 0;
        for target in targets {
            if droppable {
                if limiter.should_drop(payload.len()) {
                    tracing::trace!(%target, "flood send dropped by limiter");
                    continue;
                }
            } else {
                limiter.add(payload.len());
            }
            if self.outbound.try_send((target, payload.to_vec())).is_ok() {
                sent += 1;
            }
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cobalt_types::{Account, Timestamp};

    fn setup(peer_count: u8) -> (PeerContainer, Flooder, mpsc::Receiver<(SocketAddr, Vec<u8>)>) {
        let mut peers = PeerContainer::new("8.8.8.8:7075".parse().unwrap(), 17);
        for i in 0..peer_count {
            let addr: SocketAddr = format!("94.0.0.{i}:7075").parse().unwrap();
            assert!(peers.insert(addr, 18, Timestamp::new(10)));
        }
        let (tx, rx) = mpsc::channel(1024);
        (peers, Flooder::new(tx), rx)
    }

    #[test]
    fn flood_block_hits_sqrt_n() {
        let (peers, flooder, mut rx) = setup(100);
        let mut limiter = BandwidthLimiter::new(0);
        let sent = flooder.flood_block(&peers, b"block", &mut limiter);
        assert_eq!(sent, 10);
        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 10);
    }

    #[test]
    fn initial_flood_reaches_reps_despite_limiter() {
        let (mut peers, flooder, mut rx) = setup(16);
        let rep_endpoint: SocketAddr = "94.0.0.3:7075".parse().unwrap();
        peers.rep_response(&rep_endpoint, Account::new([1u8; 32]), Amount::new(1000));

        // A limiter with no tokens left: droppable sends all drop, the rep
        // still receives the publish.
        let mut limiter = BandwidthLimiter::new(1);
        limiter.add(10_000);
        let sent =
            flooder.flood_block_initial(&peers, Amount::new(100), b"block", &mut limiter);
        assert_eq!(sent, 1);
        let (endpoint, _) = rx.try_recv().unwrap();
        assert_eq!(endpoint, rep_endpoint);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn vote_floods_split_by_rep_status() {
        let (mut peers, flooder, mut rx) = setup(9);
        let rep_endpoint: SocketAddr = "94.0.0.2:7075".parse().unwrap();
        peers.rep_response(&rep_endpoint, Account::new([1u8; 32]), Amount::new(1000));

        let mut limiter = BandwidthLimiter::new(0);
        let to_reps = flooder.flood_vote_pr(&peers, Amount::new(1), b"vote", &mut limiter);
        assert_eq!(to_reps, 1);
        let (endpoint, _) = rx.try_recv().unwrap();
        assert_eq!(endpoint, rep_endpoint);

        // Non-rep fanout: 8 non-rep peers → ⌈√8⌉ = 3.
        let to_peers = flooder.flood_vote(&peers, b"vote", &mut limiter);
        assert_eq!(to_peers, 3);
        for _ in 0..to_peers {
            let (endpoint, _) = rx.try_recv().unwrap();
            assert_ne!(endpoint, rep_endpoint);
        }
    }

    #[test]
    fn limiter_drops_droppable_floods() {
        let (peers, flooder, mut rx) = setup(100);
        let mut limiter = BandwidthLimiter::new(1);
        limiter.add(10_000);
        let sent = flooder.flood_block(&peers, b"block", &mut limiter);
        assert_eq!(sent, 0);
        assert!(rx.try_recv().is_err());
    }
}
