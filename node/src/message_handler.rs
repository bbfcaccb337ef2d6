//! Inbound message routing.
//!
//! The network layer hands raw frames here. The handler parses them,
//! refreshes peer bookkeeping, drops gossip duplicates, and classifies the
//! rest for the owning subsystems: publishes go to the block processor,
//! confirm_acks to the vote path, confirm_reqs to the request aggregator.
//! Nothing here touches ledger state — routing only.

use cobalt_ledger::{Block, Vote};
use cobalt_messages::{Message, NodeIdHandshake, TelemetryData, WireEndpoint};
use cobalt_network::{MessageDedup, PeerContainer};
use cobalt_protocol::{deserialize_message, ProtocolError};
use cobalt_types::{BlockHash, NetworkProfile, Root, Timestamp};
use cobalt_utils::StatsCounter;
use std::net::SocketAddr;

/// Where a parsed message should go next.
#[derive(Clone, Debug, PartialEq)]
pub enum Routed {
    /// To the block processor.
    Block(Block),
    /// To vote processing: active elections, vote cache, rep crawler.
    Vote(Vote),
    /// To the request aggregator.
    ConfirmReq(Vec<(BlockHash, Root)>),
    /// To the handshake logic.
    Handshake(NodeIdHandshake),
    /// Answer with our own telemetry.
    TelemetryReq,
    /// To the telemetry tracker.
    Telemetry(TelemetryData),
    /// Bootstrap traffic, outside the core pipeline.
    Bootstrap,
}

const STAT_NAMES: &[&str] = &["duplicate_dropped", "malformed_dropped", "keepalive_peers"];

pub struct MessageHandler {
    profile: NetworkProfile,
    dedup: MessageDedup,
    pub stats: StatsCounter,
}

impl MessageHandler {
    pub fn new(profile: NetworkProfile) -> Self {
        Self {
            profile,
            dedup: MessageDedup::default(),
            stats: StatsCounter::new(STAT_NAMES),
        }
    }

    /// Parse and route one frame. `Ok(None)` means the message was fully
    /// consumed here (keepalives, duplicates). Parse errors bubble up so
    /// the channel can be closed.
    pub fn handle(
        &mut self,
        from: SocketAddr,
        bytes: &[u8],
        peers: &mut PeerContainer,
        now: Timestamp,
    ) -> Result<Option<Routed>, ProtocolError> {
        let (header, message) = match deserialize_message(&self.profile, bytes) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.stats.increment("malformed_dropped");
                return Err(err);
            }
        };
        peers.contacted(from, header.version_using, now);

        // Gossip amplification guard: repeats of recently seen publish and
        // confirm_ack payloads stop here.
        if matches!(message, Message::Publish(_) | Message::ConfirmAck(_)) {
            let digest = MessageDedup::digest(bytes);
            if self.dedup.is_duplicate(&digest) {
                self.stats.increment("duplicate_dropped");
                return Ok(None);
            }
        }

        let routed = match message {
            Message::Keepalive(slots) => {
                for endpoint in slots.iter().filter(|s| !s.is_any()) {
                    if peers.insert(endpoint.to_socket_addr(), header.version_using, now) {
                        self.stats.increment("keepalive_peers");
                    }
                }
                return Ok(None);
            }
            Message::Publish(block) => Routed::Block(block),
            Message::ConfirmReq(pairs) => Routed::ConfirmReq(pairs),
            Message::ConfirmAck(vote) => Routed::Vote(vote),
            Message::NodeIdHandshake(handshake) => Routed::Handshake(handshake),
            Message::TelemetryReq => Routed::TelemetryReq,
            Message::TelemetryAck(data) => Routed::Telemetry(data),
            Message::FrontierReq { .. } | Message::BulkPull { .. } | Message::BulkPush => {
                Routed::Bootstrap
            }
        };
        Ok(Some(routed))
    }

    /// Build this node's keepalive payload from the peer table.
    pub fn keepalive_payload(&self, peers: &PeerContainer) -> Vec<WireEndpoint> {
        let mut slots = [WireEndpoint::ANY; cobalt_messages::KEEPALIVE_PEERS];
        peers.random_fill(&mut slots);
        slots.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cobalt_crypto::generate_keypair;
    use cobalt_ledger::{SendBlock, Vote};
    use cobalt_messages::Message;
    use cobalt_protocol::serialize_message;
    use cobalt_types::{Account, Amount, Signature};

    fn profile() -> NetworkProfile {
        NetworkProfile::dev()
    }

    fn handler() -> (MessageHandler, PeerContainer) {
        let mut peers = PeerContainer::new("8.8.8.8:7075".parse().unwrap(), 17);
        peers.set_allow_local_peers(false);
        (MessageHandler::new(profile()), peers)
    }

    fn sender() -> SocketAddr {
        "94.5.5.5:7075".parse().unwrap()
    }

    fn sample_block() -> Block {
        Block::Send(SendBlock {
            previous: BlockHash::new([1u8; 32]),
            destination: Account::new([2u8; 32]),
            balance: Amount::new(3),
            signature: Signature([4u8; 64]),
            work: 5,
        })
    }

    #[test]
    fn publish_routes_to_block_processing() {
        let (mut handler, mut peers) = handler();
        let bytes = serialize_message(&profile(), &Message::Publish(sample_block()));
        let routed = handler
            .handle(sender(), &bytes, &mut peers, Timestamp::new(10))
            .unwrap();
        assert_eq!(routed, Some(Routed::Block(sample_block())));
        // The sender was recorded as contacted.
        assert_eq!(peers.len(), 1);
    }

    #[test]
    fn repeated_publish_is_dropped() {
        let (mut handler, mut peers) = handler();
        let bytes = serialize_message(&profile(), &Message::Publish(sample_block()));
        assert!(handler
            .handle(sender(), &bytes, &mut peers, Timestamp::new(10))
            .unwrap()
            .is_some());
        assert!(handler
            .handle(sender(), &bytes, &mut peers, Timestamp::new(11))
            .unwrap()
            .is_none());
        assert_eq!(handler.stats.get("duplicate_dropped"), 1);
    }

    #[test]
    fn confirm_ack_routes_votes() {
        let (mut handler, mut peers) = handler();
        let keys = generate_keypair();
        let vote = Vote::new(&keys, 3, vec![BlockHash::new([7u8; 32])]);
        let bytes = serialize_message(&profile(), &Message::ConfirmAck(vote.clone()));
        let routed = handler
            .handle(sender(), &bytes, &mut peers, Timestamp::new(10))
            .unwrap();
        assert_eq!(routed, Some(Routed::Vote(vote)));
    }

    #[test]
    fn keepalive_learns_peers_and_filters_reserved() {
        let (mut handler, mut peers) = handler();
        let slots = vec![
            WireEndpoint::from_socket_addr(&"94.1.2.3:7075".parse().unwrap()),
            WireEndpoint::from_socket_addr(&"192.0.2.1:7075".parse().unwrap()),
        ];
        let bytes = serialize_message(&profile(), &Message::Keepalive(slots));
        let routed = handler
            .handle(sender(), &bytes, &mut peers, Timestamp::new(10))
            .unwrap();
        assert!(routed.is_none());
        // The sender plus the one non-reserved advertised peer.
        assert_eq!(peers.len(), 2);
        assert_eq!(handler.stats.get("keepalive_peers"), 1);
    }

    #[test]
    fn malformed_frame_is_an_error() {
        let (mut handler, mut peers) = handler();
        let result = handler.handle(sender(), &[0xFF; 4], &mut peers, Timestamp::new(10));
        assert!(result.is_err());
        assert_eq!(handler.stats.get("malformed_dropped"), 1);
        assert!(peers.is_empty());
    }

    #[test]
    fn confirm_req_routes_to_aggregator() {
        let (mut handler, mut peers) = handler();
        let pairs = vec![(BlockHash::new([1u8; 32]), Root::new([2u8; 32]))];
        let bytes = serialize_message(&profile(), &Message::ConfirmReq(pairs.clone()));
        let routed = handler
            .handle(sender(), &bytes, &mut peers, Timestamp::new(10))
            .unwrap();
        assert_eq!(routed, Some(Routed::ConfirmReq(pairs)));
    }
}
