//! Binary message framing: fixed 8-byte header plus a variant payload, no
//! length prefix. Payload length is implied by the message type and the
//! header extensions (block type, item count, handshake flags).

use cobalt_ledger::{Block, Vote, MAX_VOTE_HASHES};
use cobalt_messages::{
    Message, MessageHeader, MessageType, NodeIdHandshake, TelemetryData, WireEndpoint,
    HEADER_LEN, KEEPALIVE_PEERS,
};
use cobalt_types::{Account, BlockHash, NetworkProfile, PublicKey, Root, Signature};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("bad magic or network byte")]
    WrongNetwork,
    #[error("peer version below minimum")]
    VersionTooLow,
    #[error("unknown or malformed header")]
    BadHeader,
    #[error("truncated payload: expected {expected}, got {got}")]
    Truncated { expected: usize, got: usize },
    #[error("malformed payload: {0}")]
    Malformed(String),
}

fn header_for(profile: &NetworkProfile, message: &Message) -> MessageHeader {
    let mut header = MessageHeader::new(
        profile.magic,
        profile.network_byte,
        profile.protocol_version_max,
        profile.protocol_version_using,
        profile.protocol_version_min,
        message.message_type(),
    );
    match message {
        Message::Publish(block) => header.set_block_type(block.block_type()),
        Message::ConfirmReq(pairs) => header.set_count(pairs.len()),
        Message::ConfirmAck(vote) => header.set_count(vote.hashes.len()),
        Message::NodeIdHandshake(handshake) => {
            header.set_handshake_query(handshake.query.is_some());
            header.set_handshake_response(handshake.response.is_some());
        }
        _ => {}
    }
    header
}

/// Frame a message for the wire.
pub fn serialize_message(profile: &NetworkProfile, message: &Message) -> Vec<u8> {
    let header = header_for(profile, message);
    let mut out = Vec::with_capacity(HEADER_LEN + 256);
    out.extend_from_slice(&header.to_bytes());
    match message {
        Message::Keepalive(peers) => {
            for slot in 0..KEEPALIVE_PEERS {
                let endpoint = peers.get(slot).copied().unwrap_or(WireEndpoint::ANY);
                out.extend_from_slice(&endpoint.ip);
                out.extend_from_slice(&endpoint.port.to_be_bytes());
            }
        }
        Message::Publish(block) => block.serialize_payload(&mut out),
        Message::ConfirmReq(pairs) => {
            for (hash, root) in pairs {
                out.extend_from_slice(hash.as_bytes());
                out.extend_from_slice(root.as_bytes());
            }
        }
        Message::ConfirmAck(vote) => {
            out.extend_from_slice(vote.account.as_bytes());
            out.extend_from_slice(vote.signature.as_bytes());
            out.extend_from_slice(&vote.sequence.to_be_bytes());
            for hash in &vote.hashes {
                out.extend_from_slice(hash.as_bytes());
            }
        }
        Message::NodeIdHandshake(handshake) => {
            if let Some(cookie) = &handshake.query {
                out.extend_from_slice(cookie);
            }
            if let Some((node_id, signature)) = &handshake.response {
                out.extend_from_slice(node_id.as_bytes());
                out.extend_from_slice(signature.as_bytes());
            }
        }
        Message::TelemetryReq | Message::BulkPush => {}
        Message::TelemetryAck(data) => {
            out.extend_from_slice(data.node_id.as_bytes());
            out.extend_from_slice(data.signature.as_bytes());
            out.extend_from_slice(&data.block_count.to_be_bytes());
            out.extend_from_slice(&data.cemented_count.to_be_bytes());
            out.extend_from_slice(&data.unchecked_count.to_be_bytes());
            out.extend_from_slice(&data.account_count.to_be_bytes());
            out.extend_from_slice(&data.peer_count.to_be_bytes());
            out.push(data.protocol_version);
            out.extend_from_slice(&data.uptime_secs.to_be_bytes());
            out.extend_from_slice(data.genesis.as_bytes());
            out.extend_from_slice(&data.timestamp.to_be_bytes());
        }
        Message::FrontierReq { start, count } => {
            out.extend_from_slice(start.as_bytes());
            out.extend_from_slice(&count.to_be_bytes());
        }
        Message::BulkPull { account, end } => {
            out.extend_from_slice(account.as_bytes());
            out.extend_from_slice(end.as_bytes());
        }
    }
    out
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn need(&self, n: usize) -> Result<(), ProtocolError> {
        if self.bytes.len() < self.pos + n {
            return Err(ProtocolError::Truncated {
                expected: self.pos + n,
                got: self.bytes.len(),
            });
        }
        Ok(())
    }

    fn take_32(&mut self) -> Result<[u8; 32], ProtocolError> {
        self.need(32)?;
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.bytes[self.pos..self.pos + 32]);
        self.pos += 32;
        Ok(out)
    }

    fn take_64(&mut self) -> Result<[u8; 64], ProtocolError> {
        self.need(64)?;
        let mut out = [0u8; 64];
        out.copy_from_slice(&self.bytes[self.pos..self.pos + 64]);
        self.pos += 64;
        Ok(out)
    }

    fn take_16b(&mut self) -> Result<[u8; 16], ProtocolError> {
        self.need(16)?;
        let mut out = [0u8; 16];
        out.copy_from_slice(&self.bytes[self.pos..self.pos + 16]);
        self.pos += 16;
        Ok(out)
    }

    fn take_u64(&mut self) -> Result<u64, ProtocolError> {
        self.need(8)?;
        let mut out = [0u8; 8];
        out.copy_from_slice(&self.bytes[self.pos..self.pos + 8]);
        self.pos += 8;
        Ok(u64::from_be_bytes(out))
    }

    fn take_u32(&mut self) -> Result<u32, ProtocolError> {
        self.need(4)?;
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.bytes[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(u32::from_be_bytes(out))
    }

    fn take_u16(&mut self) -> Result<u16, ProtocolError> {
        self.need(2)?;
        let out = u16::from_be_bytes([self.bytes[self.pos], self.bytes[self.pos + 1]]);
        self.pos += 2;
        Ok(out)
    }

    fn take_u8(&mut self) -> Result<u8, ProtocolError> {
        self.need(1)?;
        let out = self.bytes[self.pos];
        self.pos += 1;
        Ok(out)
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }
}

/// Parse one framed message. Rejects foreign networks and peers below the
/// protocol floor before touching the payload.
pub fn deserialize_message(
    profile: &NetworkProfile,
    bytes: &[u8],
) -> Result<(MessageHeader, Message), ProtocolError> {
    if bytes.len() < HEADER_LEN {
        return Err(ProtocolError::Truncated {
            expected: HEADER_LEN,
            got: bytes.len(),
        });
    }
    let mut header_bytes = [0u8; HEADER_LEN];
    header_bytes.copy_from_slice(&bytes[..HEADER_LEN]);
    let header = MessageHeader::from_bytes(&header_bytes).ok_or(ProtocolError::BadHeader)?;
    if header.magic != profile.magic || header.network != profile.network_byte {
        return Err(ProtocolError::WrongNetwork);
    }
    if header.version_using < profile.protocol_version_min {
        return Err(ProtocolError::VersionTooLow);
    }

    let mut reader = Reader {
        bytes,
        pos: HEADER_LEN,
    };
    let message = match header.message_type {
        MessageType::Keepalive => {
            let mut peers = Vec::with_capacity(KEEPALIVE_PEERS);
            for _ in 0..KEEPALIVE_PEERS {
                let ip = reader.take_16b()?;
                let port = reader.take_u16()?;
                peers.push(WireEndpoint { ip, port });
            }
            Message::Keepalive(peers)
        }
        MessageType::Publish => {
            let block_type = header
                .block_type()
                .ok_or_else(|| ProtocolError::Malformed("publish without block type".into()))?;
            let block = Block::deserialize_payload(block_type, reader.rest())
                .map_err(|e| ProtocolError::Malformed(e.to_string()))?;
            Message::Publish(block)
        }
        MessageType::ConfirmReq => {
            let count = header.count();
            if count == 0 {
                return Err(ProtocolError::Malformed("confirm_req with zero items".into()));
            }
            let mut pairs = Vec::with_capacity(count);
            for _ in 0..count {
                let hash = BlockHash::new(reader.take_32()?);
                let root = Root::new(reader.take_32()?);
                pairs.push((hash, root));
            }
            Message::ConfirmReq(pairs)
        }
        MessageType::ConfirmAck => {
            let count = header.count();
            if count == 0 || count > MAX_VOTE_HASHES {
                return Err(ProtocolError::Malformed("bad confirm_ack count".into()));
            }
            let account = Account::new(reader.take_32()?);
            let signature = Signature(reader.take_64()?);
            let sequence = reader.take_u64()?;
            let mut hashes = Vec::with_capacity(count);
            for _ in 0..count {
                hashes.push(BlockHash::new(reader.take_32()?));
            }
            Message::ConfirmAck(Vote {
                account,
                sequence,
                signature,
                hashes,
            })
        }
        MessageType::NodeIdHandshake => {
            let query = header
                .handshake_query()
                .then(|| reader.take_32())
                .transpose()?;
            let response = if header.handshake_response() {
                let node_id = PublicKey(reader.take_32()?);
                let signature = Signature(reader.take_64()?);
                Some((node_id, signature))
            } else {
                None
            };
            if query.is_none() && response.is_none() {
                return Err(ProtocolError::Malformed("empty handshake".into()));
            }
            Message::NodeIdHandshake(NodeIdHandshake { query, response })
        }
        MessageType::TelemetryReq => Message::TelemetryReq,
        MessageType::TelemetryAck => {
            let node_id = PublicKey(reader.take_32()?);
            let signature = Signature(reader.take_64()?);
            Message::TelemetryAck(TelemetryData {
                node_id,
                signature,
                block_count: reader.take_u64()?,
                cemented_count: reader.take_u64()?,
                unchecked_count: reader.take_u64()?,
                account_count: reader.take_u64()?,
                peer_count: reader.take_u32()?,
                protocol_version: reader.take_u8()?,
                uptime_secs: reader.take_u64()?,
                genesis: BlockHash::new(reader.take_32()?),
                timestamp: reader.take_u64()?,
            })
        }
        MessageType::FrontierReq => Message::FrontierReq {
            start: Account::new(reader.take_32()?),
            count: reader.take_u32()?,
        },
        MessageType::BulkPull => Message::BulkPull {
            account: Account::new(reader.take_32()?),
            end: BlockHash::new(reader.take_32()?),
        },
        MessageType::BulkPush => Message::BulkPush,
    };
    Ok((header, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cobalt_crypto::generate_keypair;
    use cobalt_ledger::{SendBlock, StateBlock};
    use cobalt_types::{Amount, Link};

    fn profile() -> NetworkProfile {
        NetworkProfile::dev()
    }

    fn round_trip(message: Message) -> Message {
        let bytes = serialize_message(&profile(), &message);
        let (_, decoded) = deserialize_message(&profile(), &bytes).unwrap();
        decoded
    }

    #[test]
    fn keepalive_round_trip_pads_to_eight() {
        let peers = vec![
            WireEndpoint::from_socket_addr(&"1.2.3.4:7075".parse().unwrap()),
            WireEndpoint::from_socket_addr(&"[::1]:7075".parse().unwrap()),
        ];
        let decoded = round_trip(Message::Keepalive(peers.clone()));
        let Message::Keepalive(slots) = decoded else {
            panic!("wrong variant");
        };
        assert_eq!(slots.len(), KEEPALIVE_PEERS);
        assert_eq!(&slots[..2], &peers[..]);
        assert!(slots[2..].iter().all(WireEndpoint::is_any));
    }

    #[test]
    fn publish_round_trip_state_block() {
        let block = Block::State(StateBlock {
            account: Account::new([1u8; 32]),
            previous: BlockHash::new([2u8; 32]),
            representative: Account::new([3u8; 32]),
            balance: Amount::new(77),
            link: Link::new([4u8; 32]),
            signature: Signature([5u8; 64]),
            work: 6,
        });
        assert_eq!(round_trip(Message::Publish(block.clone())), Message::Publish(block));
    }

    #[test]
    fn publish_round_trip_legacy_block() {
        let block = Block::Send(SendBlock {
            previous: BlockHash::new([1u8; 32]),
            destination: Account::new([2u8; 32]),
            balance: Amount::new(3),
            signature: Signature([4u8; 64]),
            work: 5,
        });
        assert_eq!(round_trip(Message::Publish(block.clone())), Message::Publish(block));
    }

    #[test]
    fn confirm_req_round_trip() {
        let pairs = vec![
            (BlockHash::new([1u8; 32]), Root::new([2u8; 32])),
            (BlockHash::new([3u8; 32]), Root::new([4u8; 32])),
        ];
        assert_eq!(
            round_trip(Message::ConfirmReq(pairs.clone())),
            Message::ConfirmReq(pairs)
        );
    }

    #[test]
    fn confirm_ack_round_trip_preserves_signature_validity() {
        let keys = generate_keypair();
        let vote = Vote::new(&keys, 9, vec![BlockHash::new([7u8; 32])]);
        let decoded = round_trip(Message::ConfirmAck(vote.clone()));
        let Message::ConfirmAck(decoded_vote) = decoded else {
            panic!("wrong variant");
        };
        assert_eq!(decoded_vote, vote);
        assert!(decoded_vote.validate());
    }

    #[test]
    fn handshake_round_trip_both_directions() {
        let keys = generate_keypair();
        let cookie = [0xAB; 32];
        let signature = cobalt_crypto::sign_message(&cookie, &keys.private);
        let handshake = NodeIdHandshake {
            query: Some([0xCD; 32]),
            response: Some((keys.public, signature)),
        };
        assert_eq!(
            round_trip(Message::NodeIdHandshake(handshake.clone())),
            Message::NodeIdHandshake(handshake)
        );
    }

    #[test]
    fn telemetry_round_trip() {
        let data = TelemetryData {
            node_id: PublicKey([1u8; 32]),
            signature: Signature([2u8; 64]),
            block_count: 100,
            cemented_count: 90,
            unchecked_count: 5,
            account_count: 10,
            peer_count: 7,
            protocol_version: 18,
            uptime_secs: 3600,
            genesis: BlockHash::new([9u8; 32]),
            timestamp: 1_600_000_000,
        };
        assert_eq!(
            round_trip(Message::TelemetryAck(data.clone())),
            Message::TelemetryAck(data)
        );
        assert_eq!(round_trip(Message::TelemetryReq), Message::TelemetryReq);
    }

    #[test]
    fn wrong_network_rejected() {
        let bytes = serialize_message(&NetworkProfile::dev(), &Message::TelemetryReq);
        let result = deserialize_message(&NetworkProfile::live(), &bytes);
        assert!(matches!(result, Err(ProtocolError::WrongNetwork)));
    }

    #[test]
    fn version_below_floor_rejected() {
        let mut bytes = serialize_message(&profile(), &Message::TelemetryReq);
        bytes[3] = profile().protocol_version_min - 1; // version_using
        let result = deserialize_message(&profile(), &bytes);
        assert!(matches!(result, Err(ProtocolError::VersionTooLow)));
    }

    #[test]
    fn truncated_payload_rejected() {
        let pairs = vec![(BlockHash::new([1u8; 32]), Root::new([2u8; 32]))];
        let bytes = serialize_message(&profile(), &Message::ConfirmReq(pairs));
        let result = deserialize_message(&profile(), &bytes[..bytes.len() - 4]);
        assert!(matches!(result, Err(ProtocolError::Truncated { .. })));
    }
}
