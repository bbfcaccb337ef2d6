//! Wire message model: the fixed 8-byte header and the payload types.
//!
//! Header layout: `magic(1) network(1) version_max(1) version_using(1)
//! version_min(1) type(1) extensions(2, big-endian)`. Extensions carry
//! per-type flags: the block type for `publish`/`confirm_req`, the item
//! count for vectored `confirm_req`/`confirm_ack`, and the query/response
//! flags for the handshake. Messages have no length prefix; length is
//! implied by type and extensions.

use cobalt_ledger::{Block, BlockType, Vote};
use cobalt_types::{BlockHash, PublicKey, Root, Signature};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv6Addr, SocketAddr};

/// The fixed header size.
pub const HEADER_LEN: usize = 8;
/// Keepalive messages always carry exactly eight endpoint slots.
pub const KEEPALIVE_PEERS: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageType {
    Keepalive,
    Publish,
    ConfirmReq,
    ConfirmAck,
    BulkPull,
    BulkPush,
    FrontierReq,
    NodeIdHandshake,
    TelemetryReq,
    TelemetryAck,
}

impl MessageType {
    pub fn as_u8(self) -> u8 {
        match self {
            MessageType::Keepalive => 2,
            MessageType::Publish => 3,
            MessageType::ConfirmReq => 4,
            MessageType::ConfirmAck => 5,
            MessageType::BulkPull => 6,
            MessageType::BulkPush => 7,
            MessageType::FrontierReq => 8,
            MessageType::NodeIdHandshake => 10,
            MessageType::TelemetryReq => 12,
            MessageType::TelemetryAck => 13,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            2 => Some(MessageType::Keepalive),
            3 => Some(MessageType::Publish),
            4 => Some(MessageType::ConfirmReq),
            5 => Some(MessageType::ConfirmAck),
            6 => Some(MessageType::BulkPull),
            7 => Some(MessageType::BulkPush),
            8 => Some(MessageType::FrontierReq),
            10 => Some(MessageType::NodeIdHandshake),
            12 => Some(MessageType::TelemetryReq),
            13 => Some(MessageType::TelemetryAck),
            _ => None,
        }
    }
}

/// The 8-byte wire header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageHeader {
    pub magic: u8,
    pub network: u8,
    pub version_max: u8,
    pub version_using: u8,
    pub version_min: u8,
    pub message_type: MessageType,
    pub extensions: u16,
}

const BLOCK_TYPE_SHIFT: u16 = 8;
const BLOCK_TYPE_MASK: u16 = 0x0F00;
const COUNT_SHIFT: u16 = 12;
const COUNT_MASK: u16 = 0xF000;
const HANDSHAKE_QUERY: u16 = 0x0001;
const HANDSHAKE_RESPONSE: u16 = 0x0002;

impl MessageHeader {
    pub fn new(
        magic: u8,
        network: u8,
        version_max: u8,
        version_using: u8,
        version_min: u8,
        message_type: MessageType,
    ) -> Self {
        Self {
            magic,
            network,
            version_max,
            version_using,
            version_min,
            message_type,
            extensions: 0,
        }
    }

    pub fn block_type(&self) -> Option<BlockType> {
        BlockType::from_u8(((self.extensions & BLOCK_TYPE_MASK) >> BLOCK_TYPE_SHIFT) as u8)
    }

    pub fn set_block_type(&mut self, block_type: BlockType) {
        self.extensions = (self.extensions & !BLOCK_TYPE_MASK)
            | ((block_type.as_u8() as u16) << BLOCK_TYPE_SHIFT);
    }

    /// Item count for vectored confirm_req/confirm_ack (0..=15).
    pub fn count(&self) -> usize {
        ((self.extensions & COUNT_MASK) >> COUNT_SHIFT) as usize
    }

    pub fn set_count(&mut self, count: usize) {
        debug_assert!(count <= 15);
        self.extensions =
            (self.extensions & !COUNT_MASK) | (((count as u16) & 0x0F) << COUNT_SHIFT);
    }

    pub fn handshake_query(&self) -> bool {
        self.extensions & HANDSHAKE_QUERY != 0
    }

    pub fn set_handshake_query(&mut self, value: bool) {
        if value {
            self.extensions |= HANDSHAKE_QUERY;
        } else {
            self.extensions &= !HANDSHAKE_QUERY;
        }
    }

    pub fn handshake_response(&self) -> bool {
        self.extensions & HANDSHAKE_RESPONSE != 0
    }

    pub fn set_handshake_response(&mut self, value: bool) {
        if value {
            self.extensions |= HANDSHAKE_RESPONSE;
        } else {
            self.extensions &= !HANDSHAKE_RESPONSE;
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let ext = self.extensions.to_be_bytes();
        [
            self.magic,
            self.network,
            self.version_max,
            self.version_using,
            self.version_min,
            self.message_type.as_u8(),
            ext[0],
            ext[1],
        ]
    }

    pub fn from_bytes(bytes: &[u8; HEADER_LEN]) -> Option<Self> {
        Some(Self {
            magic: bytes[0],
            network: bytes[1],
            version_max: bytes[2],
            version_using: bytes[3],
            version_min: bytes[4],
            message_type: MessageType::from_u8(bytes[5])?,
            extensions: u16::from_be_bytes([bytes[6], bytes[7]]),
        })
    }
}

/// A peer endpoint as carried in keepalive payloads: 16-byte IPv6 (or
/// v4-mapped) address plus port. The all-zero value is the any-address
/// sentinel used to pad short peer lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WireEndpoint {
    pub ip: [u8; 16],
    pub port: u16,
}

impl WireEndpoint {
    pub const ANY: Self = Self {
        ip: [0u8; 16],
        port: 0,
    };

    pub fn is_any(&self) -> bool {
        *self == Self::ANY
    }

    pub fn from_socket_addr(addr: &SocketAddr) -> Self {
        let ip = match addr.ip() {
            IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
            IpAddr::V6(v6) => v6.octets(),
        };
        Self {
            ip,
            port: addr.port(),
        }
    }

    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V6(Ipv6Addr::from(self.ip)), self.port)
    }
}

/// Signed node telemetry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryData {
    pub node_id: PublicKey,
    pub signature: Signature,
    pub block_count: u64,
    pub cemented_count: u64,
    pub unchecked_count: u64,
    pub account_count: u64,
    pub peer_count: u32,
    pub protocol_version: u8,
    pub uptime_secs: u64,
    pub genesis: BlockHash,
    pub timestamp: u64,
}

impl TelemetryData {
    /// The byte stream covered by the telemetry signature.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 + 8 * 5 + 4 + 1 + 32 + 8);
        out.extend_from_slice(self.node_id.as_bytes());
        out.extend_from_slice(&self.block_count.to_be_bytes());
        out.extend_from_slice(&self.cemented_count.to_be_bytes());
        out.extend_from_slice(&self.unchecked_count.to_be_bytes());
        out.extend_from_slice(&self.account_count.to_be_bytes());
        out.extend_from_slice(&self.peer_count.to_be_bytes());
        out.push(self.protocol_version);
        out.extend_from_slice(&self.uptime_secs.to_be_bytes());
        out.extend_from_slice(self.genesis.as_bytes());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out
    }
}

/// Node-id handshake payload. A fresh channel sends a query cookie; the
/// peer answers with its node id and a signature over the cookie. Both
/// directions may ride in one message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeIdHandshake {
    pub query: Option<[u8; 32]>,
    pub response: Option<(PublicKey, Signature)>,
}

/// All wire messages in the core subset.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Keepalive(Vec<WireEndpoint>),
    Publish(Block),
    ConfirmReq(Vec<(BlockHash, Root)>),
    ConfirmAck(Vote),
    NodeIdHandshake(NodeIdHandshake),
    TelemetryReq,
    TelemetryAck(TelemetryData),
    FrontierReq {
        start: cobalt_types::Account,
        count: u32,
    },
    BulkPull {
        account: cobalt_types::Account,
        end: BlockHash,
    },
    BulkPush,
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Keepalive(_) => MessageType::Keepalive,
            Message::Publish(_) => MessageType::Publish,
            Message::ConfirmReq(_) => MessageType::ConfirmReq,
            Message::ConfirmAck(_) => MessageType::ConfirmAck,
            Message::NodeIdHandshake(_) => MessageType::NodeIdHandshake,
            Message::TelemetryReq => MessageType::TelemetryReq,
            Message::TelemetryAck(_) => MessageType::TelemetryAck,
            Message::FrontierReq { .. } => MessageType::FrontierReq,
            Message::BulkPull { .. } => MessageType::BulkPull,
            Message::BulkPush => MessageType::BulkPush,
        }
    }
}
