//! The block sum type and its binary and JSON codecs.
//!
//! Six variants: the four legacy single-purpose blocks, the unified `state`
//! block, and the versioned `state2` with explicit height, epoch and
//! interpretation fields. The hash of a block is a Blake2b-256 digest over
//! the variant's hashable prefix — everything up to and excluding the
//! signature — with a 32-byte type preamble domain-separating the two state
//! encodings.

use cobalt_crypto::blake2b_256_multi;
use cobalt_types::{Account, Amount, BlockHash, Epoch, Link, Root, Signature};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlockError {
    #[error("unknown block type {0}")]
    UnknownType(u8),
    #[error("truncated block payload: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },
    #[error("invalid flags field: {0}")]
    InvalidFlags(String),
    #[error("malformed JSON block: {0}")]
    Json(String),
}

/// Wire/storage tag per variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockType {
    Send,
    Receive,
    Open,
    Change,
    State,
    State2,
}

impl BlockType {
    pub const fn as_u8(self) -> u8 {
        match self {
            BlockType::Send => 2,
            BlockType::Receive => 3,
            BlockType::Open => 4,
            BlockType::Change => 5,
            BlockType::State => 6,
            BlockType::State2 => 7,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            2 => Some(BlockType::Send),
            3 => Some(BlockType::Receive),
            4 => Some(BlockType::Open),
            5 => Some(BlockType::Change),
            6 => Some(BlockType::State),
            7 => Some(BlockType::State2),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BlockType::Send => "send",
            BlockType::Receive => "receive",
            BlockType::Open => "open",
            BlockType::Change => "change",
            BlockType::State => "state",
            BlockType::State2 => "state2",
        }
    }

    /// Payload size excluding the type tag.
    pub fn payload_len(self) -> usize {
        match self {
            BlockType::Send => 32 + 32 + 16 + 64 + 8,
            BlockType::Receive => 32 + 32 + 64 + 8,
            BlockType::Open => 32 + 32 + 32 + 64 + 8,
            BlockType::Change => 32 + 32 + 64 + 8,
            BlockType::State => 32 + 32 + 32 + 16 + 32 + 64 + 8,
            BlockType::State2 => 32 + 32 + 32 + 16 + 32 + 8 + 2 + 64 + 8,
        }
    }
}

/// Who signed a `state2` block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SignerKind {
    #[default]
    SelfSigned,
    EpochSigner,
}

/// Declared link interpretation of a `state2` block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LinkInterpretation {
    #[default]
    Noop,
    Send,
    Receive,
}

/// The 2-byte flags field of a `state2` block.
///
/// Bit layout: `[0..1]` signer, `[2..3]` link interpretation, `[4]`
/// is_upgrade, `[5..7]` epoch version. Remaining bits are reserved and must
/// decode as zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct StateFlags {
    pub signer: SignerKind,
    pub link_interpretation: LinkInterpretation,
    pub is_upgrade: bool,
    pub version: Epoch,
}

impl StateFlags {
    pub fn encode(&self) -> u16 {
        let signer = match self.signer {
            SignerKind::SelfSigned => 0u16,
            SignerKind::EpochSigner => 1,
        };
        let link = match self.link_interpretation {
            LinkInterpretation::Noop => 0u16,
            LinkInterpretation::Send => 1,
            LinkInterpretation::Receive => 2,
        };
        signer
            | (link << 2)
            | ((self.is_upgrade as u16) << 4)
            | ((self.version.as_u8() as u16) << 5)
    }

    pub fn decode(raw: u16) -> Result<Self, BlockError> {
        let signer = match raw & 0b11 {
            0 => SignerKind::SelfSigned,
            1 => SignerKind::EpochSigner,
            other => return Err(BlockError::InvalidFlags(format!("signer {other}"))),
        };
        let link_interpretation = match (raw >> 2) & 0b11 {
            0 => LinkInterpretation::Noop,
            1 => LinkInterpretation::Send,
            2 => LinkInterpretation::Receive,
            other => {
                return Err(BlockError::InvalidFlags(format!(
                    "link interpretation {other}"
                )))
            }
        };
        let is_upgrade = (raw >> 4) & 1 == 1;
        let version = Epoch::from_u8(((raw >> 5) & 0b111) as u8)
            .ok_or_else(|| BlockError::InvalidFlags("epoch version".into()))?;
        if raw >> 8 != 0 {
            return Err(BlockError::InvalidFlags("reserved bits set".into()));
        }
        Ok(Self {
            signer,
            link_interpretation,
            is_upgrade,
            version,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendBlock {
    pub previous: BlockHash,
    pub destination: Account,
    pub balance: Amount,
    pub signature: Signature,
    pub work: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiveBlock {
    pub previous: BlockHash,
    pub source: BlockHash,
    pub signature: Signature,
    pub work: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenBlock {
    pub source: BlockHash,
    pub representative: Account,
    pub account: Account,
    pub signature: Signature,
    pub work: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeBlock {
    pub previous: BlockHash,
    pub representative: Account,
    pub signature: Signature,
    pub work: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateBlock {
    pub account: Account,
    pub previous: BlockHash,
    pub representative: Account,
    pub balance: Amount,
    pub link: Link,
    pub signature: Signature,
    pub work: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct State2Block {
    pub account: Account,
    pub previous: BlockHash,
    pub representative: Account,
    pub balance: Amount,
    pub link: Link,
    pub height: u64,
    pub flags: StateFlags,
    pub signature: Signature,
    pub work: u64,
}

/// Domain-separation preamble hashed ahead of `state` fields.
const STATE_PREAMBLE: [u8; 32] = preamble(BlockType::State);
/// Domain-separation preamble hashed ahead of `state2` fields.
const STATE2_PREAMBLE: [u8; 32] = preamble(BlockType::State2);

const fn preamble(block_type: BlockType) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[31] = block_type.as_u8();
    out
}

/// A block on the lattice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Block {
    Send(SendBlock),
    Receive(ReceiveBlock),
    Open(OpenBlock),
    Change(ChangeBlock),
    State(StateBlock),
    State2(State2Block),
}

impl Block {
    pub fn block_type(&self) -> BlockType {
        match self {
            Block::Send(_) => BlockType::Send,
            Block::Receive(_) => BlockType::Receive,
            Block::Open(_) => BlockType::Open,
            Block::Change(_) => BlockType::Change,
            Block::State(_) => BlockType::State,
            Block::State2(_) => BlockType::State2,
        }
    }

    /// Blake2b-256 over the variant's hashable prefix. Numeric scalars are
    /// big-endian; the signature and work never contribute.
    pub fn hash(&self) -> BlockHash {
        let digest = match self {
            Block::Send(b) => blake2b_256_multi(&[
                b.previous.as_bytes(),
                b.destination.as_bytes(),
                &b.balance.to_be_bytes(),
            ]),
            Block::Receive(b) => {
                blake2b_256_multi(&[b.previous.as_bytes(), b.source.as_bytes()])
            }
            Block::Open(b) => blake2b_256_multi(&[
                b.source.as_bytes(),
                b.representative.as_bytes(),
                b.account.as_bytes(),
            ]),
            Block::Change(b) => {
                blake2b_256_multi(&[b.previous.as_bytes(), b.representative.as_bytes()])
            }
            Block::State(b) => blake2b_256_multi(&[
                &STATE_PREAMBLE,
                b.account.as_bytes(),
                b.previous.as_bytes(),
                b.representative.as_bytes(),
                &b.balance.to_be_bytes(),
                b.link.as_bytes(),
            ]),
            Block::State2(b) => blake2b_256_multi(&[
                &STATE2_PREAMBLE,
                b.account.as_bytes(),
                b.previous.as_bytes(),
                b.representative.as_bytes(),
                &b.balance.to_be_bytes(),
                b.link.as_bytes(),
                &b.height.to_be_bytes(),
                &b.flags.encode().to_be_bytes(),
            ]),
        };
        BlockHash::new(digest)
    }

    /// `previous` when non-zero, otherwise the opening account.
    pub fn root(&self) -> Root {
        let previous = self.previous();
        if !previous.is_zero() {
            return Root::from(previous);
        }
        match self {
            Block::Open(b) => Root::from(b.account),
            Block::State(b) => Root::from(b.account),
            Block::State2(b) => Root::from(b.account),
            // Legacy send/receive/change always carry a non-zero previous.
            _ => Root::from(previous),
        }
    }

    pub fn previous(&self) -> BlockHash {
        match self {
            Block::Send(b) => b.previous,
            Block::Receive(b) => b.previous,
            Block::Open(_) => BlockHash::ZERO,
            Block::Change(b) => b.previous,
            Block::State(b) => b.previous,
            Block::State2(b) => b.previous,
        }
    }

    pub fn work(&self) -> u64 {
        match self {
            Block::Send(b) => b.work,
            Block::Receive(b) => b.work,
            Block::Open(b) => b.work,
            Block::Change(b) => b.work,
            Block::State(b) => b.work,
            Block::State2(b) => b.work,
        }
    }

    pub fn set_work(&mut self, work: u64) {
        match self {
            Block::Send(b) => b.work = work,
            Block::Receive(b) => b.work = work,
            Block::Open(b) => b.work = work,
            Block::Change(b) => b.work = work,
            Block::State(b) => b.work = work,
            Block::State2(b) => b.work = work,
        }
    }

    pub fn signature(&self) -> &Signature {
        match self {
            Block::Send(b) => &b.signature,
            Block::Receive(b) => &b.signature,
            Block::Open(b) => &b.signature,
            Block::Change(b) => &b.signature,
            Block::State(b) => &b.signature,
            Block::State2(b) => &b.signature,
        }
    }

    pub fn set_signature(&mut self, signature: Signature) {
        match self {
            Block::Send(b) => b.signature = signature,
            Block::Receive(b) => b.signature = signature,
            Block::Open(b) => b.signature = signature,
            Block::Change(b) => b.signature = signature,
            Block::State(b) => b.signature = signature,
            Block::State2(b) => b.signature = signature,
        }
    }

    /// The signing account, when the variant carries it. Legacy
    /// send/receive/change blocks resolve theirs through the previous block.
    pub fn account_field(&self) -> Option<Account> {
        match self {
            Block::Open(b) => Some(b.account),
            Block::State(b) => Some(b.account),
            Block::State2(b) => Some(b.account),
            _ => None,
        }
    }

    pub fn representative_field(&self) -> Option<Account> {
        match self {
            Block::Open(b) => Some(b.representative),
            Block::Change(b) => Some(b.representative),
            Block::State(b) => Some(b.representative),
            Block::State2(b) => Some(b.representative),
            _ => None,
        }
    }

    pub fn balance_field(&self) -> Option<Amount> {
        match self {
            Block::Send(b) => Some(b.balance),
            Block::State(b) => Some(b.balance),
            Block::State2(b) => Some(b.balance),
            _ => None,
        }
    }

    /// Source hash for legacy receive/open blocks.
    pub fn source_field(&self) -> Option<BlockHash> {
        match self {
            Block::Receive(b) => Some(b.source),
            Block::Open(b) => Some(b.source),
            _ => None,
        }
    }

    pub fn link_field(&self) -> Option<Link> {
        match self {
            Block::State(b) => Some(b.link),
            Block::State2(b) => Some(b.link),
            _ => None,
        }
    }

    pub fn is_legacy(&self) -> bool {
        !matches!(self, Block::State(_) | Block::State2(_))
    }

    // ── binary codec ────────────────────────────────────────────────────

    /// Variant payload without the type tag (the wire form; the type rides
    /// in the message header extensions).
    pub fn serialize_payload(&self, out: &mut Vec<u8>) {
        match self {
            Block::Send(b) => {
                out.extend_from_slice(b.previous.as_bytes());
                out.extend_from_slice(b.destination.as_bytes());
                out.extend_from_slice(&b.balance.to_be_bytes());
                out.extend_from_slice(b.signature.as_bytes());
                out.extend_from_slice(&b.work.to_be_bytes());
            }
            Block::Receive(b) => {
                out.extend_from_slice(b.previous.as_bytes());
                out.extend_from_slice(b.source.as_bytes());
                out.extend_from_slice(b.signature.as_bytes());
                out.extend_from_slice(&b.work.to_be_bytes());
            }
            Block::Open(b) => {
                out.extend_from_slice(b.source.as_bytes());
                out.extend_from_slice(b.representative.as_bytes());
                out.extend_from_slice(b.account.as_bytes());
                out.extend_from_slice(b.signature.as_bytes());
                out.extend_from_slice(&b.work.to_be_bytes());
            }
            Block::Change(b) => {
                out.extend_from_slice(b.previous.as_bytes());
                out.extend_from_slice(b.representative.as_bytes());
                out.extend_from_slice(b.signature.as_bytes());
                out.extend_from_slice(&b.work.to_be_bytes());
            }
            Block::State(b) => {
                out.extend_from_slice(b.account.as_bytes());
                out.extend_from_slice(b.previous.as_bytes());
                out.extend_from_slice(b.representative.as_bytes());
                out.extend_from_slice(&b.balance.to_be_bytes());
                out.extend_from_slice(b.link.as_bytes());
                out.extend_from_slice(b.signature.as_bytes());
                out.extend_from_slice(&b.work.to_be_bytes());
            }
            Block::State2(b) => {
                out.extend_from_slice(b.account.as_bytes());
                out.extend_from_slice(b.previous.as_bytes());
                out.extend_from_slice(b.representative.as_bytes());
                out.extend_from_slice(&b.balance.to_be_bytes());
                out.extend_from_slice(b.link.as_bytes());
                out.extend_from_slice(&b.height.to_be_bytes());
                out.extend_from_slice(&b.flags.encode().to_be_bytes());
                out.extend_from_slice(b.signature.as_bytes());
                out.extend_from_slice(&b.work.to_be_bytes());
            }
        }
    }

    /// Type tag followed by the payload (the storage form).
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.block_type().payload_len());
        out.push(self.block_type().as_u8());
        self.serialize_payload(&mut out);
        out
    }

    pub fn deserialize_payload(block_type: BlockType, bytes: &[u8]) -> Result<Self, BlockError> {
        let expected = block_type.payload_len();
        if bytes.len() < expected {
            return Err(BlockError::Truncated {
                expected,
                got: bytes.len(),
            });
        }
        let mut cursor = Cursor { bytes, pos: 0 };
        let block = match block_type {
            BlockType::Send => Block::Send(SendBlock {
                previous: BlockHash::new(cursor.take_32()),
                destination: Account::new(cursor.take_32()),
                balance: Amount::from_be_bytes(cursor.take_16()),
                signature: Signature(cursor.take_64()),
                work: u64::from_be_bytes(cursor.take_8()),
            }),
            BlockType::Receive => Block::Receive(ReceiveBlock {
                previous: BlockHash::new(cursor.take_32()),
                source: BlockHash::new(cursor.take_32()),
                signature: Signature(cursor.take_64()),
                work: u64::from_be_bytes(cursor.take_8()),
            }),
            BlockType::Open => Block::Open(OpenBlock {
                source: BlockHash::new(cursor.take_32()),
                representative: Account::new(cursor.take_32()),
                account: Account::new(cursor.take_32()),
                signature: Signature(cursor.take_64()),
                work: u64::from_be_bytes(cursor.take_8()),
            }),
            BlockType::Change => Block::Change(ChangeBlock {
                previous: BlockHash::new(cursor.take_32()),
                representative: Account::new(cursor.take_32()),
                signature: Signature(cursor.take_64()),
                work: u64::from_be_bytes(cursor.take_8()),
            }),
            BlockType::State => Block::State(StateBlock {
                account: Account::new(cursor.take_32()),
                previous: BlockHash::new(cursor.take_32()),
                representative: Account::new(cursor.take_32()),
                balance: Amount::from_be_bytes(cursor.take_16()),
                link: Link::new(cursor.take_32()),
                signature: Signature(cursor.take_64()),
                work: u64::from_be_bytes(cursor.take_8()),
            }),
            BlockType::State2 => {
                let account = Account::new(cursor.take_32());
                let previous = BlockHash::new(cursor.take_32());
                let representative = Account::new(cursor.take_32());
                let balance = Amount::from_be_bytes(cursor.take_16());
                let link = Link::new(cursor.take_32());
                let height = u64::from_be_bytes(cursor.take_8());
                let flags = StateFlags::decode(u16::from_be_bytes(cursor.take_2()))?;
                Block::State2(State2Block {
                    account,
                    previous,
                    representative,
                    balance,
                    link,
                    height,
                    flags,
                    signature: Signature(cursor.take_64()),
                    work: u64::from_be_bytes(cursor.take_8()),
                })
            }
        };
        Ok(block)
    }

    /// Inverse of [`Block::serialize`]. Ignores trailing bytes so callers
    /// can parse the block out of a block+sideband record.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, BlockError> {
        let (&tag, rest) = bytes.split_first().ok_or(BlockError::Truncated {
            expected: 1,
            got: 0,
        })?;
        let block_type = BlockType::from_u8(tag).ok_or(BlockError::UnknownType(tag))?;
        Self::deserialize_payload(block_type, rest)
    }

    // ── JSON codec ──────────────────────────────────────────────────────

    pub fn to_json(&self) -> Value {
        let work = format!("{:016x}", self.work());
        let signature = self.signature().to_string();
        match self {
            Block::Send(b) => json!({
                "type": "send",
                "previous": b.previous.to_string(),
                "destination": cobalt_crypto::encode_account(&b.destination),
                "balance": b.balance.to_string(),
                "signature": signature,
                "work": work,
            }),
            Block::Receive(b) => json!({
                "type": "receive",
                "previous": b.previous.to_string(),
                "source": b.source.to_string(),
                "signature": signature,
                "work": work,
            }),
            Block::Open(b) => json!({
                "type": "open",
                "source": b.source.to_string(),
                "representative": cobalt_crypto::encode_account(&b.representative),
                "account": cobalt_crypto::encode_account(&b.account),
                "signature": signature,
                "work": work,
            }),
            Block::Change(b) => json!({
                "type": "change",
                "previous": b.previous.to_string(),
                "representative": cobalt_crypto::encode_account(&b.representative),
                "signature": signature,
                "work": work,
            }),
            Block::State(b) => json!({
                "type": "state",
                "account": cobalt_crypto::encode_account(&b.account),
                "previous": b.previous.to_string(),
                "representative": cobalt_crypto::encode_account(&b.representative),
                "balance": b.balance.to_string(),
                "link": b.link.to_string(),
                "link_as_account": cobalt_crypto::encode_account(&b.link.as_account()),
                "signature": signature,
                "work": work,
            }),
            Block::State2(b) => json!({
                "type": "state2",
                "account": cobalt_crypto::encode_account(&b.account),
                "previous": b.previous.to_string(),
                "representative": cobalt_crypto::encode_account(&b.representative),
                "balance": b.balance.to_string(),
                "link": b.link.to_string(),
                "link_as_account": cobalt_crypto::encode_account(&b.link.as_account()),
                "height": b.height.to_string(),
                "flags": format!("{:04x}", b.flags.encode()),
                "signature": signature,
                "work": work,
            }),
        }
    }

    pub fn from_json(value: &Value) -> Result<Self, BlockError> {
        fn field<'a>(value: &'a Value, name: &str) -> Result<&'a str, BlockError> {
            value
                .get(name)
                .and_then(Value::as_str)
                .ok_or_else(|| BlockError::Json(format!("missing field {name}")))
        }
        let hash_field = |name: &str| -> Result<BlockHash, BlockError> {
            BlockHash::decode_hex(field(value, name)?)
                .ok_or_else(|| BlockError::Json(format!("bad hash in {name}")))
        };
        let account_field = |name: &str| -> Result<Account, BlockError> {
            cobalt_crypto::decode_account(field(value, name)?)
                .ok_or_else(|| BlockError::Json(format!("bad account in {name}")))
        };
        let balance_field = |name: &str| -> Result<Amount, BlockError> {
            Amount::decode_dec(field(value, name)?)
                .ok_or_else(|| BlockError::Json(format!("bad balance in {name}")))
        };
        let signature = Signature::decode_hex(field(value, "signature")?)
            .ok_or_else(|| BlockError::Json("bad signature".into()))?;
        let work = u64::from_str_radix(field(value, "work")?, 16)
            .map_err(|_| BlockError::Json("bad work".into()))?;

        let block = match field(value, "type")? {
            "send" => Block::Send(SendBlock {
                previous: hash_field("previous")?,
                destination: account_field("destination")?,
                balance: balance_field("balance")?,
                signature,
                work,
            }),
            "receive" => Block::Receive(ReceiveBlock {
                previous: hash_field("previous")?,
                source: hash_field("source")?,
                signature,
                work,
            }),
            "open" => Block::Open(OpenBlock {
                source: hash_field("source")?,
                representative: account_field("representative")?,
                account: account_field("account")?,
                signature,
                work,
            }),
            "change" => Block::Change(ChangeBlock {
                previous: hash_field("previous")?,
                representative: account_field("representative")?,
                signature,
                work,
            }),
            "state" => Block::State(StateBlock {
                account: account_field("account")?,
                previous: hash_field("previous")?,
                representative: account_field("representative")?,
                balance: balance_field("balance")?,
                link: Link::new(*hash_field("link")?.as_bytes()),
                signature,
                work,
            }),
            "state2" => {
                let height = field(value, "height")?
                    .parse::<u64>()
                    .map_err(|_| BlockError::Json("bad height".into()))?;
                let flags_raw = u16::from_str_radix(field(value, "flags")?, 16)
                    .map_err(|_| BlockError::Json("bad flags".into()))?;
                Block::State2(State2Block {
                    account: account_field("account")?,
                    previous: hash_field("previous")?,
                    representative: account_field("representative")?,
                    balance: balance_field("balance")?,
                    link: Link::new(*hash_field("link")?.as_bytes()),
                    height,
                    flags: StateFlags::decode(flags_raw)?,
                    signature,
                    work,
                })
            }
            other => return Err(BlockError::Json(format!("unknown type {other}"))),
        };
        Ok(block)
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

macro_rules! take_n {
    ($name:ident, $n:literal) => {
        fn $name(&mut self) -> [u8; $n] {
            let mut out = [0u8; $n];
            out.copy_from_slice(&self.bytes[self.pos..self.pos + $n]);
            self.pos += $n;
            out
        }
    };
}

impl Cursor<'_> {
    take_n!(take_2, 2);
    take_n!(take_8, 8);
    take_n!(take_16, 16);
    take_n!(take_32, 32);
    take_n!(take_64, 64);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_blocks() -> Vec<Block> {
        vec![
            Block::Send(SendBlock {
                previous: BlockHash::new([1u8; 32]),
                destination: Account::new([2u8; 32]),
                balance: Amount::new(12345),
                signature: Signature([3u8; 64]),
                work: 0xDEADBEEF,
            }),
            Block::Receive(ReceiveBlock {
                previous: BlockHash::new([4u8; 32]),
                source: BlockHash::new([5u8; 32]),
                signature: Signature([6u8; 64]),
                work: 7,
            }),
            Block::Open(OpenBlock {
                source: BlockHash::new([8u8; 32]),
                representative: Account::new([9u8; 32]),
                account: Account::new([10u8; 32]),
                signature: Signature([11u8; 64]),
                work: 12,
            }),
            Block::Change(ChangeBlock {
                previous: BlockHash::new([13u8; 32]),
                representative: Account::new([14u8; 32]),
                signature: Signature([15u8; 64]),
                work: 16,
            }),
            Block::State(StateBlock {
                account: Account::new([17u8; 32]),
                previous: BlockHash::new([18u8; 32]),
                representative: Account::new([19u8; 32]),
                balance: Amount::new(u128::MAX - 5),
                link: Link::new([20u8; 32]),
                signature: Signature([21u8; 64]),
                work: 22,
            }),
            Block::State2(State2Block {
                account: Account::new([23u8; 32]),
                previous: BlockHash::ZERO,
                representative: Account::new([24u8; 32]),
                balance: Amount::ZERO,
                link: Link::new(cobalt_types::epoch::EPOCH_2_LINK),
                height: 9,
                flags: StateFlags {
                    signer: SignerKind::EpochSigner,
                    link_interpretation: LinkInterpretation::Noop,
                    is_upgrade: true,
                    version: Epoch::Epoch2,
                },
                signature: Signature([25u8; 64]),
                work: 26,
            }),
        ]
    }

    #[test]
    fn binary_round_trip_all_variants() {
        for block in sample_blocks() {
            let bytes = block.serialize();
            assert_eq!(bytes.len(), 1 + block.block_type().payload_len());
            let decoded = Block::deserialize(&bytes).unwrap();
            assert_eq!(decoded, block);
            assert_eq!(decoded.hash(), block.hash());
        }
    }

    #[test]
    fn json_round_trip_all_variants() {
        for block in sample_blocks() {
            let value = block.to_json();
            let decoded = Block::from_json(&value).unwrap();
            assert_eq!(decoded, block);
            assert_eq!(decoded.hash(), block.hash());
        }
    }

    #[test]
    fn payload_round_trip_without_tag() {
        for block in sample_blocks() {
            let mut payload = Vec::new();
            block.serialize_payload(&mut payload);
            let decoded = Block::deserialize_payload(block.block_type(), &payload).unwrap();
            assert_eq!(decoded, block);
        }
    }

    #[test]
    fn hashable_field_mutation_changes_hash() {
        let mut block = sample_blocks().remove(0);
        let original = block.hash();
        if let Block::Send(ref mut b) = block {
            b.balance = Amount::new(99999);
        }
        assert_ne!(block.hash(), original);
    }

    #[test]
    fn signature_and_work_never_change_hash() {
        for mut block in sample_blocks() {
            let original = block.hash();
            block.set_signature(Signature([0xEE; 64]));
            block.set_work(u64::MAX);
            assert_eq!(block.hash(), original);
        }
    }

    #[test]
    fn state_preamble_separates_state_and_state2() {
        let state = Block::State(StateBlock {
            account: Account::new([1u8; 32]),
            previous: BlockHash::new([2u8; 32]),
            representative: Account::new([3u8; 32]),
            balance: Amount::new(10),
            link: Link::new([4u8; 32]),
            signature: Signature([0u8; 64]),
            work: 0,
        });
        let state2 = Block::State2(State2Block {
            account: Account::new([1u8; 32]),
            previous: BlockHash::new([2u8; 32]),
            representative: Account::new([3u8; 32]),
            balance: Amount::new(10),
            link: Link::new([4u8; 32]),
            height: 0,
            flags: StateFlags::default(),
            signature: Signature([0u8; 64]),
            work: 0,
        });
        assert_ne!(state.hash(), state2.hash());
    }

    #[test]
    fn root_is_previous_or_account() {
        let blocks = sample_blocks();
        // Send has non-zero previous
        assert_eq!(*blocks[0].root().as_bytes(), [1u8; 32]);
        // Open keys on the account
        assert_eq!(*blocks[2].root().as_bytes(), [10u8; 32]);
        // State2 sample has zero previous, keys on account
        assert_eq!(*blocks[5].root().as_bytes(), [23u8; 32]);
    }

    #[test]
    fn flags_round_trip() {
        let flags = StateFlags {
            signer: SignerKind::EpochSigner,
            link_interpretation: LinkInterpretation::Receive,
            is_upgrade: false,
            version: Epoch::Epoch2,
        };
        assert_eq!(StateFlags::decode(flags.encode()).unwrap(), flags);
    }

    #[test]
    fn flags_reject_reserved_bits() {
        assert!(StateFlags::decode(0x0100).is_err());
        assert!(StateFlags::decode(0b11).is_err()); // signer = 3
    }

    #[test]
    fn deserialize_rejects_unknown_type() {
        assert!(matches!(
            Block::deserialize(&[99u8; 300]),
            Err(BlockError::UnknownType(99))
        ));
    }

    #[test]
    fn deserialize_rejects_truncation() {
        let block = sample_blocks().remove(0);
        let bytes = block.serialize();
        assert!(matches!(
            Block::deserialize(&bytes[..bytes.len() - 1]),
            Err(BlockError::Truncated { .. })
        ));
    }
}
