//! Per-stored-block metadata not covered by the block hash.

use crate::block::{Block, BlockError};
use cobalt_types::{Account, Amount, BlockHash, Epoch, Timestamp};

/// Classification of a stored block, denormalized for fast queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct BlockDetails {
    pub epoch: Epoch,
    pub is_send: bool,
    pub is_receive: bool,
    pub is_epoch: bool,
}

impl BlockDetails {
    fn pack(&self) -> u8 {
        (self.is_send as u8) | ((self.is_receive as u8) << 1) | ((self.is_epoch as u8) << 2)
    }

    fn unpack(epoch: Epoch, bits: u8) -> Self {
        Self {
            epoch,
            is_send: bits & 1 != 0,
            is_receive: bits & 2 != 0,
            is_epoch: bits & 4 != 0,
        }
    }
}

/// Metadata the ledger records alongside every stored block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sideband {
    pub height: u64,
    pub timestamp: Timestamp,
    /// Next block on the chain; zero at the head.
    pub successor: BlockHash,
    /// Chain owner — resolves accounts for legacy blocks.
    pub account: Account,
    /// Balance after this block — resolves balances for legacy blocks.
    pub balance: Amount,
    pub details: BlockDetails,
    /// Epoch of the source send for receives; `Epoch0` otherwise.
    pub source_epoch: Epoch,
}

const SIDEBAND_LEN: usize = 32 + 32 + 16 + 8 + 8 + 1 + 1 + 1;

impl Sideband {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SIDEBAND_LEN);
        out.extend_from_slice(self.successor.as_bytes());
        out.extend_from_slice(self.account.as_bytes());
        out.extend_from_slice(&self.balance.to_be_bytes());
        out.extend_from_slice(&self.height.to_be_bytes());
        out.extend_from_slice(&self.timestamp.as_secs().to_be_bytes());
        out.push(self.details.epoch.as_u8());
        out.push(self.details.pack());
        out.push(self.source_epoch.as_u8());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BlockError> {
        if bytes.len() != SIDEBAND_LEN {
            return Err(BlockError::Truncated {
                expected: SIDEBAND_LEN,
                got: bytes.len(),
            });
        }
        let mut successor = [0u8; 32];
        successor.copy_from_slice(&bytes[..32]);
        let mut account = [0u8; 32];
        account.copy_from_slice(&bytes[32..64]);
        let mut balance = [0u8; 16];
        balance.copy_from_slice(&bytes[64..80]);
        let mut height = [0u8; 8];
        height.copy_from_slice(&bytes[80..88]);
        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&bytes[88..96]);
        let epoch = Epoch::from_u8(bytes[96])
            .ok_or_else(|| BlockError::InvalidFlags("sideband epoch".into()))?;
        let details = BlockDetails::unpack(epoch, bytes[97]);
        let source_epoch = Epoch::from_u8(bytes[98])
            .ok_or_else(|| BlockError::InvalidFlags("sideband source epoch".into()))?;
        Ok(Self {
            height: u64::from_be_bytes(height),
            timestamp: Timestamp::new(u64::from_be_bytes(timestamp)),
            successor: BlockHash::new(successor),
            account: Account::new(account),
            balance: Amount::from_be_bytes(balance),
            details,
            source_epoch,
        })
    }
}

/// A block together with its sideband — the value stored in the `blocks`
/// table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredBlock {
    pub block: Block,
    pub sideband: Sideband,
}

impl StoredBlock {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.block.serialize();
        out.extend_from_slice(&self.sideband.to_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BlockError> {
        let block = Block::deserialize(bytes)?;
        let block_len = 1 + block.block_type().payload_len();
        let sideband = Sideband::from_bytes(&bytes[block_len..])?;
        Ok(Self { block, sideband })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{SendBlock, StateFlags};
    use cobalt_types::{Link, Signature};

    fn sample_sideband() -> Sideband {
        Sideband {
            height: 42,
            timestamp: Timestamp::new(1_600_000_000),
            successor: BlockHash::new([7u8; 32]),
            account: Account::new([8u8; 32]),
            balance: Amount::new(1234),
            details: BlockDetails {
                epoch: Epoch::Epoch2,
                is_send: true,
                is_receive: false,
                is_epoch: false,
            },
            source_epoch: Epoch::Epoch1,
        }
    }

    #[test]
    fn sideband_round_trip() {
        let sideband = sample_sideband();
        assert_eq!(Sideband::from_bytes(&sideband.to_bytes()).unwrap(), sideband);
    }

    #[test]
    fn stored_block_round_trip_legacy() {
        let stored = StoredBlock {
            block: Block::Send(SendBlock {
                previous: BlockHash::new([1u8; 32]),
                destination: Account::new([2u8; 32]),
                balance: Amount::new(5),
                signature: Signature([3u8; 64]),
                work: 4,
            }),
            sideband: sample_sideband(),
        };
        assert_eq!(StoredBlock::from_bytes(&stored.to_bytes()).unwrap(), stored);
    }

    #[test]
    fn stored_block_round_trip_state2() {
        let stored = StoredBlock {
            block: Block::State2(crate::block::State2Block {
                account: Account::new([1u8; 32]),
                previous: BlockHash::new([2u8; 32]),
                representative: Account::new([3u8; 32]),
                balance: Amount::new(6),
                link: Link::new([4u8; 32]),
                height: 2,
                flags: StateFlags::default(),
                signature: Signature([5u8; 64]),
                work: 6,
            }),
            sideband: sample_sideband(),
        };
        assert_eq!(StoredBlock::from_bytes(&stored.to_bytes()).unwrap(), stored);
    }

    #[test]
    fn sideband_rejects_wrong_length() {
        assert!(Sideband::from_bytes(&[0u8; 10]).is_err());
    }
}
