//! Per-network constant profiles.
//!
//! Three profiles exist — live, test and dev — each with its own genesis,
//! magic bytes, work thresholds and quorum parameters. Nothing links the
//! profiles; they are independent constant sets.

use crate::epoch::Epochs;
use crate::{Account, Amount};
use serde::{Deserialize, Serialize};

/// Identifies which cobalt network a node participates in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    /// The production network.
    Live,
    /// The public test network.
    Test,
    /// Local development network.
    Dev,
}

impl NetworkId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Test => "test",
            Self::Dev => "dev",
        }
    }
}

/// Per-version, per-subtype work thresholds. Receive-side work is cheaper
/// than send-side work from epoch 2 onward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkThresholds {
    /// Single threshold for all epoch-0/1 blocks.
    pub epoch_1: u64,
    /// Epoch-2 send and change blocks.
    pub epoch_2: u64,
    /// Epoch-2 receive, open and epoch blocks.
    pub epoch_2_receive: u64,
}

impl WorkThresholds {
    pub const fn publish_full() -> Self {
        Self {
            epoch_1: 0xffff_ffc0_0000_0000,
            epoch_2: 0xffff_fff8_0000_0000,
            epoch_2_receive: 0xffff_fe00_0000_0000,
        }
    }

    pub const fn publish_test() -> Self {
        Self {
            epoch_1: 0xffff_f000_0000_0000,
            epoch_2: 0xffff_f000_0000_0000,
            epoch_2_receive: 0xffff_e000_0000_0000,
        }
    }

    pub const fn publish_dev() -> Self {
        Self {
            epoch_1: 0xfe00_0000_0000_0000,
            epoch_2: 0xffc0_0000_0000_0000,
            epoch_2_receive: 0xf000_0000_0000_0000,
        }
    }

    /// The hardest threshold across all subtypes; used as the default for
    /// fanout difficulty comparisons.
    pub fn base(&self) -> u64 {
        self.epoch_1.max(self.epoch_2)
    }
}

/// The published live-network genesis account
/// (`nano_3t6k35gi95xu6tergt6p69ck76ogmitsa8mnijtpxm9fkcm736xtoncuohr3`).
pub const LIVE_GENESIS_ACCOUNT: [u8; 32] = [
    0xE8, 0x92, 0x08, 0xDD, 0x03, 0x8F, 0xBB, 0x26, 0x99, 0x87, 0x68, 0x96, 0x21, 0xD5, 0x22,
    0x92, 0xAE, 0x9C, 0x35, 0x94, 0x1A, 0x74, 0x84, 0x75, 0x6E, 0xCC, 0xED, 0x92, 0xA6, 0x50,
    0x93, 0xBA,
];

/// Work nonce carried by the live genesis open block.
pub const LIVE_GENESIS_WORK: u64 = 0x62f0_5417_dd3f_b691;

/// Signature carried by the live genesis open block.
pub const LIVE_GENESIS_SIGNATURE: [u8; 64] = [
    0x9F, 0x0C, 0x93, 0x3C, 0x8A, 0xDE, 0x00, 0x4D, 0x80, 0x8E, 0xA1, 0x98, 0x5F, 0xA7, 0x46,
    0xA7, 0xE9, 0x5B, 0xA2, 0xA3, 0x8F, 0x86, 0x76, 0x40, 0xF5, 0x3E, 0xC8, 0xF1, 0x80, 0xBD,
    0xFE, 0x9E, 0x2C, 0x12, 0x68, 0xDE, 0xAD, 0x7C, 0x26, 0x64, 0xF3, 0x56, 0xE3, 0x7A, 0xBA,
    0x36, 0x2B, 0xC5, 0x8E, 0x46, 0xDB, 0xA0, 0x3E, 0x52, 0x3A, 0x7B, 0x5A, 0x19, 0xE4, 0xB6,
    0xEB, 0x12, 0xBB, 0x02,
];

/// Hash of the live genesis open block.
pub const LIVE_GENESIS_HASH: &str =
    "991CF190094C00F0B68E2E5F75F6BEE95A2E0BD93CEAA4A6734DB9F19B728948";

/// Private key of the dev/test genesis account. Published on purpose: the
/// dev networks have no value and every node must be able to mint.
pub const DEV_GENESIS_KEY: [u8; 32] = [
    0x34, 0xF0, 0xA3, 0x7A, 0xAD, 0x20, 0xF4, 0xA2, 0x60, 0xF0, 0xA5, 0xB3, 0xCB, 0x3D, 0x7F,
    0xB5, 0x06, 0x73, 0x21, 0x22, 0x63, 0xE5, 0x8A, 0x38, 0x0B, 0xC1, 0x04, 0x74, 0xBB, 0x03,
    0x9C, 0xE4,
];

/// The complete constant set for one network.
#[derive(Clone, Debug)]
pub struct NetworkProfile {
    pub id: NetworkId,
    /// First header byte on every wire message.
    pub magic: u8,
    /// Second header byte, distinguishing the networks.
    pub network_byte: u8,
    pub default_port: u16,
    pub protocol_version_max: u8,
    pub protocol_version_using: u8,
    pub protocol_version_min: u8,
    pub work: WorkThresholds,
    pub genesis_account: Account,
    pub genesis_amount: Amount,
    /// Percentage of online stake required for quorum.
    pub online_weight_quorum: u8,
    /// Floor under the trended online weight.
    pub online_weight_minimum: Amount,
    /// A principal representative holds at least `online / this` weight.
    pub principal_weight_factor: u128,
}

impl NetworkProfile {
    pub fn live() -> Self {
        Self {
            id: NetworkId::Live,
            magic: b'R',
            network_byte: b'C',
            default_port: 7075,
            protocol_version_max: 18,
            protocol_version_using: 18,
            protocol_version_min: 17,
            work: WorkThresholds::publish_full(),
            genesis_account: Account::new(LIVE_GENESIS_ACCOUNT),
            genesis_amount: Amount::MAX,
            online_weight_quorum: 67,
            online_weight_minimum: Amount::new(60_000 * 10u128.pow(30)),
            principal_weight_factor: 1000,
        }
    }

    pub fn test() -> Self {
        Self {
            id: NetworkId::Test,
            magic: b'R',
            network_byte: b'B',
            default_port: 17_075,
            work: WorkThresholds::publish_test(),
            genesis_account: Account::ZERO, // resolved from DEV_GENESIS_KEY at ledger init
            online_weight_minimum: Amount::new(10u128.pow(30)),
            ..Self::live()
        }
    }

    pub fn dev() -> Self {
        Self {
            id: NetworkId::Dev,
            magic: b'R',
            network_byte: b'X',
            default_port: 44_000,
            work: WorkThresholds::publish_dev(),
            genesis_account: Account::ZERO, // resolved from DEV_GENESIS_KEY at ledger init
            online_weight_minimum: Amount::ZERO,
            ..Self::live()
        }
    }

    pub fn for_network(id: NetworkId) -> Self {
        match id {
            NetworkId::Live => Self::live(),
            NetworkId::Test => Self::test(),
            NetworkId::Dev => Self::dev(),
        }
    }

    /// Epoch links and signers. The genesis account signs all epoch
    /// upgrades on every profile.
    pub fn epochs(&self) -> Epochs {
        Epochs::new(self.genesis_account, self.genesis_account)
    }
}
