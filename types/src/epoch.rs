//! Account epochs.
//!
//! An epoch block upgrades an account chain to a newer rule set without
//! moving any balance. Each epoch has a fixed link marker and a designated
//! signer account; both are network constants.

use crate::{Account, Link};
use serde::{Deserialize, Serialize};

/// Protocol epoch of an account chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Epoch {
    /// Pre-upgrade accounts and all legacy blocks.
    #[default]
    Epoch0,
    /// State blocks enabled.
    Epoch1,
    /// Split work thresholds and final votes enabled.
    Epoch2,
}

impl Epoch {
    pub fn as_u8(self) -> u8 {
        match self {
            Epoch::Epoch0 => 0,
            Epoch::Epoch1 => 1,
            Epoch::Epoch2 => 2,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Epoch::Epoch0),
            1 => Some(Epoch::Epoch1),
            2 => Some(Epoch::Epoch2),
            _ => None,
        }
    }

    /// The next epoch an account at this epoch can upgrade to.
    pub fn successor(self) -> Option<Self> {
        match self {
            Epoch::Epoch0 => Some(Epoch::Epoch1),
            Epoch::Epoch1 => Some(Epoch::Epoch2),
            Epoch::Epoch2 => None,
        }
    }
}

/// Link marker for the epoch-1 upgrade: the ASCII text `epoch v1 block`
/// zero-padded to 32 bytes.
pub const EPOCH_1_LINK: [u8; 32] = epoch_link(b"epoch v1 block");
/// Link marker for the epoch-2 upgrade.
pub const EPOCH_2_LINK: [u8; 32] = epoch_link(b"epoch v2 block");

const fn epoch_link(text: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut i = 0;
    while i < text.len() {
        out[i] = text[i];
        i += 1;
    }
    out
}

/// The per-network epoch table: link marker and authorized signer per epoch.
#[derive(Clone, Debug)]
pub struct Epochs {
    epoch_1_signer: Account,
    epoch_2_signer: Account,
}

impl Epochs {
    pub fn new(epoch_1_signer: Account, epoch_2_signer: Account) -> Self {
        Self {
            epoch_1_signer,
            epoch_2_signer,
        }
    }

    /// The epoch an upgrade link marker designates, if it is one.
    pub fn epoch_of_link(&self, link: &Link) -> Option<Epoch> {
        if *link.as_bytes() == EPOCH_1_LINK {
            Some(Epoch::Epoch1)
        } else if *link.as_bytes() == EPOCH_2_LINK {
            Some(Epoch::Epoch2)
        } else {
            None
        }
    }

    /// Whether `link` could be an epoch marker at all. Blocks whose link
    /// matches must be signature-checked against the epoch signer.
    pub fn is_epoch_link(&self, link: &Link) -> bool {
        self.epoch_of_link(link).is_some()
    }

    pub fn link(&self, epoch: Epoch) -> Option<Link> {
        match epoch {
            Epoch::Epoch0 => None,
            Epoch::Epoch1 => Some(Link::new(EPOCH_1_LINK)),
            Epoch::Epoch2 => Some(Link::new(EPOCH_2_LINK)),
        }
    }

    pub fn signer(&self, epoch: Epoch) -> Option<Account> {
        match epoch {
            Epoch::Epoch0 => None,
            Epoch::Epoch1 => Some(self.epoch_1_signer),
            Epoch::Epoch2 => Some(self.epoch_2_signer),
        }
    }
}
