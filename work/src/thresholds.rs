//! Threshold selection per block epoch and subtype.

use crate::value::work_value;
use cobalt_types::{Epoch, Root, WorkThresholds};

/// Which side of a transfer the work protects. Receive-side work is cheaper
/// from epoch 2 onward so wallets can pre-compute receives on weak devices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkSubtype {
    /// Send and change blocks.
    Send,
    /// Receive, open and epoch blocks.
    Receive,
}

/// The threshold a block must clear given its epoch and subtype.
pub fn threshold(thresholds: &WorkThresholds, epoch: Epoch, subtype: WorkSubtype) -> u64 {
    match epoch {
        Epoch::Epoch0 | Epoch::Epoch1 => thresholds.epoch_1,
        Epoch::Epoch2 => match subtype {
            WorkSubtype::Send => thresholds.epoch_2,
            WorkSubtype::Receive => thresholds.epoch_2_receive,
        },
    }
}

/// Whether a nonce clears the threshold for the given epoch and subtype.
pub fn validate_work(
    thresholds: &WorkThresholds,
    epoch: Epoch,
    subtype: WorkSubtype,
    root: &Root,
    work: u64,
) -> bool {
    work_value(root, work) >= threshold(thresholds, epoch, subtype)
}
