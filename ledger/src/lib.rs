//! The cobalt ledger: block model, codecs, genesis and the state-transition
//! function over the store.

pub mod block;
pub mod genesis;
pub mod ledger;
pub mod sideband;
pub mod uniquer;
pub mod vote;

pub use block::{
    Block, BlockError, BlockType, ChangeBlock, LinkInterpretation, OpenBlock, ReceiveBlock,
    SendBlock, SignerKind, State2Block, StateBlock, StateFlags,
};
pub use genesis::genesis_for;
pub use ledger::{Ledger, LedgerConstants, ProcessResult, RollbackError};
pub use sideband::{BlockDetails, Sideband, StoredBlock};
pub use uniquer::BlockUniquer;
pub use vote::{Vote, FINAL_VOTE_SEQUENCE, MAX_VOTE_HASHES};
