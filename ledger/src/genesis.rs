//! Per-network genesis blocks.

use crate::block::{Block, OpenBlock};
use cobalt_crypto::{keypair_from_private, sign_message};
use cobalt_types::network::{
    DEV_GENESIS_KEY, LIVE_GENESIS_SIGNATURE, LIVE_GENESIS_WORK,
};
use cobalt_types::{Account, NetworkId, NetworkProfile, PrivateKey, Signature};
use cobalt_work::{generate_blocking, threshold, WorkSubtype};
use cobalt_types::Epoch;

/// The genesis open block for a profile, plus the resolved genesis account.
pub struct Genesis {
    pub account: Account,
    pub block: Block,
}

/// Build the genesis block.
///
/// The live genesis is a fixed published constant. Dev and test networks
/// derive theirs from the published dev key at startup: the block is signed
/// and its work ground out on the spot, which keeps the low-value networks
/// mintable by every node while staying deterministic.
pub fn genesis_for(profile: &NetworkProfile) -> Genesis {
    match profile.id {
        NetworkId::Live => {
            let account = profile.genesis_account;
            let block = Block::Open(OpenBlock {
                source: cobalt_types::BlockHash::new(*account.as_bytes()),
                representative: account,
                account,
                signature: Signature(LIVE_GENESIS_SIGNATURE),
                work: LIVE_GENESIS_WORK,
            });
            Genesis { account, block }
        }
        NetworkId::Test | NetworkId::Dev => {
            let keys = keypair_from_private(PrivateKey(DEV_GENESIS_KEY));
            let account = Account::from(keys.public);
            let mut block = Block::Open(OpenBlock {
                source: cobalt_types::BlockHash::new(*account.as_bytes()),
                representative: account,
                account,
                signature: Signature::ZERO,
                work: 0,
            });
            block.set_signature(sign_message(block.hash().as_bytes(), &keys.private));
            let required = threshold(&profile.work, Epoch::Epoch0, WorkSubtype::Receive);
            block.set_work(generate_blocking(&block.root(), required));
            Genesis { account, block }
        }
    }
}
