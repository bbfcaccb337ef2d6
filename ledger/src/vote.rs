//! Representative votes.

use cobalt_crypto::{blake2b_256_multi, sign_message, verify_signature};
use cobalt_types::{Account, BlockHash, KeyPair, Signature};

/// Votes carry between 1 and 12 hashes.
pub const MAX_VOTE_HASHES: usize = 12;

/// A vote with this sequence is final: the account's weight is pinned to its
/// target and no later vote from the account is accepted on the same roots.
pub const FINAL_VOTE_SEQUENCE: u64 = u64::MAX;

/// A representative's signed statement about up to 12 block hashes.
///
/// A vote with a higher `sequence` from the same account supersedes prior
/// votes; equal or lower sequences are replays.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vote {
    pub account: Account,
    pub sequence: u64,
    pub signature: Signature,
    pub hashes: Vec<BlockHash>,
}

impl Vote {
    /// Build and sign a vote. Hashes beyond [`MAX_VOTE_HASHES`] are
    /// truncated.
    pub fn new(keys: &KeyPair, sequence: u64, mut hashes: Vec<BlockHash>) -> Self {
        hashes.truncate(MAX_VOTE_HASHES);
        let mut vote = Self {
            account: Account::from(keys.public),
            sequence,
            signature: Signature::ZERO,
            hashes,
        };
        vote.signature = sign_message(vote.digest().as_bytes(), &keys.private);
        vote
    }

    /// The signable digest: `"vote "` preamble, each hash, then the
    /// little-endian sequence.
    pub fn digest(&self) -> BlockHash {
        let mut parts: Vec<&[u8]> = Vec::with_capacity(self.hashes.len() + 2);
        parts.push(b"vote ");
        for hash in &self.hashes {
            parts.push(hash.as_bytes());
        }
        let sequence = self.sequence.to_le_bytes();
        parts.push(&sequence);
        BlockHash::new(blake2b_256_multi(&parts))
    }

    /// Signature and shape check. An empty or oversized hash list is
    /// malformed regardless of signature.
    pub fn validate(&self) -> bool {
        if self.hashes.is_empty() || self.hashes.len() > MAX_VOTE_HASHES {
            return false;
        }
        verify_signature(
            self.digest().as_bytes(),
            &self.signature,
            &self.account.public_key(),
        )
    }

    pub fn is_final(&self) -> bool {
        self.sequence == FINAL_VOTE_SEQUENCE
    }
}
