//! Account identifier — a 256-bit Ed25519 public key.

use crate::keys::PublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An account on the lattice. The raw bytes are the account's Ed25519 public
/// key; the human-readable address form lives in `cobalt_crypto::address`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Account([u8; 32]);

impl Account {
    /// The burn account: no private key for it is known to exist.
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0)
    }

    /// Parse from 64 hex characters (either case).
    pub fn decode_hex(s: &str) -> Option<Self> {
        crate::hash::parse_hex_32(s).map(Self)
    }
}

impl From<PublicKey> for Account {
    fn from(key: PublicKey) -> Self {
        Self(key.0)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Account(")?;
        for b in &self.0[..4] {
            write!(f, "{:02X}", b)?;
        }
        write!(f, "\u{2026})")
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burn_account_is_zero() {
        assert!(Account::ZERO.is_zero());
    }

    #[test]
    fn public_key_round_trip() {
        let account = Account::new([5u8; 32]);
        assert_eq!(Account::from(account.public_key()), account);
    }

    #[test]
    fn decode_hex_round_trip() {
        let account = Account::new([0x42; 32]);
        assert_eq!(Account::decode_hex(&account.to_string()), Some(account));
    }
}
