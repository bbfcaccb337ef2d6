//! Balance amounts.
//!
//! Amounts are 128-bit unsigned raw units. The genesis supply is the full
//! u128 range, so every arithmetic step uses checked or saturating forms.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// A 128-bit raw amount.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Self = Self(0);
    /// The entire supply, assigned to the genesis account at height 1.
    pub const MAX: Self = Self(u128::MAX);

    pub fn new(raw: u128) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Big-endian 16-byte wire form.
    pub fn to_be_bytes(&self) -> [u8; 16] {
        self.0.to_be_bytes()
    }

    pub fn from_be_bytes(bytes: [u8; 16]) -> Self {
        Self(u128::from_be_bytes(bytes))
    }

    /// Parse the decimal string form used by the JSON block representation.
    pub fn decode_dec(s: &str) -> Option<Self> {
        s.parse::<u128>().ok().map(Self)
    }
}

impl Add for Amount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Amount {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_supply_is_max_u128() {
        assert_eq!(
            Amount::MAX.to_string(),
            "340282366920938463463374607431768211455"
        );
    }

    #[test]
    fn be_bytes_round_trip() {
        let amount = Amount::new(0x0102_0304_0506_0708_090A_0B0C_0D0E_0F10);
        assert_eq!(Amount::from_be_bytes(amount.to_be_bytes()), amount);
        assert_eq!(amount.to_be_bytes()[0], 0x01);
    }

    #[test]
    fn checked_sub_underflow() {
        assert!(Amount::ZERO.checked_sub(Amount::new(1)).is_none());
        assert_eq!(
            Amount::new(5).checked_sub(Amount::new(3)),
            Some(Amount::new(2))
        );
    }

    #[test]
    fn decimal_parse() {
        assert_eq!(Amount::decode_dec("100"), Some(Amount::new(100)));
        assert_eq!(
            Amount::decode_dec("340282366920938463463374607431768211455"),
            Some(Amount::MAX)
        );
        assert!(Amount::decode_dec("not a number").is_none());
        assert!(Amount::decode_dec("340282366920938463463374607431768211456").is_none());
    }
}
