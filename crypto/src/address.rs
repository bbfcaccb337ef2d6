//! Human-readable account addresses.
//!
//! An address is `nano_` (or the legacy `xrb_`) followed by 60 base32
//! characters: 52 encoding the 256-bit public key behind 4 zero pad bits,
//! then 8 encoding a 40-bit Blake2b checksum of the key, byte-reversed.
//! Alphabet: `13456789abcdefghijkmnopqrstuwxyz` (no 0/2/l/v).

use cobalt_types::Account;

const ALPHABET: &[u8; 32] = b"13456789abcdefghijkmnopqrstuwxyz";

/// Reverse lookup table: ASCII byte → 5-bit value (0xFF = invalid).
const DECODE: [u8; 128] = {
    let mut table = [0xFFu8; 128];
    let mut i = 0;
    while i < 32 {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
};

const PREFIXES: [&str; 2] = ["nano_", "xrb_"];
const ENCODED_LEN: usize = 60;
const KEY_CHARS: usize = 52;

/// Emit `bit_count` bits (starting at the most significant) as base32 chars.
fn encode_bits(out: &mut String, bytes: &[u8], pad_bits: u32) {
    let mut buffer: u64 = 0;
    let mut bits = pad_bits; // leading zero padding
    for &byte in bytes {
        buffer = (buffer << 8) | byte as u64;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((buffer >> bits) & 0x1F) as usize] as char);
        }
    }
}

/// Decode base32 characters into `N` bytes preceded by `pad_bits` zero bits.
/// Returns `None` on invalid characters or non-zero padding.
fn decode_bits<const N: usize>(s: &str, pad_bits: u32) -> Option<[u8; N]> {
    let mut buffer: u64 = 0;
    let mut bits: u32 = 0;
    let mut out = [0u8; N];
    let mut pos = 0;
    let mut pad_remaining = pad_bits;

    for c in s.bytes() {
        if c >= 128 {
            return None;
        }
        let value = DECODE[c as usize];
        if value == 0xFF {
            return None;
        }
        buffer = (buffer << 5) | value as u64;
        bits += 5;
        if pad_remaining > 0 && bits >= pad_remaining {
            // The leading pad bits must decode to zero.
            let pad = (buffer >> (bits - pad_remaining)) & ((1 << pad_remaining) - 1);
            if pad != 0 {
                return None;
            }
            bits -= pad_remaining;
            buffer &= (1u64 << bits).wrapping_sub(1);
            pad_remaining = 0;
        }
        while pad_remaining == 0 && bits >= 8 {
            bits -= 8;
            if pos == N {
                return None;
            }
            out[pos] = (buffer >> bits) as u8;
            pos += 1;
            buffer &= (1u64 << bits).wrapping_sub(1);
        }
    }

    (pos == N && bits == 0).then_some(out)
}

/// Encode an account as a `nano_`-prefixed address.
pub fn encode_account(account: &Account) -> String {
    let mut address = String::with_capacity(5 + ENCODED_LEN);
    address.push_str(PREFIXES[0]);
    encode_bits(&mut address, account.as_bytes(), 4);
    let mut checksum = crate::hash::blake2b_checksum(account.as_bytes());
    checksum.reverse();
    encode_bits(&mut address, &checksum, 0);
    address
}

/// Decode an address into an account.
///
/// Rejects unknown prefixes, wrong lengths, characters outside the alphabet,
/// non-zero pad bits and checksum mismatches.
pub fn decode_account(address: &str) -> Option<Account> {
    let encoded = PREFIXES
        .iter()
        .find_map(|prefix| address.strip_prefix(prefix))?;
    if encoded.len() != ENCODED_LEN {
        return None;
    }

    let key: [u8; 32] = decode_bits(&encoded[..KEY_CHARS], 4)?;
    let checksum: [u8; 5] = decode_bits(&encoded[KEY_CHARS..], 0)?;

    let mut expected = crate::hash::blake2b_checksum(&key);
    expected.reverse();
    (checksum == expected).then(|| Account::new(key))
}
