//! Ed25519 key generation and derivation.

use cobalt_types::{KeyPair, PrivateKey, PublicKey};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;

/// Generate a new Ed25519 key pair from the system random source.
pub fn generate_keypair() -> KeyPair {
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    keypair_from_private(PrivateKey(seed))
}

/// Derive the public key from a private key.
pub fn public_from_private(private: &PrivateKey) -> PublicKey {
    let signing = SigningKey::from_bytes(&private.0);
    PublicKey(signing.verifying_key().to_bytes())
}

/// Reconstruct a full key pair from a private key.
pub fn keypair_from_private(private: PrivateKey) -> KeyPair {
    let public = public_from_private(&private);
    KeyPair { public, private }
}

/// Deterministic key derivation: private key `i` of a wallet seed is
/// `blake2b(seed ‖ i_be)`.
pub fn derive_key(seed: &[u8; 32], index: u32) -> KeyPair {
    let digest = crate::hash::blake2b_256_multi(&[seed, &index.to_be_bytes()]);
    keypair_from_private(PrivateKey(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_differ() {
        let a = generate_keypair();
        let b = generate_keypair();
        assert_ne!(a.public, b.public);
    }

    #[test]
    fn derivation_is_deterministic() {
        let seed = [7u8; 32];
        assert_eq!(derive_key(&seed, 0).public, derive_key(&seed, 0).public);
        assert_ne!(derive_key(&seed, 0).public, derive_key(&seed, 1).public);
    }

    #[test]
    fn public_matches_private() {
        let kp = generate_keypair();
        assert_eq!(public_from_private(&kp.private), kp.public);
    }
}
