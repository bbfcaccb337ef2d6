//! Ed25519 message signing and verification.

use cobalt_types::{PrivateKey, PublicKey, Signature};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

/// Sign a message with a private key, returning the signature.
pub fn sign_message(message: &[u8], private_key: &PrivateKey) -> Signature {
    let signing_key = SigningKey::from_bytes(&private_key.0);
    let sig = signing_key.sign(message);
    Signature(sig.to_bytes())
}

/// Verify a signature against a message and public key.
///
/// Returns `true` if the signature is valid, `false` otherwise. Non-canonical
/// signatures and malformed public keys are rejected.
pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
        return false;
    };
    let dalek_sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify(message, &dalek_sig).is_ok()
}

/// Verify a batch of signatures, returning a per-item validity flag.
///
/// The fast path verifies the whole batch in one multi-scalar operation; on
/// batch failure each item is re-checked individually so a single bad
/// signature does not poison its neighbours.
pub fn verify_batch(
    messages: &[&[u8]],
    signatures: &[Signature],
    public_keys: &[PublicKey],
) -> Vec<bool> {
    debug_assert_eq!(messages.len(), signatures.len());
    debug_assert_eq!(messages.len(), public_keys.len());

    let mut keys = Vec::with_capacity(public_keys.len());
    let mut parseable = true;
    for key in public_keys {
        match VerifyingKey::from_bytes(&key.0) {
            Ok(vk) => keys.push(vk),
            Err(_) => {
                parseable = false;
                break;
            }
        }
    }

    if parseable {
        let sigs: Vec<ed25519_dalek::Signature> = signatures
            .iter()
            .map(|s| ed25519_dalek::Signature::from_bytes(&s.0))
            .collect();
        if ed25519_dalek::verify_batch(messages, &sigs, &keys).is_ok() {
            return vec![true; messages.len()];
        }
    }

    messages
        .iter()
        .zip(signatures)
        .zip(public_keys)
        .map(|((message, signature), key)| verify_signature(message, signature, key))
        .collect()
}
