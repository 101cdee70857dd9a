//! Ed25519 message signing and verification.

use crate::keys::{PublicKey, SecretKey};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

/// A 64-byte Ed25519 signature, carried as hex on the wire.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 64] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

/// Sign a message with a secret key.
pub fn sign_message(message: &[u8], secret: &SecretKey) -> Signature {
    let signing_key = SigningKey::from_bytes(&secret.0);
    Signature(signing_key.sign(message).to_bytes())
}

/// Verify a signature against a message and public key.
///
/// Returns `false` for malformed keys rather than erroring; an unverifiable
/// signature and an invalid one are treated the same by admission rules.
pub fn verify_signature(message: &[u8], signature: &Signature, public: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public.0) else {
        return false;
    };
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify(message, &sig).is_ok()
}
