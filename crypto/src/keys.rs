//! Ed25519 key generation and address derivation.

use ember_types::Address;
use rand::rngs::OsRng;

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

/// A 32-byte Ed25519 secret key.
#[derive(Clone, Copy)]
pub struct SecretKey(pub [u8; 32]);

/// A public/secret key pair.
#[derive(Clone)]
pub struct KeyPair {
    pub public: PublicKey,
    pub secret: SecretKey,
}

/// Generate a key pair from a secure random source.
pub fn generate_keypair() -> KeyPair {
    let signing = ed25519_dalek::SigningKey::generate(&mut OsRng);
    KeyPair {
        public: PublicKey(signing.verifying_key().to_bytes()),
        secret: SecretKey(signing.to_bytes()),
    }
}

/// Derive a key pair deterministically from a 32-byte seed. Test fixtures and
/// the demo wiring use this to get stable addresses.
pub fn keypair_from_seed(seed: &[u8; 32]) -> KeyPair {
    let signing = ed25519_dalek::SigningKey::from_bytes(seed);
    KeyPair {
        public: PublicKey(signing.verifying_key().to_bytes()),
        secret: SecretKey(signing.to_bytes()),
    }
}

/// Derive an account address from a public key.
///
/// `0x` + hex of the first 20 bytes of SHA-256(public key).
pub fn derive_address(public: &PublicKey) -> Address {
    let digest = crate::hash::sha256(&public.0);
    Address::new(format!("0x{}", hex::encode(&digest.as_bytes()[..20])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_derivation_is_deterministic() {
        let a = keypair_from_seed(&[7u8; 32]);
        let b = keypair_from_seed(&[7u8; 32]);
        assert_eq!(a.public, b.public);
        assert_eq!(derive_address(&a.public), derive_address(&b.public));
    }

    #[test]
    fn different_seeds_different_addresses() {
        let a = keypair_from_seed(&[1u8; 32]);
        let b = keypair_from_seed(&[2u8; 32]);
        assert_ne!(derive_address(&a.public), derive_address(&b.public));
    }

    #[test]
    fn address_shape() {
        let kp = generate_keypair();
        let addr = derive_address(&kp.public);
        assert!(addr.as_str().starts_with("0x"));
        assert_eq!(addr.as_str().len(), 42);
    }
}
