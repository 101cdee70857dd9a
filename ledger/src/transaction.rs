//! Value-transfer transactions.

use ember_crypto::{derive_address, sign_message, verify_signature, KeyPair, PublicKey, Signature};
use ember_types::{Address, Amount, Digest, Timestamp};
use serde::{Deserialize, Serialize};

/// A signed value transfer.
///
/// Field order is canonical: the JSON encoding of this struct (and of the
/// id view below) is the byte sequence that gets hashed, so reordering
/// fields is a consensus change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
    pub gas_price: Amount,
    pub nonce: u64,
    pub timestamp: Timestamp,
    /// Hex-encoded Ed25519 public key of the sender.
    pub public_key: String,
    /// Hex-encoded signature over `id:nonce`. Empty until signed.
    pub signature: String,
    /// `H(canonical encoding without signature and id)`.
    pub id: Digest,
}

/// The id view: every field except `signature` and `id`, in canonical order.
#[derive(Serialize)]
struct IdView<'a> {
    from: &'a Address,
    to: &'a Address,
    amount: Amount,
    gas_price: Amount,
    nonce: u64,
    timestamp: &'a Timestamp,
    public_key: &'a str,
}

impl Transaction {
    /// Build and sign a transfer in one step.
    pub fn new_signed(
        keypair: &KeyPair,
        to: Address,
        amount: Amount,
        gas_price: Amount,
        nonce: u64,
        timestamp: Timestamp,
    ) -> Self {
        let mut tx = Self {
            from: derive_address(&keypair.public),
            to,
            amount,
            gas_price,
            nonce,
            timestamp,
            public_key: keypair.public.to_hex(),
            signature: String::new(),
            id: Digest::ZERO,
        };
        tx.id = tx.compute_id();
        let sig = sign_message(&tx.signing_message(), &keypair.secret);
        tx.signature = sig.to_hex();
        tx
    }

    /// Canonical encoding of the id view.
    pub fn canonical_for_id(&self) -> Vec<u8> {
        let view = IdView {
            from: &self.from,
            to: &self.to,
            amount: self.amount,
            gas_price: self.gas_price,
            nonce: self.nonce,
            timestamp: &self.timestamp,
            public_key: &self.public_key,
        };
        serde_json::to_vec(&view).expect("transaction id view serialization is infallible")
    }

    /// Canonical encoding of the full transaction (Merkle leaves and the
    /// proof-of-work digest input hash this form).
    pub fn canonical(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("transaction serialization is infallible")
    }

    /// Recompute the transaction id from the canonical id view.
    pub fn compute_id(&self) -> Digest {
        ember_crypto::sha256(&self.canonical_for_id())
    }

    /// The byte string the signature binds: `tx_id:nonce`.
    fn signing_message(&self) -> Vec<u8> {
        format!("{}:{}", self.compute_id().to_hex(), self.nonce).into_bytes()
    }

    /// Check the signature and the key-to-address binding.
    ///
    /// The public key must both verify the signature and hash to `from`;
    /// without the second check any key could spend any account.
    pub fn verify_signature(&self) -> bool {
        let Some(public) = PublicKey::from_hex(&self.public_key) else {
            return false;
        };
        if derive_address(&public) != self.from {
            return false;
        }
        let Some(signature) = Signature::from_hex(&self.signature) else {
            return false;
        };
        verify_signature(&self.signing_message(), &signature, &public)
    }
}
