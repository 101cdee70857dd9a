//! Payload schemas for each message type.
//!
//! `NEW_TRANSACTION` and `NEW_BLOCK` carry a canonical-encoded
//! [`ember_ledger::Transaction`] / [`ember_ledger::Block`] directly; the
//! structs here cover the remaining types.

use ember_ledger::AccountTable;
use ember_types::Digest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `HANDSHAKE` — peer introduction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakePayload {
    pub node_id: String,
    /// Address other peers should dial back.
    pub listen_addr: String,
    /// Digest of the sender's chain parameters; a mismatch means the peer is
    /// on a different protocol and gets rejected at the door.
    pub params_digest: Digest,
}

/// `REQUEST_CHAIN` — ask for blocks strictly above `from_height`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainRequest {
    pub from_height: u64,
    /// Retry-table correlation id; echoed by the `ACK`/response.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub msg_id: String,
}

/// `RESPONSE_CHAIN` — the requested suffix, in chain order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainResponse {
    pub blocks: Vec<ember_ledger::Block>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub msg_id: String,
}

/// `SYNC_REQUEST` / `SYNC_RESPONSE` — height and tip exchange.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub node_id: String,
    pub height: u64,
    pub tip_hash: String,
}

/// `PEER_LIST` — known peers, `peer_id -> address`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerListPayload {
    pub peers: BTreeMap<String, String>,
}

/// `ACK` — acknowledges a retryable message by its correlation id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckPayload {
    pub msg_id: String,
}

/// `STATE_SYNC_REQUEST` — ask a peer for its full account table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSyncRequest {
    pub node_id: String,
}

/// `STATE_SYNC_RESPONSE` — full account table plus the root committing it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSyncResponse {
    pub state_root: Digest,
    pub block_height: u64,
    pub node_id: String,
    pub accounts: AccountTable,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_ledger::Account;
    use ember_types::{Address, Amount};

    #[test]
    fn chain_request_accepts_bare_form() {
        // Peers that omit the correlation id still parse.
        let req: ChainRequest = serde_json::from_str(r#"{"from_height":5}"#).unwrap();
        assert_eq!(req.from_height, 5);
        assert!(req.msg_id.is_empty());
    }

    #[test]
    fn state_sync_response_account_shape() {
        let mut accounts = AccountTable::new();
        accounts.insert(
            Address::new("0xa"),
            Account {
                balance: Amount::new(899),
                nonce: Some(0),
            },
        );
        let resp = StateSyncResponse {
            state_root: ember_crypto::sha256(b"state"),
            block_height: 2,
            node_id: "node-1".into(),
            accounts,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["accounts"]["0xa"]["balance"], 899);
        assert_eq!(json["accounts"]["0xa"]["nonce"], 0);
    }

    #[test]
    fn peer_list_roundtrip() {
        let mut payload = PeerListPayload::default();
        payload
            .peers
            .insert("node-2".into(), "127.0.0.1:7202".into());
        let json = serde_json::to_string(&payload).unwrap();
        let back: PeerListPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }
}
