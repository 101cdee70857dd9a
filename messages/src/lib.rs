//! Peer-to-peer wire protocol.
//!
//! Every frame is one line of JSON:
//! `{ "type": <int 0..10>, "payload": <string — an inner JSON document>, "sender_id": <string> }`.
//! The double encoding (payload as a string) keeps the envelope schema fixed
//! while payload schemas evolve per message type.

pub mod codec;
pub mod payload;

pub use codec::{decode_frame, encode_frame, MAX_FRAME_SIZE};
pub use payload::{
    AckPayload, ChainRequest, ChainResponse, HandshakePayload, PeerListPayload, StateSyncRequest,
    StateSyncResponse, SyncStatus,
};

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("frame exceeds {MAX_FRAME_SIZE} bytes")]
    Oversize,
}

/// Wire message type tags. The integer values are the protocol.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr,
)]
#[repr(u8)]
pub enum MessageKind {
    Handshake = 0,
    NewTransaction = 1,
    NewBlock = 2,
    RequestChain = 3,
    ResponseChain = 4,
    SyncRequest = 5,
    SyncResponse = 6,
    PeerList = 7,
    Ack = 8,
    StateSyncRequest = 9,
    StateSyncResponse = 10,
}

/// The envelope every peer frame carries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub payload: String,
    pub sender_id: String,
}

impl Message {
    /// Wrap a payload value into an envelope.
    pub fn new(kind: MessageKind, sender_id: &str, payload: &impl Serialize) -> Self {
        Self {
            kind,
            payload: serde_json::to_string(payload).expect("payload serialization is infallible"),
            sender_id: sender_id.to_string(),
        }
    }

    /// Parse the inner payload document.
    pub fn decode_payload<T: serde::de::DeserializeOwned>(&self) -> Result<T, MessageError> {
        serde_json::from_str(&self.payload).map_err(|e| MessageError::Malformed(e.to_string()))
    }
}
