//! Line-delimited JSON framing.

use crate::{Message, MessageError};

/// Upper bound on a single frame. A full chain response for a deep sync is
/// the largest legitimate frame.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Encode a message as one newline-terminated JSON line.
pub fn encode_frame(message: &Message) -> Vec<u8> {
    let mut bytes =
        serde_json::to_vec(message).expect("message serialization is infallible");
    bytes.push(b'\n');
    bytes
}

/// Decode one frame (with or without its trailing newline).
pub fn decode_frame(line: &[u8]) -> Result<Message, MessageError> {
    if line.len() > MAX_FRAME_SIZE {
        return Err(MessageError::Oversize);
    }
    serde_json::from_slice(line).map_err(|e| MessageError::Malformed(e.to_string()))
}
