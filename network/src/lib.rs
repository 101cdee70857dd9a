//! The gossip transport layer.
//!
//! Delivery is best-effort and unordered across peers. The node never talks
//! to sockets directly: it pushes `(peer_id, frame)` pairs through the
//! [`Broadcaster`], and a transport task drains them onto the wire. Inbound
//! frames arrive serialized on a single channel per node, which is what lets
//! the state engine see one mutation at a time.

pub mod broadcast;
pub mod peer_table;
pub mod retry;
pub mod transport;

pub use broadcast::{BroadcastResult, Broadcaster};
pub use peer_table::{Penalty, PeerInfo, PeerTable};
pub use retry::PendingMessages;
pub use transport::{spawn_listener, spawn_outbound_writer};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("peer unreachable: {0}")]
    PeerUnreachable(String),

    #[error("channel closed")]
    ChannelClosed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
