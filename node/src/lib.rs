//! A single ember peer.
//!
//! The node composes the chain store, state, mempool, miner, and peer table,
//! dispatches inbound messages, and broadcasts outbound ones. Lock
//! acquisition order is chain > mempool > peers; no lock is ever held across
//! network I/O — outbound frames go through the broadcaster's queue.

pub mod config;
pub mod error;
pub mod miner;
pub mod node;
pub mod shutdown;
pub mod tasks;

pub use config::NodeConfig;
pub use error::NodeError;
pub use node::{Node, NodeStatus};
pub use shutdown::ShutdownController;
