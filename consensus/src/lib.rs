//! Cluster-level consensus.
//!
//! A coordinator with read access to every node periodically reconciles
//! chain heights and tips toward the longest chain (ties broken by
//! lexicographically smallest tip hash), then cross-checks state roots.
//! Equal chains must imply equal roots; when they do not, the divergence is
//! surfaced and optionally repaired from the leader's snapshot.

pub mod cluster;
pub mod monitor;

pub use cluster::Cluster;
pub use monitor::{ConsensusMonitor, TickReport};
