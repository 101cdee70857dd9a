//! Scalar types shared across the ember chain.
//!
//! Everything here is consensus-visible: the byte representation of these
//! types feeds the canonical encoding, so changes are protocol changes.

pub mod address;
pub mod amount;
pub mod digest;
pub mod params;
pub mod time;

pub use address::Address;
pub use amount::Amount;
pub use digest::Digest;
pub use params::ChainParams;
pub use time::{Clock, Timestamp, TimestampError};
