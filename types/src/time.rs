//! Wall-clock timestamps.
//!
//! Timestamps travel as `YYYY-MM-DD HH:MM:SS` UTC strings (that exact form is
//! part of the canonical encoding), but every consensus comparison operates on
//! parsed epoch seconds.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Format of every timestamp on the chain.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed timestamp {0:?}, expected YYYY-MM-DD HH:MM:SS")]
pub struct TimestampError(pub String);

/// A wall-clock timestamp in `YYYY-MM-DD HH:MM:SS` UTC form.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(String);

impl Timestamp {
    /// Wrap an already-formatted string. No validation happens here; consensus
    /// checks go through [`Timestamp::epoch_secs`] and surface parse failures.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Render epoch seconds in the chain's timestamp format.
    pub fn from_epoch_secs(secs: u64) -> Self {
        let dt = DateTime::<Utc>::from_timestamp(secs as i64, 0)
            .unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).expect("epoch is valid"));
        Self(dt.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse to epoch seconds. Consensus rules compare these integers, never
    /// the raw strings.
    pub fn epoch_secs(&self) -> Result<u64, TimestampError> {
        let dt = NaiveDateTime::parse_from_str(&self.0, TIMESTAMP_FORMAT)
            .map_err(|_| TimestampError(self.0.clone()))?;
        let secs = dt.and_utc().timestamp();
        u64::try_from(secs).map_err(|_| TimestampError(self.0.clone()))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of the current time.
///
/// Production code uses a system clock; tests substitute a deterministic one
/// so block-timestamp rules can be exercised without sleeping.
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> u64;

    fn now_timestamp(&self) -> Timestamp {
        Timestamp::from_epoch_secs(self.now_secs())
    }
}
