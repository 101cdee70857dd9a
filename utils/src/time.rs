//! The production clock.

use ember_types::Clock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock [`Clock`] backed by the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before Unix epoch")
            .as_secs()
    }
}
