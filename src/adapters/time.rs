//! Wall-clock adapter.
//!
//! Implements [`Clock`] over `std::time::SystemTime`.  Alert and sample
//! timestamps are epoch milliseconds so downstream consumers can compare
//! them against their own clocks.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::app::ports::Clock;

/// System wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        // A clock set before 1970 reads as the epoch.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64)
    }
}
