//! Wall-clock sources used to compare local time with server timestamps.

use chrono::Utc;
use shared::protocol::Timestamp;
use tokio::time::Instant;

pub trait Clock: Send + Sync {
    /// Current time in Unix seconds.
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now().timestamp_micros() as f64 / 1_000_000.0
    }
}

/// A Unix time pinned to a runtime instant. Advances with tokio's clock, so it
/// follows virtual time when the runtime is paused.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin_unix: Timestamp,
    origin: Instant,
}

impl MonotonicClock {
    pub fn starting_at(origin_unix: Timestamp) -> Self {
        Self {
            origin_unix,
            origin: Instant::now(),
        }
    }

    pub fn from_system() -> Self {
        Self::starting_at(SystemClock.now())
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        self.origin_unix + self.origin.elapsed().as_secs_f64()
    }
}
