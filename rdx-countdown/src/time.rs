//! Local time sources.
//!
//! The engine never calls the wall clock directly. It reads "local now" through
//! a [`TimeSource`] so that the authoritative correction from `ClockSync` and
//! the sampler can be driven by a paused tokio clock in tests.

use crate::common::EpochMillis;
use chrono::Utc;
use tokio::time::Instant;

/// A source of uncorrected local time.
pub trait TimeSource: Send + Sync {
    /// Current local time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> EpochMillis;
}

/// Reads the operating system's wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_millis(&self) -> EpochMillis {
        Utc::now().timestamp_millis()
    }
}

/// A wall clock anchored to an epoch value and advanced by tokio's clock.
///
/// Under `#[tokio::test(start_paused = true)]` this clock only moves when the
/// runtime auto-advances or the test calls `tokio::time::advance`.
#[derive(Debug, Clone, Copy)]
pub struct TokioTimeSource {
    anchor_millis: EpochMillis,
    anchor: Instant,
}

impl TokioTimeSource {
    /// Starts the clock at `anchor_millis`, measured from the current tokio instant.
    pub fn anchored_at(anchor_millis: EpochMillis) -> Self {
        Self {
            anchor_millis,
            anchor: Instant::now(),
        }
    }
}

impl TimeSource for TokioTimeSource {
    fn now_millis(&self) -> EpochMillis {
        let elapsed = Instant::now().saturating_duration_since(self.anchor);
        self.anchor_millis + elapsed.as_millis() as EpochMillis
    }
}
