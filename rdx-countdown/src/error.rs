//! Error types for the countdown library.
//!
//! Only two subsystems can fail: the remote time authority and configuration
//! loading. Everything downstream of a sample is infallible by construction.

use thiserror::Error;

/// A failed round trip to the time authority.
///
/// These never reach the sampler; `ClockSync` converts them into an
/// `Offline` status and keeps the previous offset.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The request could not be sent or the body could not be read.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The authority answered with a non-2xx status.
    #[error("time authority returned HTTP {0}")]
    Status(u16),

    /// The response did not contain a parsable absolute timestamp.
    #[error("malformed time authority response: {0}")]
    Malformed(String),
}

/// Configuration could not be loaded or describes an impossible countdown.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The layered config sources could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// The sampler cadence is not the one boundary detection depends on.
    #[error("sample interval must be {expected} ms, got {actual} ms")]
    InvalidSampleInterval { expected: u64, actual: u64 },

    /// The target year does not produce a representable local midnight.
    #[error("no unambiguous New Year instant for year {0} in the configured timezone")]
    InvalidTarget(i32),

    /// A relative test target lies beyond the representable timeline.
    #[error("a target {0} seconds from now is out of range")]
    TargetOutOfRange(u64),

    /// A zero re-sync interval would turn the sync loop into a retry storm.
    #[error("sync interval must be at least one second")]
    InvalidSyncInterval,
}
