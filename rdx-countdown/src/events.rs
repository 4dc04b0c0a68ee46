//! Defines all public event types broadcast by the countdown engine.
//!
//! This module acts as the public API for the engine's event system. The
//! presentation layer subscribes to these strongly-typed streams; it never
//! reaches into the engine's state directly.

use crate::components::boundary::{BoundaryEvent, RemainingTime, TargetInstant};
use crate::components::dispatcher::SceneSnapshot;
use crate::motion::Parallax;
use crate::sync::{ClockOffset, SyncStatus};
use std::sync::Arc;
use tokio::time::Instant;

/// Events related to the lifecycle and state of the engine itself.
#[derive(Debug, Clone)]
pub enum SystemEvent {
    /// Fired once when the sampler starts.
    EngineStarted { timestamp: Instant, target: TargetInstant },
    /// Fired once when the engine has stopped all of its tasks.
    EngineShutdown,
    /// Fired whenever the clock synchronisation status changes.
    SyncStatusChanged { status: SyncStatus, offset: ClockOffset },
    /// Fired when the countdown has been re-armed.
    CountdownReset { target: TargetInstant },
}

/// Everything the presentation layer needs for one sample.
///
/// Fired on every sampler tick, ten times per second.
#[derive(Debug, Clone)]
pub struct FrameEvent {
    /// Monotonic sample counter since start.
    pub sample: u64,
    /// The corrected time this frame was sampled at.
    pub corrected_now: i64,
    /// The effect-clock reading `scene` was built at. Effect `expires_at`
    /// values are on this clock.
    pub effect_clock: i64,
    pub remaining: RemainingTime,
    /// Crossings detected in this sample, in detection order.
    pub boundaries: Vec<BoundaryEvent>,
    /// Effect instances and overlay state after this sample was dispatched.
    pub scene: Arc<SceneSnapshot>,
}

/// Events derived from the optional motion sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionEvent {
    /// Fired for every reading.
    Moved {
        parallax: Parallax,
        /// Set for the short animation window after a shake.
        shaking: bool,
    },
    /// Fired once per shake gesture, after the `Moved` of the same reading.
    ShakeDetected,
}
