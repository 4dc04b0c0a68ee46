//! # Countdown
//!
//! An event-driven New Year countdown engine for Rust.
//!
//! The engine samples a drift-corrected clock ten times per second, detects
//! the moments a displayed digit changes, and fans those crossings out to
//! self-expiring visual effects and haptic feedback. Rendering is left to the
//! application, which consumes the engine's event streams.
//!
//! ## Core Concepts
//!
//! - **ClockSync**: Periodically asks a remote time authority for the current
//!   time and publishes the offset between it and the local clock.
//! - **BoundaryClock**: Turns corrected time into remaining time and detects
//!   second, minute and hour crossings, the last minute, the final ten seconds
//!   and completion, each exactly as often as it really happens.
//! - **EffectDispatcher**: Maps each crossing to confetti, rockets, flashes,
//!   shakes and haptic patterns, and owns every follow-up it schedules.
//! - **Event-Driven**: Your application subscribes to event streams
//!   (`FrameEvent`, `SystemEvent`, `MotionEvent`) to render and react.
//! - **Configuration-Driven**: The timezone, target year, sync cadence and
//!   effect tuning are defined at startup via a `CountdownConfig`, often loaded
//!   from a file.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use countdown::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // 1. Load the default configuration (next New Year, UTC).
//!     let config = CountdownConfig::default();
//!     let authority = WorldTimeApi::new(config.time_authority_url.clone())?;
//!
//!     // 2. Create the engine.
//!     let engine = CountdownEngine::new(config)?;
//!
//!     // 3. Subscribe to an event stream before starting the engine.
//!     let mut frames = engine.subscribe_frame_events();
//!     tokio::spawn(async move {
//!         while let Ok(frame) = frames.recv().await {
//!             for event in &frame.boundaries {
//!                 println!("{:?} with {:?} left", event, frame.remaining);
//!             }
//!         }
//!     });
//!
//!     // 4. Run the engine. It will shut down on Ctrl+C.
//!     engine.run(authority).await?;
//!
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "Countdown Engine";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Declare all the modules in the crate.
pub mod common;
pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod haptics;
pub mod motion;
pub mod sync;
pub mod time;

/// A prelude module for easy importing of the most common countdown types.
pub mod prelude {
    pub use crate::common::{EffectId, EpochMillis};
    pub use crate::components::boundary::{BoundaryEvent, RemainingTime, TargetInstant};
    pub use crate::components::dispatcher::{DisplayMode, EffectCounts, SceneSnapshot};
    pub use crate::config::{CountdownConfig, EffectConfig};
    pub use crate::engine::{CountdownEngine, EngineHandle};
    pub use crate::error::{ConfigError, SyncError};
    pub use crate::events::{FrameEvent, MotionEvent, SystemEvent};
    pub use crate::haptics::{HapticSink, Haptics, TracingHaptics};
    pub use crate::motion::MotionReading;
    pub use crate::sync::{ClockOffset, SyncStatus, TimeAuthority, WorldTimeApi};
}
