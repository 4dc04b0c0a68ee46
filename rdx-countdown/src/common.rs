//! Contains common, primitive types shared by every countdown component.
//!
//! This module defines the key type used to identify spawned effect instances
//! and the millisecond time representation the engine works in.

use slotmap::new_key_type;

/// Milliseconds since the Unix epoch.
///
/// All countdown arithmetic happens on this integer representation; calendar
/// math is only used once, when the target instant is built.
pub type EpochMillis = i64;

new_key_type! {
    /// Uniquely and safely identifies a spawned effect instance (a confetti
    /// piece, rocket, explosion or rising particle).
    ///
    /// Keys are never reused while the generator is alive, so a stale id held
    /// by a renderer can never resolve to a different instance.
    pub struct EffectId;
}
