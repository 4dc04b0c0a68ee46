//! Capability-gated haptic feedback.
//!
//! The platform actuator sits behind [`HapticSink`]. Whether one exists is
//! decided once, when [`Haptics::select`] is called at startup; a missing
//! actuator becomes [`NoopHaptics`] and every later call is a cheap no-op.
//! Calls are fire-and-forget: sinks swallow their own failures.
//!
//! Multi-pulse feedback is described as a [`HapticPattern`] of offsets. The
//! dispatcher plays the first pulse immediately and schedules the rest as
//! deferred actions, so pending pulses die with the dispatcher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpactStyle {
    Light,
    Medium,
    Heavy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Warning,
    Error,
}

/// A platform haptic actuator.
pub trait HapticSink: Send + Sync {
    fn impact(&self, style: ImpactStyle);
    fn notify(&self, kind: NotificationKind);
    fn vibrate(&self, duration: Duration);
}

/// Used when the platform has no actuator.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHaptics;

impl HapticSink for NoopHaptics {
    fn impact(&self, _style: ImpactStyle) {}
    fn notify(&self, _kind: NotificationKind) {}
    fn vibrate(&self, _duration: Duration) {}
}

/// Reports pulses through `tracing`; the console stand-in for an actuator.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHaptics;

impl HapticSink for TracingHaptics {
    fn impact(&self, style: ImpactStyle) {
        debug!("haptic impact: {:?}", style);
    }

    fn notify(&self, kind: NotificationKind) {
        debug!("haptic notification: {:?}", kind);
    }

    fn vibrate(&self, duration: Duration) {
        debug!("haptic vibration: {}ms", duration.as_millis());
    }
}

/// One actuator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HapticPulse {
    Impact(ImpactStyle),
    Notify(NotificationKind),
    Vibrate(Duration),
}

/// Pulses with their offsets from the moment the pattern starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HapticPattern(pub Vec<(u64, HapticPulse)>);

impl HapticPattern {
    fn single(pulse: HapticPulse) -> Self {
        Self(vec![(0, pulse)])
    }

    fn repeated(style: ImpactStyle, times: u64, spacing_ms: u64) -> Vec<(u64, HapticPulse)> {
        (0..times)
            .map(|i| (i * spacing_ms, HapticPulse::Impact(style)))
            .collect()
    }

    /// Every second.
    pub fn tick() -> Self {
        Self::single(HapticPulse::Impact(ImpactStyle::Light))
    }

    /// Minute rollover: a medium double pulse.
    pub fn minute() -> Self {
        Self(Self::repeated(ImpactStyle::Medium, 2, 150))
    }

    /// Hour rollover: a heavy triple pulse.
    pub fn hour() -> Self {
        Self(Self::repeated(ImpactStyle::Heavy, 3, 200))
    }

    /// Entering the last minute.
    pub fn last_minute() -> Self {
        Self::single(HapticPulse::Notify(NotificationKind::Success))
    }

    /// Escalates as the final seconds run out.
    pub fn final_countdown(seconds_left: u32) -> Option<Self> {
        match seconds_left {
            6..=10 => Some(Self::single(HapticPulse::Impact(ImpactStyle::Medium))),
            2..=5 => Some(Self::single(HapticPulse::Impact(ImpactStyle::Heavy))),
            1 => Some(Self::single(HapticPulse::Vibrate(Duration::from_millis(500)))),
            _ => None,
        }
    }

    /// Rapid heavy pulses, a success notification, then one long vibration.
    pub fn celebration() -> Self {
        let mut pulses = Self::repeated(ImpactStyle::Heavy, 5, 100);
        pulses.push((600, HapticPulse::Notify(NotificationKind::Success)));
        pulses.push((800, HapticPulse::Vibrate(Duration::from_millis(1_000))));
        Self(pulses)
    }
}

/// The selected sink plus a runtime on/off switch.
#[derive(Clone)]
pub struct Haptics {
    sink: Arc<dyn HapticSink>,
    enabled: Arc<AtomicBool>,
}

impl Haptics {
    /// Chooses the sink once: the platform actuator if one was detected,
    /// otherwise the no-op sink.
    pub fn select(platform: Option<Arc<dyn HapticSink>>, enabled: bool) -> Self {
        Self {
            sink: platform.unwrap_or_else(|| Arc::new(NoopHaptics)),
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn play(&self, pulse: HapticPulse) {
        if !self.is_enabled() {
            return;
        }
        match pulse {
            HapticPulse::Impact(style) => self.sink.impact(style),
            HapticPulse::Notify(kind) => self.sink.notify(kind),
            HapticPulse::Vibrate(duration) => self.sink.vibrate(duration),
        }
    }
}
