//! Full-screen overlays: the flash and the shake.

use crate::common::EpochMillis;

/// Which flash is showing; the renderer maps these to colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    /// Faint white, on minute rollovers.
    Minute,
    /// Gold, on completion.
    Celebration,
}

/// A brief full-screen flash. A new flash replaces the current one.
#[derive(Debug, Default, Clone)]
pub struct ScreenFlash {
    active: Option<(FlashKind, EpochMillis)>,
}

impl ScreenFlash {
    pub fn trigger(&mut self, kind: FlashKind, now: EpochMillis, duration_ms: u64) {
        self.active = Some((kind, now + duration_ms as EpochMillis));
    }

    pub fn current(&self, now: EpochMillis) -> Option<FlashKind> {
        match self.active {
            Some((kind, until)) if now < until => Some(kind),
            _ => None,
        }
    }

    pub fn prune(&mut self, now: EpochMillis) {
        if self.current(now).is_none() {
            self.active = None;
        }
    }

    pub fn clear(&mut self) {
        self.active = None;
    }
}

/// Screen shake. Overlapping triggers extend it, never shorten it.
#[derive(Debug, Default, Clone)]
pub struct ScreenShake {
    until: Option<EpochMillis>,
}

impl ScreenShake {
    pub fn trigger(&mut self, now: EpochMillis, duration_ms: u64) {
        let end = now + duration_ms as EpochMillis;
        self.until = Some(self.until.map_or(end, |until| until.max(end)));
    }

    pub fn is_active(&self, now: EpochMillis) -> bool {
        self.until.is_some_and(|until| now < until)
    }

    pub fn prune(&mut self, now: EpochMillis) {
        if !self.is_active(now) {
            self.until = None;
        }
    }

    pub fn clear(&mut self) {
        self.until = None;
    }
}
