//! Motion input: parallax offset and shake gesture detection.
//!
//! The motion sensor is optional. When the host has one it forwards readings
//! over a channel and the engine feeds them through a [`MotionAdapter`]; when
//! it has none, no channel is attached and nothing runs.

use crate::common::EpochMillis;

/// Largest parallax displacement in either axis, in pixels.
pub const MAX_PARALLAX_PX: f32 = 30.0;
/// Acceleration magnitude (m/s²) above which a reading counts as a shake.
pub const SHAKE_THRESHOLD: f32 = 15.0;
/// Minimum time between two shake detections.
pub const SHAKE_COOLDOWN_MS: i64 = 1_000;
/// How long the shaking state stays set after a detection.
pub const SHAKE_ANIMATION_MS: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Acceleration {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Acceleration {
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// A raw sensor reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionReading {
    /// Three-axis acceleration from a native motion sensor.
    Acceleration(Acceleration),
    /// Device orientation in degrees, as reported by browsers without
    /// access to the accelerometer. Only drives parallax.
    Orientation { gamma: f32, beta: f32 },
}

/// Background displacement in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Parallax {
    pub x: f32,
    pub y: f32,
}

impl Parallax {
    /// Maps a tilt to a displacement, saturating at ±10 on either axis.
    pub fn from_tilt(x: f32, y: f32) -> Self {
        Self {
            x: (x / 10.0).clamp(-1.0, 1.0) * MAX_PARALLAX_PX,
            y: (y / 10.0).clamp(-1.0, 1.0) * MAX_PARALLAX_PX,
        }
    }

    /// Orientation angles use a wider range: gamma spans ±90°, beta ±180°.
    pub fn from_orientation(gamma: f32, beta: f32) -> Self {
        Self::from_tilt(gamma / 9.0, beta / 18.0)
    }
}

/// The adapter's view after one reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionUpdate {
    pub parallax: Parallax,
    /// A new shake gesture started with this reading.
    pub shake_detected: bool,
    /// The shake animation window is open, including right after a detection.
    pub shaking: bool,
}

#[derive(Debug, Default)]
pub struct MotionAdapter {
    parallax: Parallax,
    last_shake: Option<EpochMillis>,
}

impl MotionAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parallax(&self) -> Parallax {
        self.parallax
    }

    /// Whether a shake was detected recently enough to still be animating.
    pub fn is_shaking(&self, now: EpochMillis) -> bool {
        self.last_shake
            .is_some_and(|at| now - at < SHAKE_ANIMATION_MS)
    }

    pub fn process(&mut self, reading: MotionReading, now: EpochMillis) -> MotionUpdate {
        let shake_detected = match reading {
            MotionReading::Acceleration(a) => {
                self.parallax = Parallax::from_tilt(a.x, a.y);
                self.detect_shake(a, now)
            }
            MotionReading::Orientation { gamma, beta } => {
                self.parallax = Parallax::from_orientation(gamma, beta);
                false
            }
        };
        MotionUpdate {
            parallax: self.parallax,
            shake_detected,
            shaking: self.is_shaking(now),
        }
    }

    fn detect_shake(&mut self, a: Acceleration, now: EpochMillis) -> bool {
        let cooled_down = self
            .last_shake
            .map_or(true, |at| now - at > SHAKE_COOLDOWN_MS);
        if a.magnitude() > SHAKE_THRESHOLD && cooled_down {
            self.last_shake = Some(now);
            return true;
        }
        false
    }
}
