//! Confetti bursts.

use super::{pick_color, Color, EffectArena};
use crate::common::{EffectId, EpochMillis};
use rand::Rng;

pub const CONFETTI_COLORS: [Color; 7] = [
    "#ffd700", "#ff4500", "#00d4ff", "#ff00ff", "#00ff00", "#ff69b4", "#fff",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfettiShape {
    Circle,
    Square,
    Triangle,
}

/// A single falling piece. Positions are percentages of the viewport width.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfettiPiece {
    pub x: f32,
    pub color: Color,
    pub size: f32,
    pub delay_ms: u64,
    pub duration_ms: u64,
    pub rotation: f32,
    pub shape: ConfettiShape,
}

/// Randomisation ranges for one burst.
#[derive(Debug, Clone, PartialEq)]
pub struct BurstParams {
    pub count: u32,
    pub ttl_ms: u64,
    pub max_delay_ms: u64,
    pub size: (f32, f32),
    pub duration_ms: (u64, u64),
    pub shapes: &'static [ConfettiShape],
}

impl BurstParams {
    /// The small burst that marks a minute rollover.
    pub fn minute(count: u32, ttl_ms: u64) -> Self {
        Self {
            count,
            ttl_ms,
            max_delay_ms: 300,
            size: (6.0, 14.0),
            duration_ms: (2_000, 3_500),
            shapes: &[ConfettiShape::Circle, ConfettiShape::Square],
        }
    }

    /// The large, slow burst that opens the celebration.
    pub fn celebration(count: u32, ttl_ms: u64) -> Self {
        Self {
            count,
            ttl_ms,
            max_delay_ms: 3_000,
            size: (6.0, 16.0),
            duration_ms: (3_000, 5_000),
            shapes: &[
                ConfettiShape::Circle,
                ConfettiShape::Square,
                ConfettiShape::Triangle,
            ],
        }
    }
}

/// Pieces per minute-rollover burst: linear from `base` at 24h or more
/// remaining to `max` at the target.
pub fn proximity_count(base: u32, max: u32, proximity: f32) -> u32 {
    let span = max.saturating_sub(base) as f32;
    base + (proximity.clamp(0.0, 1.0) * span).floor() as u32
}

#[derive(Debug, Default)]
pub struct ConfettiGenerator {
    pieces: EffectArena<ConfettiPiece>,
}

impl ConfettiGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, piece: ConfettiPiece, now: EpochMillis, ttl_ms: u64) -> EffectId {
        self.pieces.spawn(piece, now, ttl_ms)
    }

    /// Spawns `params.count` randomised pieces.
    pub fn burst<R: Rng + ?Sized>(
        &mut self,
        params: &BurstParams,
        now: EpochMillis,
        rng: &mut R,
    ) -> Vec<EffectId> {
        (0..params.count)
            .map(|_| {
                let piece = ConfettiPiece {
                    x: rng.gen_range(0.0..100.0),
                    color: pick_color(rng, &CONFETTI_COLORS),
                    size: rng.gen_range(params.size.0..params.size.1),
                    delay_ms: rng.gen_range(0..=params.max_delay_ms),
                    duration_ms: rng.gen_range(params.duration_ms.0..=params.duration_ms.1),
                    rotation: rng.gen_range(0.0..360.0),
                    shape: params.shapes[rng.gen_range(0..params.shapes.len())],
                };
                self.spawn(piece, now, params.ttl_ms)
            })
            .collect()
    }

    pub fn prune(&mut self, now: EpochMillis) -> usize {
        self.pieces.prune(now)
    }

    pub fn pieces(&self) -> &EffectArena<ConfettiPiece> {
        &self.pieces
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn clear(&mut self) {
        self.pieces.clear();
    }
}
