//! The ambient background: a fixed star field plus rising particles that
//! appear as the final countdown intensifies.

use super::{pick_color, Color, EffectArena};
use crate::common::EpochMillis;
use rand::Rng;
use std::sync::Arc;

pub const RISING_COLORS: [Color; 4] = ["#FFD700", "#FF6B35", "#00FFFF", "#FF00FF"];

/// Intensity above which rising particles are shown.
const RISING_THRESHOLD: f32 = 0.3;
/// Rising particles at full intensity.
const RISING_MAX: f32 = 30.0;

/// A twinkling background star. Positions are viewport percentages.
#[derive(Debug, Clone, PartialEq)]
pub struct Star {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub opacity: f32,
    pub twinkle_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RisingParticle {
    pub x: f32,
    pub size: f32,
    pub color: Color,
    pub delay_ms: u64,
    pub duration_ms: u64,
}

#[derive(Debug)]
pub struct ParticleField {
    stars: Arc<[Star]>,
    rising: EffectArena<RisingParticle>,
}

/// Number of rising particles wanted at a given intensity.
pub fn rising_target(intensity: f32) -> usize {
    if intensity > RISING_THRESHOLD {
        (intensity.min(1.0) * RISING_MAX).floor() as usize
    } else {
        0
    }
}

impl ParticleField {
    /// Generates the star field once; it never changes afterwards.
    pub fn new<R: Rng + ?Sized>(star_count: u32, rng: &mut R) -> Self {
        let stars = (0..star_count)
            .map(|_| Star {
                x: rng.gen_range(0.0..100.0),
                y: rng.gen_range(0.0..100.0),
                size: rng.gen_range(1.0..3.0),
                opacity: rng.gen_range(0.2..0.7),
                twinkle_delay_ms: rng.gen_range(0..4_000),
            })
            .collect::<Vec<_>>();
        Self {
            stars: stars.into(),
            rising: EffectArena::new(),
        }
    }

    pub fn stars(&self) -> &[Star] {
        &self.stars
    }

    /// A cheap handle to the star field for snapshots.
    pub fn shared_stars(&self) -> Arc<[Star]> {
        self.stars.clone()
    }

    pub fn rising(&self) -> &EffectArena<RisingParticle> {
        &self.rising
    }

    /// Expires finished rising particles and tops the field up to the count
    /// the current intensity calls for. Returns how many were spawned.
    pub fn update<R: Rng + ?Sized>(&mut self, intensity: f32, now: EpochMillis, rng: &mut R) -> usize {
        self.rising.prune(now);
        let wanted = rising_target(intensity);
        let missing = wanted.saturating_sub(self.rising.len());
        for _ in 0..missing {
            let particle = RisingParticle {
                x: rng.gen_range(0.0..100.0),
                size: rng.gen_range(2.0..6.0),
                color: pick_color(rng, &RISING_COLORS),
                delay_ms: rng.gen_range(0..2_000),
                duration_ms: rng.gen_range(3_000..5_000),
            };
            let ttl = particle.delay_ms + particle.duration_ms;
            self.rising.spawn(particle, now, ttl);
        }
        missing
    }

    pub fn clear_rising(&mut self) {
        self.rising.clear();
    }
}
