//! Rockets and the explosions they turn into.
//!
//! A rocket only knows where it was launched. The explosion at the top of its
//! flight is a separate instance, spawned by a deferred action the dispatcher
//! schedules relative to the launch time.

use super::{pick_color, Color, EffectArena};
use crate::common::{EffectId, EpochMillis};
use rand::Rng;

pub const SPARK_COLORS: [Color; 5] = ["#ffd700", "#ff4500", "#00d4ff", "#ff00ff", "#00ff00"];

/// A rocket climbing from the bottom edge. `x` is a percentage of the width.
#[derive(Debug, Clone, PartialEq)]
pub struct Rocket {
    pub x: f32,
}

/// One particle of an explosion, flung outwards along `angle_deg`.
#[derive(Debug, Clone, PartialEq)]
pub struct Spark {
    pub angle_deg: f32,
    pub color: Color,
    pub distance: f32,
    pub size: f32,
}

/// A burst of sparks. `x` and `y` are percentages of the viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct Explosion {
    pub x: f32,
    pub y: f32,
    pub sparks: Vec<Spark>,
}

#[derive(Debug)]
pub struct Fireworks {
    rockets: EffectArena<Rocket>,
    explosions: EffectArena<Explosion>,
    rocket_ttl_ms: u64,
    explosion_ttl_ms: u64,
    sparks_per_explosion: u32,
}

impl Fireworks {
    pub fn new(rocket_ttl_ms: u64, explosion_ttl_ms: u64, sparks_per_explosion: u32) -> Self {
        Self {
            rockets: EffectArena::new(),
            explosions: EffectArena::new(),
            rocket_ttl_ms,
            explosion_ttl_ms,
            sparks_per_explosion,
        }
    }

    pub fn spawn_rocket(&mut self, rocket: Rocket, now: EpochMillis) -> EffectId {
        self.rockets.spawn(rocket, now, self.rocket_ttl_ms)
    }

    /// Launches `count` rockets spread across the width, left to right.
    ///
    /// Returns each rocket's id and launch column, in launch order.
    pub fn launch_volley<R: Rng + ?Sized>(
        &mut self,
        count: u32,
        now: EpochMillis,
        rng: &mut R,
    ) -> Vec<(EffectId, f32)> {
        (0..count)
            .map(|i| {
                let x = 20.0 + i as f32 * 30.0 + rng.gen_range(0.0..10.0);
                (self.spawn_rocket(Rocket { x }, now), x)
            })
            .collect()
    }

    /// Detonates a burst of sparks near the top of the screen above `x`.
    pub fn explode<R: Rng + ?Sized>(&mut self, x: f32, now: EpochMillis, rng: &mut R) -> EffectId {
        let count = self.sparks_per_explosion.max(1);
        let sparks = (0..count)
            .map(|i| Spark {
                angle_deg: 360.0 / count as f32 * i as f32,
                color: pick_color(rng, &SPARK_COLORS),
                distance: rng.gen_range(30.0..80.0),
                size: rng.gen_range(4.0..8.0),
            })
            .collect();
        let explosion = Explosion {
            x,
            y: rng.gen_range(15.0..25.0),
            sparks,
        };
        self.explosions.spawn(explosion, now, self.explosion_ttl_ms)
    }

    pub fn prune(&mut self, now: EpochMillis) -> usize {
        self.rockets.prune(now) + self.explosions.prune(now)
    }

    pub fn rockets(&self) -> &EffectArena<Rocket> {
        &self.rockets
    }

    pub fn explosions(&self) -> &EffectArena<Explosion> {
        &self.explosions
    }

    pub fn clear(&mut self) {
        self.rockets.clear();
        self.explosions.clear();
    }
}
