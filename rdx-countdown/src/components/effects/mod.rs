//! Effect generators driven by the dispatcher.
//!
//! Every generator owns its instances in an [`EffectArena`]: each instance is
//! tagged with an expiry time at spawn and removed by the next sweep after
//! that time. Because instances are plain data owned by the generator, no
//! instance (and no pending removal) can outlive the generator itself.

pub mod arena;
pub mod confetti;
pub mod fireworks;
pub mod overlay;
pub mod particles;

pub use arena::{EffectArena, Timed};

/// A CSS color string handed through to the renderer untouched.
pub type Color = &'static str;

/// Picks a random color from a non-empty palette.
pub(crate) fn pick_color<R: rand::Rng + ?Sized>(rng: &mut R, palette: &[Color]) -> Color {
    palette[rng.gen_range(0..palette.len())]
}
