//! Maps boundary events to effects.
//!
//! The dispatcher owns no sampling logic. It receives each [`Sample`] after
//! the boundary clock has produced it, spawns effect instances, plays haptic
//! patterns, and schedules follow-ups (explosions, staggered volleys, later
//! pulses of a haptic pattern) as deferred actions keyed by due time.
//!
//! Deferred actions and effect instances are plain data owned by the
//! dispatcher. [`EffectDispatcher::sweep`] runs whatever is due and prunes
//! expired instances; dropping the dispatcher drops every pending action, so
//! nothing can fire after the owning engine is torn down.

use crate::common::EpochMillis;
use crate::components::boundary::{BoundaryEvent, RemainingTime, Sample};
use crate::components::effects::confetti::{
    proximity_count, BurstParams, ConfettiGenerator, ConfettiPiece,
};
use crate::components::effects::fireworks::{Explosion, Fireworks, Rocket};
use crate::components::effects::overlay::{FlashKind, ScreenFlash, ScreenShake};
use crate::components::effects::particles::{ParticleField, RisingParticle, Star};
use crate::components::effects::Timed;
use crate::config::EffectConfig;
use crate::haptics::{HapticPattern, HapticPulse, Haptics};
use rand::rngs::StdRng;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Whether the countdown is still running or the celebration has begun.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Counting,
    Complete,
}

/// A follow-up scheduled relative to the event that caused it.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Deferred {
    Haptic(HapticPulse),
    Explode { x: f32 },
    Volley,
}

/// Pending follow-ups ordered by due time, then by scheduling order.
#[derive(Debug, Default)]
struct DeferredQueue {
    pending: BTreeMap<(EpochMillis, u64), Deferred>,
    next_seq: u64,
}

impl DeferredQueue {
    fn schedule(&mut self, due: EpochMillis, action: Deferred) {
        self.pending.insert((due, self.next_seq), action);
        self.next_seq += 1;
    }

    fn take_due(&mut self, now: EpochMillis) -> Vec<Deferred> {
        let later = self.pending.split_off(&(now + 1, 0));
        std::mem::replace(&mut self.pending, later)
            .into_values()
            .collect()
    }

    fn len(&self) -> usize {
        self.pending.len()
    }

    fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Live instance counts, for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EffectCounts {
    pub confetti: usize,
    pub rockets: usize,
    pub explosions: usize,
    pub rising: usize,
    pub pending: usize,
}

/// What the renderer draws for one frame.
#[derive(Debug, Clone)]
pub struct SceneSnapshot {
    pub mode: DisplayMode,
    /// Glow/scale escalation for the final ten seconds, 0.0..=0.9.
    pub intensity: f32,
    pub flash: Option<FlashKind>,
    pub shaking: bool,
    pub stars: Arc<[Star]>,
    pub rising: Vec<Timed<RisingParticle>>,
    pub confetti: Vec<Timed<ConfettiPiece>>,
    pub rockets: Vec<Timed<Rocket>>,
    pub explosions: Vec<Timed<Explosion>>,
}

pub struct EffectDispatcher {
    config: EffectConfig,
    haptics: Haptics,
    rng: StdRng,
    confetti: ConfettiGenerator,
    fireworks: Fireworks,
    particles: ParticleField,
    flash: ScreenFlash,
    shake: ScreenShake,
    deferred: DeferredQueue,
    mode: DisplayMode,
    intensity: f32,
    last_final_second: Option<u32>,
}

impl EffectDispatcher {
    pub fn new(config: EffectConfig, haptics: Haptics, mut rng: StdRng) -> Self {
        let particles = ParticleField::new(config.star_count, &mut rng);
        let fireworks = Fireworks::new(
            config.rocket_ttl_ms,
            config.explosion_ttl_ms,
            config.explosion_sparks,
        );
        Self {
            config,
            haptics,
            rng,
            confetti: ConfettiGenerator::new(),
            fireworks,
            particles,
            flash: ScreenFlash::default(),
            shake: ScreenShake::default(),
            deferred: DeferredQueue::default(),
            mode: DisplayMode::Counting,
            intensity: 0.0,
            last_final_second: None,
        }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn haptics(&self) -> &Haptics {
        &self.haptics
    }

    /// Reacts to every boundary event of one sample, in detection order.
    pub fn handle(&mut self, sample: &Sample, now: EpochMillis) {
        let mut in_final_window = false;
        for event in &sample.events {
            match *event {
                BoundaryEvent::SecondTick => self.play(HapticPattern::tick(), now),
                BoundaryEvent::MinuteRollover => self.on_minute(&sample.remaining, now),
                BoundaryEvent::HourRollover => self.on_hour(now),
                BoundaryEvent::LastMinuteEntered => {
                    debug!("Last minute entered");
                    self.play(HapticPattern::last_minute(), now);
                }
                BoundaryEvent::FinalCountdownTick { seconds_left } => {
                    in_final_window = true;
                    self.on_final_second(seconds_left, now);
                }
                BoundaryEvent::Completed => self.celebrate(now),
            }
        }
        if !in_final_window {
            self.intensity = 0.0;
        }
    }

    fn on_minute(&mut self, remaining: &RemainingTime, now: EpochMillis) {
        let count = proximity_count(
            self.config.confetti_base,
            self.config.confetti_max,
            remaining.proximity(),
        );
        let params = BurstParams::minute(count, self.config.confetti_ttl_ms);
        self.confetti.burst(&params, now, &mut self.rng);
        self.flash
            .trigger(FlashKind::Minute, now, self.config.minute_flash_ms);
        self.play(HapticPattern::minute(), now);
        debug!("Minute rollover: {} confetti", count);
    }

    fn on_hour(&mut self, now: EpochMillis) {
        self.launch_volley(now);
        self.shake.trigger(now, self.config.hour_shake_ms);
        self.play(HapticPattern::hour(), now);
        debug!("Hour rollover: {} rockets", self.config.rockets_per_volley);
    }

    /// The final-countdown tick is level-triggered, so the one-per-second
    /// feedback is keyed on the seconds value actually changing.
    fn on_final_second(&mut self, seconds_left: u32, now: EpochMillis) {
        self.intensity = (10 - seconds_left.min(10)) as f32 / 10.0;
        if self.last_final_second == Some(seconds_left) {
            return;
        }
        self.last_final_second = Some(seconds_left);
        if let Some(pattern) = HapticPattern::final_countdown(seconds_left) {
            self.play(pattern, now);
        }
        if seconds_left <= 3 {
            self.shake.trigger(now, self.config.final_shake_ms);
        }
    }

    fn celebrate(&mut self, now: EpochMillis) {
        if self.mode == DisplayMode::Complete {
            debug!("Completion already celebrated, ignoring");
            return;
        }
        info!("Countdown complete, starting celebration");
        self.mode = DisplayMode::Complete;
        self.intensity = 0.0;
        self.flash
            .trigger(FlashKind::Celebration, now, self.config.celebration_flash_ms);
        let params = BurstParams::celebration(
            self.config.celebration_confetti,
            self.config.celebration_confetti_ttl_ms,
        );
        // The celebration burst replaces any minute confetti still falling.
        self.confetti.clear();
        self.confetti.burst(&params, now, &mut self.rng);
        for wave in 0..self.config.celebration_volleys as u64 {
            if wave == 0 {
                self.launch_volley(now);
            } else {
                let due = now + (wave * self.config.celebration_volley_stagger_ms) as EpochMillis;
                self.deferred.schedule(due, Deferred::Volley);
            }
        }
        self.play(HapticPattern::celebration(), now);
    }

    /// Launches one volley and schedules each rocket's explosion.
    fn launch_volley(&mut self, now: EpochMillis) {
        let volley = self
            .fireworks
            .launch_volley(self.config.rockets_per_volley, now, &mut self.rng);
        for (i, (_, x)) in volley.into_iter().enumerate() {
            let flight = self.config.rocket_flight_ms + i as u64 * self.config.rocket_flight_stagger_ms;
            self.deferred
                .schedule(now + flight as EpochMillis, Deferred::Explode { x });
        }
    }

    /// Plays the first pulse now and defers the rest.
    fn play(&mut self, pattern: HapticPattern, now: EpochMillis) {
        for (offset, pulse) in pattern.0 {
            if offset == 0 {
                self.haptics.play(pulse);
            } else {
                self.deferred
                    .schedule(now + offset as EpochMillis, Deferred::Haptic(pulse));
            }
        }
    }

    /// Runs every deferred action due by `now`, then expires finished effects.
    ///
    /// Returns how many deferred actions ran.
    pub fn sweep(&mut self, now: EpochMillis) -> usize {
        let due = self.deferred.take_due(now);
        let ran = due.len();
        for action in due {
            match action {
                Deferred::Haptic(pulse) => self.haptics.play(pulse),
                Deferred::Explode { x } => {
                    self.fireworks.explode(x, now, &mut self.rng);
                }
                Deferred::Volley => self.launch_volley(now),
            }
        }
        self.confetti.prune(now);
        self.fireworks.prune(now);
        self.flash.prune(now);
        self.shake.prune(now);
        self.particles.update(self.intensity, now, &mut self.rng);
        ran
    }

    pub fn counts(&self) -> EffectCounts {
        EffectCounts {
            confetti: self.confetti.len(),
            rockets: self.fireworks.rockets().len(),
            explosions: self.fireworks.explosions().len(),
            rising: self.particles.rising().len(),
            pending: self.deferred.len(),
        }
    }

    pub fn snapshot(&self, now: EpochMillis) -> SceneSnapshot {
        SceneSnapshot {
            mode: self.mode,
            intensity: self.intensity,
            flash: self.flash.current(now),
            shaking: self.shake.is_active(now),
            stars: self.particles.shared_stars(),
            rising: self.particles.rising().live(now).cloned().collect(),
            confetti: self.confetti.pieces().live(now).cloned().collect(),
            rockets: self.fireworks.rockets().live(now).cloned().collect(),
            explosions: self.fireworks.explosions().live(now).cloned().collect(),
        }
    }

    /// Returns to counting mode and drops every live instance and pending
    /// follow-up. The star field is kept.
    pub fn reset(&mut self) {
        self.deferred.clear();
        self.confetti.clear();
        self.fireworks.clear();
        self.particles.clear_rising();
        self.flash.clear();
        self.shake.clear();
        self.mode = DisplayMode::Counting;
        self.intensity = 0.0;
        self.last_final_second = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::boundary::{BoundaryClock, TargetInstant};
    use crate::haptics::{HapticSink, ImpactStyle, NotificationKind};
    use rand::SeedableRng;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<HapticPulse>>);

    impl Recorder {
        fn take(&self) -> Vec<HapticPulse> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    impl HapticSink for Recorder {
        fn impact(&self, style: ImpactStyle) {
            self.0.lock().unwrap().push(HapticPulse::Impact(style));
        }
        fn notify(&self, kind: NotificationKind) {
            self.0.lock().unwrap().push(HapticPulse::Notify(kind));
        }
        fn vibrate(&self, duration: Duration) {
            self.0.lock().unwrap().push(HapticPulse::Vibrate(duration));
        }
    }

    fn dispatcher() -> (EffectDispatcher, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let haptics = Haptics::select(Some(recorder.clone() as Arc<dyn HapticSink>), true);
        let dispatcher =
            EffectDispatcher::new(EffectConfig::default(), haptics, StdRng::seed_from_u64(42));
        (dispatcher, recorder)
    }

    fn sample(total_seconds: u64, events: Vec<BoundaryEvent>) -> Sample {
        Sample {
            remaining: RemainingTime::from_total_seconds(total_seconds),
            events,
        }
    }

    #[test]
    fn second_tick_is_a_light_pulse() {
        let (mut d, rec) = dispatcher();
        d.handle(&sample(500, vec![BoundaryEvent::SecondTick]), 0);
        assert_eq!(rec.take(), vec![HapticPulse::Impact(ImpactStyle::Light)]);
        assert_eq!(d.counts(), EffectCounts::default());
    }

    #[test]
    fn minute_confetti_scales_with_proximity() {
        let (mut far, _) = dispatcher();
        far.handle(&sample(48 * 3600, vec![BoundaryEvent::MinuteRollover]), 0);
        assert_eq!(far.counts().confetti, 8);

        let (mut mid, _) = dispatcher();
        mid.handle(&sample(12 * 3600, vec![BoundaryEvent::MinuteRollover]), 0);
        assert_eq!(mid.counts().confetti, 29);

        let (mut near, _) = dispatcher();
        near.handle(&sample(59, vec![BoundaryEvent::MinuteRollover]), 0);
        assert_eq!(near.counts().confetti, 49);
    }

    #[test]
    fn minute_rollover_flashes_and_double_pulses() {
        let (mut d, rec) = dispatcher();
        d.handle(&sample(3_000, vec![BoundaryEvent::MinuteRollover]), 1_000);
        assert_eq!(d.snapshot(1_100).flash, Some(FlashKind::Minute));
        assert_eq!(d.snapshot(1_200).flash, None);
        assert_eq!(rec.take(), vec![HapticPulse::Impact(ImpactStyle::Medium)]);

        assert_eq!(d.sweep(1_149), 0);
        assert_eq!(d.sweep(1_150), 1);
        assert_eq!(rec.take(), vec![HapticPulse::Impact(ImpactStyle::Medium)]);

        d.sweep(6_000);
        assert_eq!(d.counts().confetti, 0);
    }

    #[test]
    fn hour_rollover_launches_rockets_that_explode() {
        let (mut d, rec) = dispatcher();
        d.handle(&sample(3_599, vec![BoundaryEvent::HourRollover]), 0);
        assert_eq!(d.counts().rockets, 3);
        assert_eq!(d.counts().pending, 3 + 2);
        assert!(d.snapshot(0).shaking);
        assert!(!d.snapshot(600).shaking);

        d.sweep(1_500);
        assert_eq!(d.counts().explosions, 1);
        d.sweep(1_900);
        assert_eq!(d.counts().explosions, 3);
        assert_eq!(
            rec.take(),
            vec![HapticPulse::Impact(ImpactStyle::Heavy); 3]
        );

        d.sweep(3_000);
        assert_eq!(d.counts().rockets, 0);
        d.sweep(3_400);
        assert_eq!(d.counts(), EffectCounts::default());
    }

    #[test]
    fn final_countdown_feedback_once_per_second() {
        let (mut d, rec) = dispatcher();
        let tick = |s: u32| sample(s as u64, vec![BoundaryEvent::FinalCountdownTick { seconds_left: s }]);

        d.handle(&tick(8), 0);
        d.handle(&tick(8), 100);
        d.handle(&tick(8), 200);
        assert_eq!(rec.take(), vec![HapticPulse::Impact(ImpactStyle::Medium)]);
        assert!((d.intensity() - 0.2).abs() < 1e-6);

        d.handle(&tick(4), 4_000);
        assert_eq!(rec.take(), vec![HapticPulse::Impact(ImpactStyle::Heavy)]);
        assert!(!d.snapshot(4_000).shaking);

        d.handle(&tick(3), 5_000);
        assert!(d.snapshot(5_050).shaking);
        assert!(!d.snapshot(5_100).shaking);

        d.handle(&tick(1), 7_000);
        assert_eq!(
            rec.take(),
            vec![
                HapticPulse::Impact(ImpactStyle::Heavy),
                HapticPulse::Vibrate(Duration::from_millis(500))
            ]
        );
        assert!((d.intensity() - 0.9).abs() < 1e-6);

        d.handle(&sample(20, vec![]), 8_000);
        assert_eq!(d.intensity(), 0.0);
    }

    #[test]
    fn completion_celebrates_exactly_once() {
        let (mut d, rec) = dispatcher();
        d.handle(&sample(0, vec![BoundaryEvent::Completed]), 0);
        assert_eq!(d.mode(), DisplayMode::Complete);
        assert_eq!(d.counts().confetti, 150);
        assert_eq!(d.counts().rockets, 3);
        assert_eq!(d.snapshot(0).flash, Some(FlashKind::Celebration));
        assert_eq!(d.snapshot(499).flash, Some(FlashKind::Celebration));
        assert_eq!(rec.take(), vec![HapticPulse::Impact(ImpactStyle::Heavy)]);

        d.handle(&sample(0, vec![BoundaryEvent::Completed]), 100);
        assert_eq!(d.counts().confetti, 150);

        // All five volleys are in the air by 2s.
        d.sweep(2_000);
        assert_eq!(d.counts().rockets, 15);
        let pulses = rec.take();
        assert_eq!(pulses.len(), 6);
        assert_eq!(pulses[4], HapticPulse::Notify(NotificationKind::Success));
        assert_eq!(pulses[5], HapticPulse::Vibrate(Duration::from_millis(1_000)));
    }

    #[test]
    fn celebration_replaces_falling_minute_confetti() {
        let (mut d, _) = dispatcher();
        d.handle(&sample(59, vec![BoundaryEvent::MinuteRollover]), 0);
        assert_eq!(d.counts().confetti, 49);

        d.handle(&sample(0, vec![BoundaryEvent::Completed]), 1_000);
        assert_eq!(d.counts().confetti, 150);
        assert_eq!(d.snapshot(1_000).confetti.len(), 150);
    }

    #[test]
    fn nothing_outlives_its_ttl() {
        let (mut d, _) = dispatcher();
        d.handle(&sample(0, vec![BoundaryEvent::Completed]), 0);
        let mut now = 0;
        while now <= 20_000 {
            d.sweep(now);
            now += 100;
        }
        assert_eq!(d.counts(), EffectCounts::default());
        assert_eq!(d.mode(), DisplayMode::Complete);
    }

    #[test]
    fn reset_drops_pending_follow_ups() {
        let (mut d, rec) = dispatcher();
        d.handle(&sample(0, vec![BoundaryEvent::Completed]), 0);
        rec.take();
        d.reset();
        assert_eq!(d.mode(), DisplayMode::Counting);
        assert_eq!(d.counts(), EffectCounts::default());
        assert_eq!(d.sweep(10_000), 0);
        assert!(rec.take().is_empty());
        assert_eq!(d.snapshot(0).stars.len(), 60);
    }

    #[test]
    fn drives_from_a_real_clock_run() {
        let (mut d, _) = dispatcher();
        let mut clock = BoundaryClock::new(TargetInstant::from_millis(100_000));
        // 75 seconds at 100 ms cadence, through completion.
        let mut now = 25_000;
        while now <= 101_000 {
            let s = clock.sample(now);
            d.handle(&s, now);
            d.sweep(now);
            now += 100;
        }
        assert_eq!(d.mode(), DisplayMode::Complete);
        assert!(d.counts().confetti >= 150);
    }
}
