//! The boundary clock: remaining-time decomposition and crossing detection.
//!
//! The sampler calls [`BoundaryClock::sample`] every 100 ms with the corrected
//! "now". Each sample is decomposed into hours/minutes/seconds and diffed
//! against the remembered previous sample to detect discrete crossings. The
//! sampler runs ten times faster than the finest boundary, so the detector
//! only remembers the previous values when the seconds digit actually changes;
//! the nine redundant samples within a second are therefore inert.
//!
//! Detection order within a sample is fixed:
//!
//! ```text
//! SecondTick -> MinuteRollover -> HourRollover -> LastMinuteEntered
//!            -> FinalCountdownTick -> Completed
//! ```
//!
//! If the process is suspended across several boundaries the skipped ones are
//! not replayed; only "previous remembered" and "current" are compared.

use crate::common::EpochMillis;
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

/// The fixed instant being counted down to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TargetInstant(EpochMillis);

impl TargetInstant {
    pub fn from_millis(millis: EpochMillis) -> Self {
        Self(millis)
    }

    /// January 1st 00:00:00 of `year`, as wall-clock time in `tz`.
    ///
    /// Returns `None` if local midnight does not exist or is ambiguous there.
    pub fn new_year<Tz: TimeZone>(year: i32, tz: &Tz) -> Option<Self> {
        tz.with_ymd_and_hms(year, 1, 1, 0, 0, 0)
            .single()
            .map(|dt| Self(dt.timestamp_millis()))
    }

    pub fn as_millis(self) -> EpochMillis {
        self.0
    }

    pub fn to_utc(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.0)
    }
}

/// Seconds in the proximity lookback window.
const PROXIMITY_WINDOW_SECS: u64 = 24 * 3600;

/// A decomposed view of the time left until the target.
///
/// Invariant: `total_seconds == hours * 3600 + minutes * 60 + seconds`, and
/// every field is zero once the target has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemainingTime {
    pub hours: u64,
    pub minutes: u32,
    pub seconds: u32,
    pub total_seconds: u64,
}

impl RemainingTime {
    pub const ZERO: RemainingTime = RemainingTime {
        hours: 0,
        minutes: 0,
        seconds: 0,
        total_seconds: 0,
    };

    /// Floors a millisecond difference to whole seconds and decomposes it.
    pub fn from_diff_millis(diff: i64) -> Self {
        if diff <= 0 {
            return Self::ZERO;
        }
        Self::from_total_seconds((diff / 1000) as u64)
    }

    pub fn from_total_seconds(total_seconds: u64) -> Self {
        Self {
            hours: total_seconds / 3600,
            minutes: ((total_seconds % 3600) / 60) as u32,
            seconds: (total_seconds % 60) as u32,
            total_seconds,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total_seconds == 0
    }

    pub fn is_last_minute(&self) -> bool {
        self.total_seconds > 0 && self.total_seconds <= 60
    }

    pub fn is_final_countdown(&self) -> bool {
        self.total_seconds > 0 && self.total_seconds <= 10
    }

    /// How far the current minute has run, 0..=100.
    pub fn seconds_progress(&self) -> f32 {
        (60 - self.seconds) as f32 / 60.0 * 100.0
    }

    /// Closeness to the target over a rolling 24-hour window: 0.0 at 24h or
    /// more, rising linearly to 1.0 at the target.
    pub fn proximity(&self) -> f32 {
        if self.total_seconds >= PROXIMITY_WINDOW_SECS {
            return 0.0;
        }
        1.0 - self.total_seconds as f32 / PROXIMITY_WINDOW_SECS as f32
    }

    /// Visual escalation scalar for the final ten seconds, `(10 - left) / 10`.
    pub fn final_intensity(&self) -> f32 {
        if self.is_final_countdown() {
            (10 - self.total_seconds) as f32 / 10.0
        } else {
            0.0
        }
    }
}

impl fmt::Display for RemainingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

/// A discrete crossing detected between two samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryEvent {
    SecondTick,
    MinuteRollover,
    HourRollover,
    LastMinuteEntered,
    FinalCountdownTick { seconds_left: u32 },
    Completed,
}

/// The previous sample's digits, `None` until the first sample after a reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SampleHistory {
    last_second: Option<u32>,
    last_minute: Option<u32>,
}

/// One-shot latches scoped to the current target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Latches {
    last_minute_entered: bool,
    completed: bool,
}

/// The output of one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub remaining: RemainingTime,
    pub events: Vec<BoundaryEvent>,
}

impl Sample {
    pub fn contains(&self, event: BoundaryEvent) -> bool {
        self.events.contains(&event)
    }
}

/// Derives remaining time from a fixed target and detects boundary crossings.
#[derive(Debug, Clone)]
pub struct BoundaryClock {
    target: TargetInstant,
    history: SampleHistory,
    latches: Latches,
}

impl BoundaryClock {
    pub fn new(target: TargetInstant) -> Self {
        Self {
            target,
            history: SampleHistory::default(),
            latches: Latches::default(),
        }
    }

    pub fn target(&self) -> TargetInstant {
        self.target
    }

    /// Whether `Completed` has been emitted for the current target.
    pub fn is_complete(&self) -> bool {
        self.latches.completed
    }

    /// Remaining time at `corrected_now`, without touching detector state.
    pub fn remaining_at(&self, corrected_now: EpochMillis) -> RemainingTime {
        RemainingTime::from_diff_millis(self.target.0 - corrected_now)
    }

    /// Samples the countdown and returns every boundary crossed since the
    /// previous sample.
    pub fn sample(&mut self, corrected_now: EpochMillis) -> Sample {
        let remaining = self.remaining_at(corrected_now);
        let mut events = Vec::new();

        let second_changed = self.history.last_second != Some(remaining.seconds);
        if second_changed && remaining.total_seconds > 0 {
            events.push(BoundaryEvent::SecondTick);

            if let Some(last_minute) = self.history.last_minute {
                if last_minute != remaining.minutes {
                    events.push(BoundaryEvent::MinuteRollover);
                }
                // Counting down, the minute digit wraps from 0 to 59 when an
                // hour boundary is crossed.
                if last_minute == 0 && remaining.minutes == 59 {
                    events.push(BoundaryEvent::HourRollover);
                }
            }
        }

        if remaining.is_last_minute() && !self.latches.last_minute_entered {
            self.latches.last_minute_entered = true;
            events.push(BoundaryEvent::LastMinuteEntered);
        }

        // Level-triggered: repeats on every sample inside the window.
        if remaining.is_final_countdown() {
            events.push(BoundaryEvent::FinalCountdownTick {
                seconds_left: remaining.total_seconds as u32,
            });
        }

        if remaining.is_complete() && !self.latches.completed {
            self.latches.completed = true;
            events.push(BoundaryEvent::Completed);
        }

        if second_changed {
            self.history = SampleHistory {
                last_second: Some(remaining.seconds),
                last_minute: Some(remaining.minutes),
            };
        }

        Sample { remaining, events }
    }

    /// Re-arms the detector, optionally against a new target.
    ///
    /// Latches and remembered digits are replaced in one assignment so no
    /// sample can ever see a mix of old and new state.
    pub fn reset(&mut self, new_target: Option<TargetInstant>) {
        *self = Self::new(new_target.unwrap_or(self.target));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BoundaryEvent::*;

    const TARGET: EpochMillis = 1_767_225_600_000;

    fn new_clock() -> BoundaryClock {
        BoundaryClock::new(TargetInstant::from_millis(TARGET))
    }

    /// Corrected "now" such that exactly `secs` whole seconds remain.
    fn at_remaining(secs: u64) -> EpochMillis {
        TARGET - (secs as i64) * 1000
    }

    /// Samples every second from `from` down to `to`, inclusive.
    fn run_seconds(clock: &mut BoundaryClock, from: u64, to: u64) -> Vec<Sample> {
        (to..=from)
            .rev()
            .map(|secs| clock.sample(at_remaining(secs)))
            .collect()
    }

    fn count(samples: &[Sample], event: BoundaryEvent) -> usize {
        samples
            .iter()
            .flat_map(|s| s.events.iter())
            .filter(|e| **e == event)
            .count()
    }

    #[test]
    fn decomposition_invariant_holds() {
        for diff in [1, 999, 1_000, 59_999, 61_000, 3_599_999, 3_600_000, 90_061_500] {
            let r = RemainingTime::from_diff_millis(diff);
            assert_eq!(
                r.total_seconds,
                r.hours * 3600 + r.minutes as u64 * 60 + r.seconds as u64
            );
            assert!(r.minutes < 60 && r.seconds < 60);
        }
        let r = RemainingTime::from_diff_millis(90_061_500);
        assert_eq!((r.hours, r.minutes, r.seconds), (25, 1, 1));
        assert_eq!(r.to_string(), "25:01:01");
    }

    #[test]
    fn past_target_clamps_to_zero() {
        let mut clock = new_clock();
        for now in [TARGET, TARGET + 1, TARGET + 86_400_000] {
            let sample = clock.sample(now);
            assert_eq!(sample.remaining, RemainingTime::ZERO);
            assert!(sample.remaining.is_complete());
        }
        assert!(clock.is_complete());
    }

    #[test]
    fn positive_remaining_before_target() {
        let clock = new_clock();
        assert!(clock.remaining_at(TARGET - 1_000).total_seconds > 0);
        assert_eq!(clock.remaining_at(TARGET - 1_500).total_seconds, 1);
    }

    #[test]
    fn first_sample_never_rolls_over() {
        let mut clock = new_clock();
        let sample = clock.sample(at_remaining(3_600 + 59 * 60));
        assert_eq!(sample.events, vec![SecondTick]);
    }

    #[test]
    fn minute_rollover_fires_once_across_minute_boundary() {
        let mut clock = new_clock();
        let samples = run_seconds(&mut clock, 65, 0);
        assert_eq!(count(&samples, MinuteRollover), 1);
        // 60s remaining is 1:00, 59s is 0:59.
        let rollover_at = samples.iter().position(|s| s.contains(MinuteRollover));
        assert_eq!(samples[rollover_at.unwrap()].remaining.total_seconds, 59);
    }

    #[test]
    fn sub_second_sampling_does_not_repeat_events() {
        let mut clock = new_clock();
        let mut seconds = 0;
        let mut minutes = 0;
        // 70 seconds at 100 ms cadence, starting mid-second.
        let start = at_remaining(70) - 50;
        for step in 0..700 {
            let sample = clock.sample(start + step * 100);
            seconds += sample.events.iter().filter(|e| **e == SecondTick).count();
            minutes += sample.events.iter().filter(|e| **e == MinuteRollover).count();
        }
        assert_eq!(seconds, 70);
        assert_eq!(minutes, 1);
    }

    #[test]
    fn hour_rollover_on_minute_wrap() {
        let mut clock = new_clock();
        let samples = run_seconds(&mut clock, 3_605, 3_595);
        assert_eq!(count(&samples, HourRollover), 1);
        assert_eq!(count(&samples, MinuteRollover), 1);
        let sample = samples.iter().find(|s| s.contains(HourRollover)).unwrap();
        assert_eq!((sample.remaining.hours, sample.remaining.minutes), (0, 59));
        assert_eq!(sample.events, vec![SecondTick, MinuteRollover, HourRollover]);
    }

    #[test]
    fn last_minute_entered_fires_once() {
        let mut clock = new_clock();
        let samples = run_seconds(&mut clock, 75, 1);
        assert_eq!(count(&samples, LastMinuteEntered), 1);
        let first = samples.iter().find(|s| s.contains(LastMinuteEntered)).unwrap();
        assert_eq!(first.remaining.total_seconds, 60);
    }

    #[test]
    fn final_countdown_is_level_triggered() {
        let mut clock = new_clock();
        let samples = run_seconds(&mut clock, 10, 1);
        let ticks: Vec<u32> = samples
            .iter()
            .flat_map(|s| s.events.iter())
            .filter_map(|e| match e {
                FinalCountdownTick { seconds_left } => Some(*seconds_left),
                _ => None,
            })
            .collect();
        assert_eq!(ticks, (1..=10).rev().collect::<Vec<_>>());

        // Repeated samples within the same second keep firing.
        let mut clock = new_clock();
        let a = clock.sample(at_remaining(5));
        let b = clock.sample(at_remaining(5) - 300);
        assert!(a.contains(FinalCountdownTick { seconds_left: 5 }));
        assert!(b.contains(FinalCountdownTick { seconds_left: 5 }));
        assert!(!b.contains(SecondTick));
    }

    #[test]
    fn completed_fires_once_and_sampling_may_continue() {
        let mut clock = new_clock();
        let mut samples = run_seconds(&mut clock, 3, 0);
        for extra in 1..=5 {
            samples.push(clock.sample(TARGET + extra * 100));
        }
        assert_eq!(count(&samples, Completed), 1);
        let last = samples.last().unwrap();
        assert!(last.events.is_empty());
    }

    #[test]
    fn completion_sample_does_not_tick() {
        let mut clock = new_clock();
        clock.sample(at_remaining(1));
        let sample = clock.sample(TARGET);
        assert_eq!(sample.events, vec![Completed]);
    }

    #[test]
    fn target_already_passed_at_startup() {
        let mut clock = new_clock();
        let sample = clock.sample(TARGET + 5_000);
        assert_eq!(sample.events, vec![Completed]);
    }

    #[test]
    fn reset_rearms_latches() {
        let mut clock = new_clock();
        let first = run_seconds(&mut clock, 61, 0);
        assert_eq!(count(&first, LastMinuteEntered), 1);
        assert_eq!(count(&first, Completed), 1);

        let new_target = TargetInstant::from_millis(TARGET + 120_000);
        clock.reset(Some(new_target));
        assert_eq!(clock.target(), new_target);
        assert!(!clock.is_complete());

        let second: Vec<Sample> = (0..=61)
            .rev()
            .map(|secs| clock.sample(new_target.as_millis() - secs * 1000))
            .collect();
        assert_eq!(count(&second, LastMinuteEntered), 1);
        assert_eq!(count(&second, Completed), 1);
    }

    #[test]
    fn reset_without_target_keeps_target() {
        let mut clock = new_clock();
        clock.sample(at_remaining(30));
        clock.reset(None);
        assert_eq!(clock.target().as_millis(), TARGET);
        // Memory is cleared, so the next sample is a "first" sample again.
        let sample = clock.sample(at_remaining(30));
        assert!(sample.contains(SecondTick));
        assert!(sample.contains(LastMinuteEntered));
    }

    #[test]
    fn suspended_gap_is_not_replayed() {
        let mut clock = new_clock();
        clock.sample(at_remaining(3 * 3600 + 10));
        // Two hours vanish; the minute digit matches, so nothing rolls over.
        let sample = clock.sample(at_remaining(3600 + 9));
        assert_eq!(sample.events, vec![SecondTick]);
        let sample = clock.sample(at_remaining(3548));
        assert!(sample.contains(MinuteRollover));
        assert!(sample.contains(HourRollover));
    }

    #[test]
    fn presentation_helpers() {
        let r = RemainingTime::from_total_seconds(45);
        assert!(r.is_last_minute());
        assert!(!r.is_final_countdown());
        assert_eq!(r.seconds_progress(), 25.0);

        let r = RemainingTime::from_total_seconds(12 * 3600);
        assert!((r.proximity() - 0.5).abs() < f32::EPSILON);
        assert_eq!(RemainingTime::from_total_seconds(48 * 3600).proximity(), 0.0);

        assert_eq!(RemainingTime::from_total_seconds(4).final_intensity(), 0.6);
        assert_eq!(RemainingTime::from_total_seconds(11).final_intensity(), 0.0);
        assert_eq!(RemainingTime::ZERO.final_intensity(), 0.0);
    }

    #[test]
    fn new_year_in_zone() {
        let target = TargetInstant::new_year(2026, &chrono_tz::America::New_York).unwrap();
        let expected = Utc.with_ymd_and_hms(2026, 1, 1, 5, 0, 0).unwrap();
        assert_eq!(target.to_utc(), Some(expected));
    }
}
