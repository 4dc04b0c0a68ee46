//! Defines all configuration structures for the countdown engine.
//!
//! These structs are designed to be deserialized from a configuration file
//! (e.g., a TOML file) using `serde`, layered with `COUNTDOWN_*` environment
//! overrides through the `config` crate. Every field has a default, so an
//! empty configuration describes a valid countdown to the next New Year in UTC.

use crate::components::boundary::TargetInstant;
use crate::error::ConfigError;
use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// The only sampler cadence boundary detection is defined for.
///
/// The hour-rollover rule (minute 0 -> 59) assumes samples far finer than a
/// minute, and sub-second samples keep the second digit from lagging.
pub const SAMPLE_INTERVAL_MS: u64 = 100;

/// The top-level configuration for the `CountdownEngine`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CountdownConfig {
    /// The consumer's local timezone (IANA name, e.g. "Europe/Berlin").
    /// Used to build the New Year instant and to key the time authority query.
    pub timezone: Tz,

    /// The year whose January 1st 00:00 local is counted down to.
    /// `None` means the next New Year after startup.
    pub target_year: Option<i32>,

    /// Sampler cadence in milliseconds. Must equal [`SAMPLE_INTERVAL_MS`].
    pub sample_interval_ms: u64,

    /// Seconds between clock synchronisations. The interval is also the only
    /// retry mechanism after a failed sync.
    pub sync_interval_secs: u64,

    /// Base URL of a worldtimeapi-compatible time authority.
    pub time_authority_url: String,

    /// Whether haptic feedback should be attempted at all.
    pub haptics_enabled: bool,

    /// Whether the motion sensor should drive parallax and shake detection.
    pub motion_enabled: bool,

    /// Fallback log filter when `RUST_LOG` is not set.
    pub log_level: String,

    /// Quantities, lifetimes and durations for the effect generators.
    pub effects: EffectConfig,
}

/// Presentation tuning for the effect generators.
///
/// Quantities that are part of the countdown's contract (rockets per volley,
/// celebration volleys, proximity-scaled confetti bounds) live here too so they
/// can be asserted against in one place.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EffectConfig {
    /// Confetti pieces per minute rollover when the target is 24h or more away.
    pub confetti_base: u32,
    /// Confetti pieces per minute rollover at the target instant.
    pub confetti_max: u32,
    /// Lifetime of a minute-rollover confetti piece.
    pub confetti_ttl_ms: u64,
    /// Confetti pieces in the completion burst.
    pub celebration_confetti: u32,
    /// Lifetime of a celebration confetti piece.
    pub celebration_confetti_ttl_ms: u64,
    /// Rockets launched per volley.
    pub rockets_per_volley: u32,
    /// Volleys launched on completion.
    pub celebration_volleys: u32,
    /// Delay between celebration volleys.
    pub celebration_volley_stagger_ms: u64,
    /// Time from launch until the first rocket of a volley explodes.
    pub rocket_flight_ms: u64,
    /// Additional flight time for each subsequent rocket in a volley.
    pub rocket_flight_stagger_ms: u64,
    /// Lifetime of a rocket.
    pub rocket_ttl_ms: u64,
    /// Lifetime of an explosion.
    pub explosion_ttl_ms: u64,
    /// Sparks per explosion.
    pub explosion_sparks: u32,
    /// Stars in the background field.
    pub star_count: u32,
    /// Duration of the flash on a minute rollover.
    pub minute_flash_ms: u64,
    /// Duration of the flash on completion.
    pub celebration_flash_ms: u64,
    /// Duration of the shake on an hour rollover.
    pub hour_shake_ms: u64,
    /// Duration of the shake for each of the last three seconds.
    pub final_shake_ms: u64,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            target_year: None,
            sample_interval_ms: SAMPLE_INTERVAL_MS,
            sync_interval_secs: 5 * 60,
            time_authority_url: "https://worldtimeapi.org".to_string(),
            haptics_enabled: true,
            motion_enabled: true,
            log_level: "info".to_string(),
            effects: EffectConfig::default(),
        }
    }
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            confetti_base: 8,
            confetti_max: 50,
            confetti_ttl_ms: 5_000,
            celebration_confetti: 150,
            celebration_confetti_ttl_ms: 8_000,
            rockets_per_volley: 3,
            celebration_volleys: 5,
            celebration_volley_stagger_ms: 500,
            rocket_flight_ms: 1_500,
            rocket_flight_stagger_ms: 200,
            rocket_ttl_ms: 3_000,
            explosion_ttl_ms: 1_500,
            explosion_sparks: 20,
            star_count: 60,
            minute_flash_ms: 200,
            celebration_flash_ms: 500,
            hour_shake_ms: 600,
            final_shake_ms: 100,
        }
    }
}

fn default_timezone() -> Tz {
    Tz::UTC
}

impl CountdownConfig {
    /// Loads configuration from an optional TOML file, then applies
    /// `COUNTDOWN_*` environment overrides (`__` separates nested keys, e.g.
    /// `COUNTDOWN_EFFECTS__CONFETTI_MAX=80`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let loaded: CountdownConfig = builder
            .add_source(
                config::Environment::with_prefix("COUNTDOWN")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Rejects configurations the boundary detector cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_interval_ms != SAMPLE_INTERVAL_MS {
            return Err(ConfigError::InvalidSampleInterval {
                expected: SAMPLE_INTERVAL_MS,
                actual: self.sample_interval_ms,
            });
        }
        if self.sync_interval_secs == 0 {
            return Err(ConfigError::InvalidSyncInterval);
        }
        Ok(())
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    /// Builds the immutable target instant for this run.
    ///
    /// Without an explicit `target_year`, the target is the New Year following
    /// `now` as seen in the configured timezone.
    pub fn target_instant(&self, now: DateTime<Utc>) -> Result<TargetInstant, ConfigError> {
        let year = self
            .target_year
            .unwrap_or_else(|| now.with_timezone(&self.timezone).year() + 1);
        TargetInstant::new_year(year, &self.timezone).ok_or(ConfigError::InvalidTarget(year))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn defaults_are_valid() {
        let config = CountdownConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sample_interval(), Duration::from_millis(100));
        assert_eq!(config.sync_interval(), Duration::from_secs(300));
        assert_eq!(config.effects.rockets_per_volley, 3);
        assert_eq!(config.effects.celebration_volleys, 5);
    }

    #[test]
    fn rejects_coarsened_sampler() {
        let config = CountdownConfig {
            sample_interval_ms: 1_000,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSampleInterval { actual: 1_000, .. })
        ));
    }

    #[test]
    fn rejects_zero_sync_interval() {
        let config = CountdownConfig {
            sync_interval_secs: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSyncInterval)));
    }

    #[test]
    fn default_target_is_next_new_year_in_zone() {
        let config = CountdownConfig {
            timezone: chrono_tz::Europe::Berlin,
            ..Default::default()
        };
        // 23:30 UTC on Dec 31st is already Jan 1st in Berlin.
        let now = Utc.with_ymd_and_hms(2025, 12, 31, 23, 30, 0).unwrap();
        let target = config.target_instant(now).unwrap();
        let expected = Utc.with_ymd_and_hms(2026, 12, 31, 23, 0, 0).unwrap();
        assert_eq!(target.as_millis(), expected.timestamp_millis());
    }

    #[test]
    fn explicit_target_year_wins() {
        let config = CountdownConfig {
            target_year: Some(2026),
            ..Default::default()
        };
        let now = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap();
        let target = config.target_instant(now).unwrap();
        let expected = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(target.as_millis(), expected.timestamp_millis());
    }

    #[test]
    fn loads_from_toml_file() {
        let dir = std::env::temp_dir().join(format!("countdown-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("countdown.toml");
        std::fs::write(
            &path,
            "timezone = \"Europe/Berlin\"\ntarget_year = 2027\n\n[effects]\nconfetti_max = 80\n",
        )
        .unwrap();

        let config = CountdownConfig::load(Some(&path)).unwrap();
        assert_eq!(config.timezone, chrono_tz::Europe::Berlin);
        assert_eq!(config.target_year, Some(2027));
        assert_eq!(config.effects.confetti_max, 80);
        assert_eq!(config.effects.confetti_base, 8);
        assert_eq!(config.sample_interval_ms, SAMPLE_INTERVAL_MS);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn environment_overrides_top_level_and_nested_keys() {
        // Same confetti_max as the TOML test above, which may run concurrently.
        std::env::set_var("COUNTDOWN_EFFECTS__CONFETTI_MAX", "80");
        std::env::set_var("COUNTDOWN_SYNC_INTERVAL_SECS", "120");
        let loaded = CountdownConfig::load(None);
        std::env::remove_var("COUNTDOWN_EFFECTS__CONFETTI_MAX");
        std::env::remove_var("COUNTDOWN_SYNC_INTERVAL_SECS");

        let config = loaded.unwrap();
        assert_eq!(config.effects.confetti_max, 80);
        assert_eq!(config.sync_interval(), Duration::from_secs(120));
        assert_eq!(config.effects.confetti_base, 8);
    }
}
