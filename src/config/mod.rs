/// Engine configuration
use std::env;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::eclipselib::ShadowModel;
use crate::filters::{DEFAULT_FORECAST_TOLERANCE_MINUTES, DEFAULT_MOON_ILLUMINATION_THRESHOLD};
use crate::passes::{DetectorConfig, TruncationPolicy};
use crate::sgp4lib::DEFAULT_MAX_EPOCH_AGE_DAYS;

/// Default prediction horizon in days
pub const DEFAULT_HORIZON_DAYS: f64 = 10.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub detector: DetectorConfig,
    pub horizon_days: f64,
    /// Element sets further than this from the query are refused
    pub max_epoch_age_days: f64,
    pub forecast_tolerance_minutes: i64,
    pub moon_illumination_threshold: f64,
    /// Deadline for one weather lookup when the provider is wrapped in a timeout
    pub weather_timeout_seconds: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            detector: DetectorConfig::default(),
            horizon_days: DEFAULT_HORIZON_DAYS,
            max_epoch_age_days: DEFAULT_MAX_EPOCH_AGE_DAYS,
            forecast_tolerance_minutes: DEFAULT_FORECAST_TOLERANCE_MINUTES,
            moon_illumination_threshold: DEFAULT_MOON_ILLUMINATION_THRESHOLD,
            weather_timeout_seconds: 10.0,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `SKYWINDOW_*` environment variables, reading
    /// a `.env` file first if one exists.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    ///
    /// Missing variables keep their defaults; unparsable or out-of-range
    /// values are logged and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = EngineConfig::default();

        let min_altitude_deg = env_parse(
            &lookup,
            "SKYWINDOW_MIN_ALTITUDE_DEG",
            d.detector.min_altitude_deg,
        );
        let min_altitude_deg = if (0.0..=90.0).contains(&min_altitude_deg) {
            min_altitude_deg
        } else {
            warn!(
                "SKYWINDOW_MIN_ALTITUDE_DEG={} is outside 0-90, using {}",
                min_altitude_deg, d.detector.min_altitude_deg
            );
            d.detector.min_altitude_deg
        };

        let detector = DetectorConfig {
            step_seconds: positive(
                "SKYWINDOW_STEP_SECONDS",
                env_parse(&lookup, "SKYWINDOW_STEP_SECONDS", d.detector.step_seconds),
                d.detector.step_seconds,
            ),
            min_altitude_deg,
            truncation: env_parse::<TruncationPolicy, _>(
                &lookup,
                "SKYWINDOW_TRUNCATION",
                d.detector.truncation,
            ),
            shadow: env_parse::<ShadowModel, _>(&lookup, "SKYWINDOW_SHADOW_MODEL", d.detector.shadow),
        };

        EngineConfig {
            detector,
            horizon_days: positive(
                "SKYWINDOW_HORIZON_DAYS",
                env_parse(&lookup, "SKYWINDOW_HORIZON_DAYS", d.horizon_days),
                d.horizon_days,
            ),
            max_epoch_age_days: positive(
                "SKYWINDOW_MAX_EPOCH_AGE_DAYS",
                env_parse(&lookup, "SKYWINDOW_MAX_EPOCH_AGE_DAYS", d.max_epoch_age_days),
                d.max_epoch_age_days,
            ),
            forecast_tolerance_minutes: env_parse(
                &lookup,
                "SKYWINDOW_FORECAST_TOLERANCE_MINUTES",
                d.forecast_tolerance_minutes,
            )
            .max(0),
            moon_illumination_threshold: fraction(
                "SKYWINDOW_MOON_THRESHOLD",
                env_parse(&lookup, "SKYWINDOW_MOON_THRESHOLD", d.moon_illumination_threshold),
                d.moon_illumination_threshold,
            ),
            weather_timeout_seconds: positive(
                "SKYWINDOW_WEATHER_TIMEOUT_SECONDS",
                env_parse(
                    &lookup,
                    "SKYWINDOW_WEATHER_TIMEOUT_SECONDS",
                    d.weather_timeout_seconds,
                ),
                d.weather_timeout_seconds,
            ),
        }
    }

    pub fn forecast_tolerance(&self) -> Duration {
        Duration::minutes(self.forecast_tolerance_minutes)
    }

    /// Falls back to the default when the configured value is not a usable
    /// duration, which can happen for deserialized configs.
    pub fn weather_timeout(&self) -> std::time::Duration {
        let fallback = EngineConfig::default().weather_timeout_seconds;
        std::time::Duration::try_from_secs_f64(self.weather_timeout_seconds)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or_else(|| {
                warn!(
                    "weather timeout {} s is not usable, using {} s",
                    self.weather_timeout_seconds, fallback
                );
                std::time::Duration::from_secs_f64(fallback)
            })
    }
}

fn env_parse<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("{}={:?} is not valid, using {:?}", key, raw, default);
                default
            }
        },
    }
}

fn positive(key: &str, value: f64, default: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        warn!("{} must be positive and finite, using {}", key, default);
        default
    }
}

fn fraction(key: &str, value: f64, default: f64) -> f64 {
    if value.is_nan() {
        warn!("{} is not a number, using {}", key, default);
        default
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[]));
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.detector.step_seconds, 30.0);
        assert_eq!(config.horizon_days, 10.0);
        assert_eq!(config.max_epoch_age_days, 30.0);
        assert_eq!(config.forecast_tolerance(), Duration::minutes(45));
        assert_eq!(config.detector.truncation, TruncationPolicy::Exclude);
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("SKYWINDOW_STEP_SECONDS", "15"),
            ("SKYWINDOW_MIN_ALTITUDE_DEG", "10"),
            ("SKYWINDOW_TRUNCATION", "flag"),
            ("SKYWINDOW_SHADOW_MODEL", "conical"),
            ("SKYWINDOW_HORIZON_DAYS", "3.5"),
            ("SKYWINDOW_MOON_THRESHOLD", "0.75"),
        ]));
        assert_eq!(config.detector.step_seconds, 15.0);
        assert_eq!(config.detector.min_altitude_deg, 10.0);
        assert_eq!(config.detector.truncation, TruncationPolicy::Flag);
        assert_eq!(config.detector.shadow, ShadowModel::Conical);
        assert_eq!(config.horizon_days, 3.5);
        assert_eq!(config.moon_illumination_threshold, 0.75);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("SKYWINDOW_STEP_SECONDS", "fast"),
            ("SKYWINDOW_MIN_ALTITUDE_DEG", "120"),
            ("SKYWINDOW_TRUNCATION", "maybe"),
            ("SKYWINDOW_HORIZON_DAYS", "-2"),
            ("SKYWINDOW_MAX_EPOCH_AGE_DAYS", "NaN"),
            ("SKYWINDOW_WEATHER_TIMEOUT_SECONDS", "inf"),
            ("SKYWINDOW_MOON_THRESHOLD", "NaN"),
        ]));
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.weather_timeout(), std::time::Duration::from_secs(10));

        let config = EngineConfig::from_lookup(lookup(&[
            ("SKYWINDOW_STEP_SECONDS", "inf"),
            ("SKYWINDOW_HORIZON_DAYS", "inf"),
        ]));
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_unusable_timeout_falls_back() {
        for seconds in [f64::INFINITY, f64::NAN, -1.0, 0.0, 1e30] {
            let config = EngineConfig {
                weather_timeout_seconds: seconds,
                ..Default::default()
            };
            assert_eq!(config.weather_timeout(), std::time::Duration::from_secs(10));
        }
        let config = EngineConfig {
            weather_timeout_seconds: 2.5,
            ..Default::default()
        };
        assert_eq!(config.weather_timeout(), std::time::Duration::from_millis(2500));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"horizon_days": 5, "detector": {"min_altitude_deg": 10}}"#)
                .unwrap();
        assert_eq!(config.horizon_days, 5.0);
        assert_eq!(config.detector.min_altitude_deg, 10.0);
        assert_eq!(config.detector.step_seconds, 30.0);
    }
}
