//! Sky condition forecasts
//!
//! The engine never talks to a weather service itself. It asks a
//! [`WeatherProvider`] for the sample nearest a pass's peak and judges the
//! distance itself. [`HourlyForecast`] is an in-memory provider over
//! `timestamp,condition` lines, the shape hourly forecast services reduce to.

use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Mutex;
use std::thread;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::toposlib::ObserverLocation;
use crate::{Result, SkywindowError};

/// Sky state at one hour.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkyCondition {
    Clear,
    PartiallyCloudy,
    Overcast,
    Rain,
    Snow,
    Fog,
    Other(String),
    /// No forecast was available
    #[default]
    Unknown,
}

impl SkyCondition {
    /// Interpret a provider condition tag such as `"Partially cloudy"` or
    /// `"Rain, Overcast"`.
    ///
    /// Compound tags resolve to the most obstructive component, so
    /// `"Snow, Partially cloudy"` is `Snow`.
    pub fn parse(tag: &str) -> Self {
        let tag = tag.trim();
        if tag.is_empty() {
            return SkyCondition::Unknown;
        }

        let parts: Vec<String> = tag
            .split(',')
            .map(|p| p.trim().to_ascii_lowercase())
            .collect();
        let has = |needle: &str| parts.iter().any(|p| p.contains(needle));

        if has("snow") || has("ice") {
            SkyCondition::Snow
        } else if has("rain") || has("drizzle") || has("shower") || has("thunder") {
            SkyCondition::Rain
        } else if has("fog") || has("mist") {
            SkyCondition::Fog
        } else if has("overcast") {
            SkyCondition::Overcast
        } else if has("cloud") {
            SkyCondition::PartiallyCloudy
        } else if parts.iter().all(|p| p == "clear") {
            SkyCondition::Clear
        } else if has("unknown") {
            SkyCondition::Unknown
        } else {
            SkyCondition::Other(tag.to_string())
        }
    }

    pub fn is_clear(&self) -> bool {
        *self == SkyCondition::Clear
    }
}

impl std::fmt::Display for SkyCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkyCondition::Clear => write!(f, "Clear"),
            SkyCondition::PartiallyCloudy => write!(f, "Partially cloudy"),
            SkyCondition::Overcast => write!(f, "Overcast"),
            SkyCondition::Rain => write!(f, "Rain"),
            SkyCondition::Snow => write!(f, "Snow"),
            SkyCondition::Fog => write!(f, "Fog"),
            SkyCondition::Other(s) => write!(f, "{}", s),
            SkyCondition::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Forecast condition for one timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSample {
    pub timestamp: DateTime<Utc>,
    pub condition: SkyCondition,
}

/// Source of forecast samples.
///
/// `Ok(None)` means the provider has nothing for that time; `Err` means it
/// could not be asked.
pub trait WeatherProvider: Sync {
    /// Sample nearest `t` for the location.
    fn lookup(&self, location: &ObserverLocation, t: &DateTime<Utc>)
        -> Result<Option<WeatherSample>>;

    fn name(&self) -> &str {
        "weather"
    }
}

/// In-memory hourly forecast for a single site.
#[derive(Debug, Clone, Default)]
pub struct HourlyForecast {
    samples: Vec<WeatherSample>,
}

impl HourlyForecast {
    pub fn new(mut samples: Vec<WeatherSample>) -> Self {
        samples.sort_by_key(|s| s.timestamp);
        HourlyForecast { samples }
    }

    /// Parse `timestamp,condition` lines, one sample per line.
    ///
    /// Timestamps are RFC 3339. The condition is everything after the first
    /// comma, so compound tags need no quoting. Blank lines and lines
    /// starting with `#` are skipped.
    pub fn parse(text: &str) -> Result<Self> {
        let mut samples = Vec::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (stamp, condition) = line.split_once(',').ok_or_else(|| {
                SkywindowError::DataError(format!(
                    "forecast line {}: expected 'timestamp,condition'",
                    number + 1
                ))
            })?;
            let timestamp = DateTime::parse_from_rfc3339(stamp.trim())
                .map_err(|e| {
                    SkywindowError::DataError(format!("forecast line {}: {}", number + 1, e))
                })?
                .with_timezone(&Utc);
            samples.push(WeatherSample {
                timestamp,
                condition: SkyCondition::parse(condition),
            });
        }
        debug!("parsed {} forecast samples", samples.len());
        Ok(Self::new(samples))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample closest to `t`; ties go to the earlier one.
    pub fn nearest(&self, t: &DateTime<Utc>) -> Option<&WeatherSample> {
        let idx = self.samples.partition_point(|s| s.timestamp < *t);
        let after = self.samples.get(idx);
        let before = idx.checked_sub(1).and_then(|i| self.samples.get(i));
        match (before, after) {
            (Some(b), Some(a)) => {
                if *t - b.timestamp <= a.timestamp - *t {
                    Some(b)
                } else {
                    Some(a)
                }
            }
            (b, a) => b.or(a),
        }
    }
}

impl WeatherProvider for HourlyForecast {
    fn lookup(
        &self,
        _location: &ObserverLocation,
        t: &DateTime<Utc>,
    ) -> Result<Option<WeatherSample>> {
        Ok(self.nearest(t).cloned())
    }

    fn name(&self) -> &str {
        "hourly forecast"
    }
}

type Reply = mpsc::Sender<Result<Option<WeatherSample>>>;

/// Runs lookups of the wrapped provider on one worker thread and gives up
/// on each after a deadline.
///
/// A lookup that misses the deadline fails with `ProviderUnavailable` while
/// the worker carries on with it; later lookups queue behind it. If the
/// provider panics the worker is gone and every later lookup reports that.
pub struct WithTimeout {
    name: String,
    jobs: Mutex<mpsc::Sender<(ObserverLocation, DateTime<Utc>, Reply)>>,
    timeout: StdDuration,
}

impl WithTimeout {
    pub fn new<P>(inner: P, timeout: StdDuration) -> Self
    where
        P: WeatherProvider + Send + 'static,
    {
        let name = inner.name().to_string();
        let (jobs, queue) = mpsc::channel::<(ObserverLocation, DateTime<Utc>, Reply)>();
        thread::spawn(move || {
            for (location, t, reply) in queue {
                // The caller may have stopped waiting
                let _ = reply.send(inner.lookup(&location, &t));
            }
        });
        WithTimeout {
            name,
            jobs: Mutex::new(jobs),
            timeout,
        }
    }

    fn unavailable(&self, reason: String) -> SkywindowError {
        SkywindowError::ProviderUnavailable {
            provider: self.name.clone(),
            reason,
        }
    }
}

impl WeatherProvider for WithTimeout {
    fn lookup(
        &self,
        location: &ObserverLocation,
        t: &DateTime<Utc>,
    ) -> Result<Option<WeatherSample>> {
        let (reply, answer) = mpsc::channel();
        let queued = match self.jobs.lock() {
            Ok(jobs) => jobs.send((*location, *t, reply)).is_ok(),
            Err(_) => false,
        };
        if !queued {
            return Err(self.unavailable("worker has stopped".to_string()));
        }

        match answer.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!("{} lookup for {} timed out after {:?}", self.name, t, self.timeout);
                Err(self.unavailable(format!("no answer within {:?}", self.timeout)))
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("{} lookup for {} failed, worker has stopped", self.name, t);
                Err(self.unavailable("worker stopped before answering".to_string()))
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_condition_tags() {
        assert_eq!(SkyCondition::parse("Clear"), SkyCondition::Clear);
        assert_eq!(SkyCondition::parse(" clear "), SkyCondition::Clear);
        assert_eq!(
            SkyCondition::parse("Partially cloudy"),
            SkyCondition::PartiallyCloudy
        );
        assert_eq!(SkyCondition::parse("Rain, Overcast"), SkyCondition::Rain);
        assert_eq!(
            SkyCondition::parse("Snow, Partially cloudy"),
            SkyCondition::Snow
        );
        assert_eq!(SkyCondition::parse("Overcast"), SkyCondition::Overcast);
        assert_eq!(SkyCondition::parse(""), SkyCondition::Unknown);
        assert_eq!(
            SkyCondition::parse("Volcanic ash"),
            SkyCondition::Other("Volcanic ash".into())
        );
        assert!(!SkyCondition::parse("Clear, Rain").is_clear());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for c in [
            SkyCondition::Clear,
            SkyCondition::PartiallyCloudy,
            SkyCondition::Overcast,
            SkyCondition::Rain,
            SkyCondition::Snow,
            SkyCondition::Fog,
            SkyCondition::Unknown,
        ] {
            assert_eq!(SkyCondition::parse(&c.to_string()), c);
        }
    }

    #[test]
    fn test_parse_forecast_lines() {
        let text = "\
# hourly
2024-01-10T20:00:00Z,Clear
2024-01-10T22:00:00Z,Rain, Overcast

2024-01-10T16:00:00-05:00,Partially cloudy
";
        let forecast = HourlyForecast::parse(text).unwrap();
        assert_eq!(forecast.len(), 3);
        assert_eq!(
            forecast.nearest(&at(21, 10)).map(|s| &s.condition),
            Some(&SkyCondition::PartiallyCloudy)
        );
        assert_eq!(
            forecast.nearest(&at(23, 59)).map(|s| &s.condition),
            Some(&SkyCondition::Rain)
        );
    }

    #[test]
    fn test_parse_rejects_bad_lines() {
        assert!(HourlyForecast::parse("2024-01-10T20:00:00Z").is_err());
        assert!(HourlyForecast::parse("yesterday,Clear").is_err());
    }

    #[test]
    fn test_nearest_tie_goes_earlier() {
        let forecast = HourlyForecast::new(vec![
            WeatherSample {
                timestamp: at(21, 0),
                condition: SkyCondition::Overcast,
            },
            WeatherSample {
                timestamp: at(20, 0),
                condition: SkyCondition::Clear,
            },
        ]);
        assert_eq!(
            forecast.nearest(&at(20, 30)).unwrap().condition,
            SkyCondition::Clear
        );
        assert!(HourlyForecast::default().nearest(&at(20, 30)).is_none());
    }

    struct Sleepy;

    impl WeatherProvider for Sleepy {
        fn lookup(
            &self,
            _location: &ObserverLocation,
            t: &DateTime<Utc>,
        ) -> Result<Option<WeatherSample>> {
            thread::sleep(StdDuration::from_millis(500));
            Ok(Some(WeatherSample {
                timestamp: *t,
                condition: SkyCondition::Clear,
            }))
        }
    }

    struct Broken;

    impl WeatherProvider for Broken {
        fn lookup(
            &self,
            _location: &ObserverLocation,
            _t: &DateTime<Utc>,
        ) -> Result<Option<WeatherSample>> {
            panic!("forecast service crashed");
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn reason(result: Result<Option<WeatherSample>>) -> String {
        match result {
            Err(SkywindowError::ProviderUnavailable { reason, .. }) => reason,
            other => panic!("expected ProviderUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_timeout_wrapper() {
        let home = ObserverLocation::new(40.0, -75.0, 0.0);
        let slow = WithTimeout::new(Sleepy, StdDuration::from_millis(20));
        assert!(reason(slow.lookup(&home, &at(20, 0))).starts_with("no answer within"));

        let patient = WithTimeout::new(
            HourlyForecast::new(vec![WeatherSample {
                timestamp: at(20, 0),
                condition: SkyCondition::Clear,
            }]),
            StdDuration::from_secs(5),
        );
        assert_eq!(patient.name(), "hourly forecast");
        for _ in 0..3 {
            let sample = patient
                .lookup(&home, &(at(20, 0) + Duration::minutes(3)))
                .unwrap();
            assert_eq!(sample.map(|s| s.condition), Some(SkyCondition::Clear));
        }
    }

    #[test]
    fn test_crashed_provider_is_not_a_timeout() {
        let home = ObserverLocation::new(40.0, -75.0, 0.0);
        let broken = WithTimeout::new(Broken, StdDuration::from_secs(5));

        let first = reason(broken.lookup(&home, &at(20, 0)));
        assert!(!first.contains("no answer within"));
        assert!(first.contains("stopped"));

        // The worker is gone, later lookups fail straight away
        let second = reason(broken.lookup(&home, &at(21, 0)));
        assert!(second.contains("stopped"));
    }
}
