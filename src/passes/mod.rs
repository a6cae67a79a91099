//! Satellite pass detection
//!
//! Scans a horizon at a fixed step, finds every maximal run of samples at or
//! above the visibility threshold, and refines each run into a [`Pass`]:
//!
//! 1. rise and set are bisected between the bracketing samples to 0.1 s;
//! 2. the peak is golden-section searched around the highest sample,
//!    constrained to `[rise, set]`;
//! 3. the sunlit state summarises the shadow test over rise, peak, set and
//!    every sample of the run.
//!
//! Runs that touch either end of the horizon are governed by
//! [`TruncationPolicy`].
//!
//! # Example
//!
//! ```ignore
//! use skywindow::passes::{DetectorConfig, PassSearch};
//!
//! let search = PassSearch::new(&iss, &home, start, 10.0, DetectorConfig::default())?;
//! for pass in search.passes() {
//!     let pass = pass?;
//!     println!("{} peaks at {:.0}°", pass.satellite, pass.peak.altitude_deg);
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::SatelliteId;
use crate::constants::DAY_S;
use crate::eclipselib::ShadowModel;
use crate::planetlib::sun_position;
use crate::searchlib::{bisect_transition, refine_maximum};
use crate::sgp4lib::OrbitalElements;
use crate::time::{add_days, from_julian_date, julian_date};
use crate::toposlib::{topocentric, GeographicPosition, ObserverLocation, TopocentricSample};
use crate::weather::SkyCondition;
use crate::{Result, SkywindowError};

/// Rise, set and peak are refined to 0.1 seconds
const REFINE_EPSILON_DAYS: f64 = 0.1 / DAY_S;

/// What to do with a run of samples that is already above the threshold at
/// the start of the horizon or still above it at the end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TruncationPolicy {
    /// Drop the run
    #[default]
    Exclude,
    /// Keep it, using the horizon boundary as rise or set, and mark it
    Flag,
}

impl std::str::FromStr for TruncationPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exclude" => Ok(TruncationPolicy::Exclude),
            "flag" => Ok(TruncationPolicy::Flag),
            other => Err(format!("unknown truncation policy '{}'", other)),
        }
    }
}

/// Which ends of a pass were cut off by the horizon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Truncation {
    #[default]
    None,
    AtStart,
    AtEnd,
    Both,
}

impl Truncation {
    fn from_flags(at_start: bool, at_end: bool) -> Self {
        match (at_start, at_end) {
            (false, false) => Truncation::None,
            (true, false) => Truncation::AtStart,
            (false, true) => Truncation::AtEnd,
            (true, true) => Truncation::Both,
        }
    }
}

/// Detector settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Sampling step in seconds
    pub step_seconds: f64,
    /// Visibility threshold in degrees above the horizon, 0 to 90
    pub min_altitude_deg: f64,
    pub truncation: TruncationPolicy,
    pub shadow: ShadowModel,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            step_seconds: 30.0,
            min_altitude_deg: 0.0,
            truncation: TruncationPolicy::Exclude,
            shadow: ShadowModel::Cylindrical,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.step_seconds > 0.0) {
            return Err(SkywindowError::DataError(format!(
                "step must be positive, got {} s",
                self.step_seconds
            )));
        }
        if !(0.0..=90.0).contains(&self.min_altitude_deg) {
            return Err(SkywindowError::DataError(format!(
                "minimum altitude must be between 0 and 90 degrees, got {}",
                self.min_altitude_deg
            )));
        }
        Ok(())
    }
}

/// Reject horizons that are negative, not finite, or too long for any
/// element set to stay fresh across them.
///
/// A horizon longer than twice the staleness threshold cannot lie within
/// the threshold on both sides of the epoch, whatever its start.
pub fn validate_horizon(horizon_days: f64, max_epoch_age_days: f64) -> Result<()> {
    if !horizon_days.is_finite() || horizon_days < 0.0 {
        return Err(SkywindowError::DataError(format!(
            "horizon must be a non-negative number of days, got {}",
            horizon_days
        )));
    }
    if horizon_days > 2.0 * max_epoch_age_days {
        return Err(SkywindowError::DataError(format!(
            "horizon of {} days exceeds twice the {}-day element age limit",
            horizon_days, max_epoch_age_days
        )));
    }
    Ok(())
}

/// One refined point of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PassPoint {
    pub time: DateTime<Utc>,
    pub altitude_deg: f64,
    pub azimuth_deg: f64,
    pub range_km: f64,
    pub sunlit: bool,
}

impl From<TopocentricSample> for PassPoint {
    fn from(s: TopocentricSample) -> Self {
        PassPoint {
            time: s.timestamp,
            altitude_deg: s.altitude_deg,
            azimuth_deg: s.azimuth_deg,
            range_km: s.range_km,
            sunlit: s.sunlit,
        }
    }
}

/// Illumination of the satellite over a whole pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SunlitState {
    Sunlit,
    Shadow,
    /// Enters or leaves Earth's shadow during the pass
    Mixed,
}

impl SunlitState {
    fn from_flags(flags: impl IntoIterator<Item = bool>) -> Self {
        let (mut lit, mut dark) = (false, false);
        for f in flags {
            if f {
                lit = true;
            } else {
                dark = true;
            }
        }
        match (lit, dark) {
            (true, false) => SunlitState::Sunlit,
            (false, true) => SunlitState::Shadow,
            _ => SunlitState::Mixed,
        }
    }
}

impl std::fmt::Display for SunlitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SunlitState::Sunlit => write!(f, "Sunlit"),
            SunlitState::Shadow => write!(f, "Shadow"),
            SunlitState::Mixed => write!(f, "Mixed"),
        }
    }
}

impl std::str::FromStr for SunlitState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "Sunlit" => Ok(SunlitState::Sunlit),
            "Shadow" => Ok(SunlitState::Shadow),
            "Mixed" => Ok(SunlitState::Mixed),
            other => Err(format!("unknown sunlit state '{}'", other)),
        }
    }
}

/// Attached when a bright moon is above the horizon at peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MoonWarning {
    pub illumination: f64,
    pub phase: f64,
    pub altitude_deg: f64,
}

/// Optional fields attached by annotators.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Annotations {
    pub sunlit: Option<SunlitState>,
    pub moon_warning: Option<MoonWarning>,
    pub forecast: Option<SkyCondition>,
}

/// A visibility window of one satellite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pass {
    pub satellite: SatelliteId,
    pub rise: PassPoint,
    pub peak: PassPoint,
    pub set: PassPoint,
    pub sunlit_state: SunlitState,
    pub truncated: Truncation,
    pub annotations: Annotations,
}

impl Pass {
    pub fn duration(&self) -> Duration {
        self.set.time - self.rise.time
    }

    pub fn is_complete(&self) -> bool {
        self.truncated == Truncation::None
    }
}

/// A configured pass search for one satellite over one horizon.
///
/// Construction validates the horizon against the element set's epoch;
/// [`PassSearch::passes`] then scans lazily and may be called repeatedly.
pub struct PassSearch<'a> {
    elements: &'a OrbitalElements,
    satellite: SatelliteId,
    observer: GeographicPosition,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    config: DetectorConfig,
}

impl<'a> PassSearch<'a> {
    pub fn new(
        elements: &'a OrbitalElements,
        observer: &ObserverLocation,
        start: DateTime<Utc>,
        horizon_days: f64,
        config: DetectorConfig,
    ) -> Result<Self> {
        config.validate()?;
        validate_horizon(horizon_days, elements.max_epoch_age_days)?;
        let end = add_days(&start, horizon_days)?;

        elements.check_fresh(&start)?;
        elements.check_fresh(&end)?;
        if !elements.within_precision_window(&start) || !elements.within_precision_window(&end) {
            warn!(
                "{}: horizon {} to {} reaches beyond the SGP4 precision window around epoch {}",
                elements.display_name(),
                start,
                end,
                elements.epoch
            );
        }

        Ok(PassSearch {
            elements,
            satellite: elements.id(),
            observer: observer.position(),
            start,
            end,
            config,
        })
    }

    /// Iterate over the passes in rise-time order.
    pub fn passes(&self) -> Passes<'_, 'a> {
        let step_ms = (self.config.step_seconds * 1000.0).round().max(1.0) as i64;
        let span_ms = (self.end - self.start).num_milliseconds();
        Passes {
            search: self,
            step_ms,
            last_index: (span_ms + step_ms - 1) / step_ms,
            next_index: 0,
            below: None,
            done: false,
        }
    }

    /// Topocentric view of the satellite at a Julian date.
    pub fn sample_jd(&self, jd: f64) -> Result<TopocentricSample> {
        self.sample(&from_julian_date(jd))
    }

    pub fn sample(&self, t: &DateTime<Utc>) -> Result<TopocentricSample> {
        let state = self.elements.propagate(t)?;
        let sun = sun_position(julian_date(t));
        Ok(topocentric(&state, &self.observer, &sun, self.config.shadow))
    }

    fn is_up(&self, jd: f64) -> Result<bool> {
        Ok(self.sample_jd(jd)?.altitude_deg >= self.config.min_altitude_deg)
    }

    /// Refine a run of above-threshold samples into a pass.
    ///
    /// `before` and `after` are the bracketing below-threshold samples,
    /// `None` where the run touches the horizon boundary. Returns `None`
    /// for passes the policy or the ordering invariant rejects.
    fn build_pass(
        &self,
        before: Option<TopocentricSample>,
        run: &[TopocentricSample],
        after: Option<TopocentricSample>,
    ) -> Result<Option<Pass>> {
        let (first, last) = match (run.first(), run.last()) {
            (Some(f), Some(l)) => (*f, *l),
            _ => return Ok(None),
        };
        let truncated = Truncation::from_flags(before.is_none(), after.is_none());
        if truncated != Truncation::None && self.config.truncation == TruncationPolicy::Exclude {
            debug!(
                "{}: dropping run at {} truncated by the horizon ({:?})",
                self.satellite, first.timestamp, truncated
            );
            return Ok(None);
        }

        let rise = match before {
            Some(b) => {
                let (_, hi) = bisect_transition(
                    julian_date(&b.timestamp),
                    julian_date(&first.timestamp),
                    REFINE_EPSILON_DAYS,
                    |jd| self.is_up(jd),
                )?;
                self.sample_jd(hi)?
            }
            None => first,
        };
        let set = match after {
            Some(a) => {
                let (lo, _) = bisect_transition(
                    julian_date(&last.timestamp),
                    julian_date(&a.timestamp),
                    REFINE_EPSILON_DAYS,
                    |jd| self.is_up(jd),
                )?;
                self.sample_jd(lo)?
            }
            None => last,
        };

        // Highest sample; ties resolve to the earliest
        let mut k = 0;
        for (i, s) in run.iter().enumerate() {
            if s.altitude_deg > run[k].altitude_deg {
                k = i;
            }
        }
        let highest = run[k];
        let jd_rise = julian_date(&rise.timestamp);
        let jd_set = julian_date(&set.timestamp);
        let lo = if k > 0 {
            julian_date(&run[k - 1].timestamp).max(jd_rise)
        } else {
            jd_rise
        };
        let hi = if k + 1 < run.len() {
            julian_date(&run[k + 1].timestamp).min(jd_set)
        } else {
            jd_set
        };
        let (jd_peak, _) =
            refine_maximum(lo, hi, REFINE_EPSILON_DAYS, |jd| {
                Ok::<_, SkywindowError>(self.sample_jd(jd)?.altitude_deg)
            })?;
        let refined = self.sample_jd(jd_peak)?;
        let peak = if refined.altitude_deg >= highest.altitude_deg {
            refined
        } else {
            highest
        };

        let ordered = if truncated == Truncation::None {
            rise.timestamp < peak.timestamp && peak.timestamp < set.timestamp
        } else {
            rise.timestamp <= peak.timestamp && peak.timestamp <= set.timestamp
        };
        if !ordered {
            debug!(
                "{}: dropping degenerate pass at {} (rise {}, peak {}, set {})",
                self.satellite, first.timestamp, rise.timestamp, peak.timestamp, set.timestamp
            );
            return Ok(None);
        }

        let sunlit_state = SunlitState::from_flags(
            [rise.sunlit, peak.sunlit, set.sunlit]
                .into_iter()
                .chain(run.iter().map(|s| s.sunlit)),
        );

        Ok(Some(Pass {
            satellite: self.satellite.clone(),
            rise: rise.into(),
            peak: peak.into(),
            set: set.into(),
            sunlit_state,
            truncated,
            annotations: Annotations::default(),
        }))
    }
}

/// Lazy iterator over the passes of a [`PassSearch`].
///
/// Finite, and fused after the first error.
pub struct Passes<'s, 'a> {
    search: &'s PassSearch<'a>,
    step_ms: i64,
    last_index: i64,
    next_index: i64,
    below: Option<TopocentricSample>,
    done: bool,
}

impl Passes<'_, '_> {
    fn time_at(&self, index: i64) -> DateTime<Utc> {
        let t = self.search.start + Duration::milliseconds(index * self.step_ms);
        t.min(self.search.end)
    }

    fn next_sample(&mut self) -> Option<Result<TopocentricSample>> {
        if self.next_index > self.last_index {
            return None;
        }
        let t = self.time_at(self.next_index);
        self.next_index += 1;
        Some(self.search.sample(&t))
    }

    fn next_pass(&mut self) -> Result<Option<Pass>> {
        let threshold = self.search.config.min_altitude_deg;
        loop {
            // Find the first sample at or above the threshold
            let first = loop {
                match self.next_sample() {
                    None => return Ok(None),
                    Some(s) => {
                        let s = s?;
                        if s.altitude_deg >= threshold {
                            break s;
                        }
                        self.below = Some(s);
                    }
                }
            };
            let before = self.below.take();

            let mut run = vec![first];
            let mut after = None;
            while let Some(s) = self.next_sample() {
                let s = s?;
                if s.altitude_deg >= threshold {
                    run.push(s);
                } else {
                    after = Some(s);
                    break;
                }
            }
            self.below = after;

            if let Some(pass) = self.search.build_pass(before, &run, after)? {
                return Ok(Some(pass));
            }
        }
    }
}

impl Iterator for Passes<'_, '_> {
    type Item = Result<Pass>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_pass() {
            Ok(Some(pass)) => Some(Ok(pass)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for Passes<'_, '_> {}

/// Detect every pass of a satellite over an observer within the horizon.
pub fn detect_passes(
    elements: &OrbitalElements,
    observer: &ObserverLocation,
    horizon_start: DateTime<Utc>,
    horizon_days: f64,
    config: &DetectorConfig,
) -> Result<Vec<Pass>> {
    PassSearch::new(elements, observer, horizon_start, horizon_days, *config)?
        .passes()
        .collect()
}
