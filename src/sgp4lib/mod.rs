//! SGP4 satellite propagation
//!
//! This module provides TLE (Two-Line Element) and OMM parsing and SGP4
//! propagation for Earth satellites. Positions come out of SGP4 in the TEME
//! frame and are additionally rotated into the Earth-fixed frame, which is
//! what the observer geometry works in.
//!
//! SGP4 mean elements are fitted over a few days of tracking. Predictions
//! stay within a few kilometers for roughly [`PRECISION_WINDOW_DAYS`] either
//! side of the epoch and then degrade quickly. Beyond the caller's staleness
//! threshold (default [`DEFAULT_MAX_EPOCH_AGE_DAYS`]) propagation is refused
//! with [`SkywindowError::StaleElements`].
//!
//! # Example
//!
//! ```ignore
//! use skywindow::sgp4lib::OrbitalElements;
//!
//! let line1 = "1 25544U 98067A   24001.50000000  .00016717  00000-0  30000-3 0  9991";
//! let line2 = "2 25544  51.6400 200.0000 0006000  50.0000 310.0000 15.50000000000010";
//!
//! let iss = OrbitalElements::from_tle(line1, line2, Some("ISS"))?;
//! let state = iss.propagate(&iss.epoch)?;
//! println!("ISS radius: {:.1} km", state.position.norm());
//! ```

pub mod teme;

use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use sgp4::{Constants, Elements, MinutesSinceEpoch};

use crate::catalog::SatelliteId;
use crate::constants::DAY_MIN;
use crate::time::{days_between, julian_date};
use crate::{Result, SkywindowError};

/// Default maximum distance from epoch, in days, before propagation is refused
pub const DEFAULT_MAX_EPOCH_AGE_DAYS: f64 = 30.0;

/// Distance from epoch, in days, beyond which SGP4 accuracy degrades noticeably
pub const PRECISION_WINDOW_DAYS: f64 = 14.0;

/// Satellite position and velocity at an instant.
#[derive(Debug, Clone, PartialEq)]
pub struct StateVector {
    pub timestamp: DateTime<Utc>,
    /// TEME position in km
    pub position: Vector3<f64>,
    /// TEME velocity in km/s
    pub velocity: Vector3<f64>,
    /// Earth-fixed position in km
    pub position_itrs: Vector3<f64>,
    /// Earth-fixed velocity in km/s
    pub velocity_itrs: Vector3<f64>,
}

/// An Earth satellite's mean orbital elements, ready for SGP4 propagation.
///
/// Immutable once parsed.
#[derive(Debug, Clone)]
pub struct OrbitalElements {
    /// Satellite name (from line 0 of a 3LE, the OMM, or supplied by the caller)
    pub name: Option<String>,

    /// NORAD catalog number
    pub norad_id: u64,

    /// Element set epoch
    pub epoch: DateTime<Utc>,

    /// Mean motion in revolutions per day
    pub revs_per_day: f64,

    /// Staleness threshold in days
    pub max_epoch_age_days: f64,

    model: Constants,
    elements: Elements,
}

impl OrbitalElements {
    /// Create an element set from TLE lines.
    ///
    /// # Arguments
    /// * `line1` - First line of TLE (69 characters)
    /// * `line2` - Second line of TLE (69 characters)
    /// * `name` - Optional satellite name
    pub fn from_tle(line1: &str, line2: &str, name: Option<&str>) -> Result<Self> {
        let elements = Elements::from_tle(
            name.map(String::from),
            line1.trim().as_bytes(),
            line2.trim().as_bytes(),
        )
        .map_err(|e| SkywindowError::DataError(format!("Failed to parse TLE: {}", e)))?;
        let name = elements.object_name.clone();
        Self::from_elements(elements, name)
    }

    /// Create an element set from parsed SGP4 elements.
    pub fn from_elements(elements: Elements, name: Option<String>) -> Result<Self> {
        let model = Constants::from_elements(&elements).map_err(|e| {
            SkywindowError::CalculationError(format!("SGP4 initialization failed: {}", e))
        })?;

        Ok(OrbitalElements {
            name: name.map(|n| n.trim().to_string()),
            norad_id: elements.norad_id,
            epoch: elements.datetime.and_utc(),
            revs_per_day: elements.mean_motion,
            max_epoch_age_days: DEFAULT_MAX_EPOCH_AGE_DAYS,
            model,
            elements,
        })
    }

    /// Create an element set from an OMM (Orbit Mean-elements Message) JSON
    /// record as published by Celestrak and Space-Track.
    pub fn from_omm(json: &str) -> Result<Self> {
        let elements: Elements = serde_json::from_str(json)
            .map_err(|e| SkywindowError::DataError(format!("Failed to parse OMM JSON: {}", e)))?;
        let name = elements.object_name.clone();
        Self::from_elements(elements, name)
    }

    /// Replace the staleness threshold.
    pub fn with_max_epoch_age(mut self, days: f64) -> Self {
        self.max_epoch_age_days = days;
        self
    }

    /// Identifier used in passes, reports and exports.
    pub fn id(&self) -> SatelliteId {
        SatelliteId::new(self.display_name(), self.norad_id)
    }

    /// Name, or `#NORAD` when the element set is anonymous.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(n) if !n.is_empty() => n.clone(),
            _ => format!("#{}", self.norad_id),
        }
    }

    /// Signed distance of `t` from the epoch in days.
    pub fn epoch_offset_days(&self, t: &DateTime<Utc>) -> f64 {
        days_between(&self.epoch, t)
    }

    /// Fail with `StaleElements` unless `t` is within the staleness threshold.
    pub fn check_fresh(&self, t: &DateTime<Utc>) -> Result<()> {
        if self.epoch_offset_days(t).abs() > self.max_epoch_age_days {
            return Err(SkywindowError::StaleElements {
                satellite: self.display_name(),
                epoch: self.epoch,
                requested: *t,
                max_age_days: self.max_epoch_age_days,
            });
        }
        Ok(())
    }

    /// Whether `t` lies inside the window where SGP4 predictions stay accurate.
    pub fn within_precision_window(&self, t: &DateTime<Utc>) -> bool {
        self.epoch_offset_days(t).abs() <= PRECISION_WINDOW_DAYS
    }

    /// Propagate to `t`, returning the TEME and Earth-fixed state.
    ///
    /// Deterministic: the same elements and timestamp always give
    /// bit-identical output.
    pub fn propagate(&self, t: &DateTime<Utc>) -> Result<StateVector> {
        self.check_fresh(t)?;

        let minutes = self.epoch_offset_days(t) * DAY_MIN;
        let prediction = self
            .model
            .propagate(MinutesSinceEpoch(minutes))
            .map_err(|e| {
                SkywindowError::CalculationError(format!(
                    "SGP4 propagation failed for {}: {}",
                    self.display_name(),
                    e
                ))
            })?;

        let position = Vector3::from(prediction.position);
        let velocity = Vector3::from(prediction.velocity);
        let (position_itrs, velocity_itrs) =
            teme::teme_to_itrs(julian_date(t), &position, &velocity);

        Ok(StateVector {
            timestamp: *t,
            position,
            velocity,
            position_itrs,
            velocity_itrs,
        })
    }

    /// Get the parsed SGP4 elements (inclination, RAAN, drag term, ...)
    pub fn elements(&self) -> &Elements {
        &self.elements
    }
}

impl std::fmt::Display for OrbitalElements {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} catalog #{} epoch {}",
            self.display_name(),
            self.norad_id,
            self.epoch.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

/// Propagate with the element set's own staleness threshold.
pub fn propagate(elements: &OrbitalElements, t: &DateTime<Utc>) -> Result<StateVector> {
    elements.propagate(t)
}

/// Parse multiple satellites from a multi-line TLE string.
///
/// Supports both 2-line and 3-line (named) element formats. Blank lines are
/// ignored.
pub fn parse_tle_file(tle_data: &str) -> Result<Vec<OrbitalElements>> {
    let cleaned: String = tle_data
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let named = cleaned
        .lines()
        .next()
        .map(|first| !first.starts_with("1 "))
        .unwrap_or(false);

    let elements_list = if named {
        sgp4::parse_3les(&cleaned)
    } else {
        sgp4::parse_2les(&cleaned)
    }
    .map_err(|e| SkywindowError::DataError(format!("Failed to parse TLE: {}", e)))?;

    elements_list
        .into_iter()
        .map(|elements| {
            let name = elements.object_name.clone();
            OrbitalElements::from_elements(elements, name)
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};

    // ISS TLE from AIAA 2006-6753 era tracking data
    pub(crate) const ISS_LINE1: &str =
        "1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927";
    pub(crate) const ISS_LINE2: &str =
        "2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537";

    pub(crate) fn iss() -> OrbitalElements {
        OrbitalElements::from_tle(ISS_LINE1, ISS_LINE2, Some("ISS (ZARYA)"))
            .expect("Failed to parse TLE")
    }

    fn with_checksum(body: &str) -> String {
        let sum: u32 = body
            .chars()
            .map(|c| match c {
                '-' => 1,
                c => c.to_digit(10).unwrap_or(0),
            })
            .sum();
        format!("{}{}", body, sum % 10)
    }

    /// ISS orbit with a different catalog number and epoch, e.g.
    /// `"24001.50000000"` for 2024-01-01 12:00 UTC.
    pub(crate) fn iss_like_tle(norad_id: u32, epoch: &str) -> (String, String) {
        let line1 = with_checksum(&format!(
            "1 {:05}U 98067A   {} -.00002182  00000-0 -11606-4 0  292",
            norad_id, epoch
        ));
        let line2 = with_checksum(&format!(
            "2 {:05}  51.6416 247.4627 0006703 130.5360 325.0288 15.7212539156353",
            norad_id
        ));
        (line1, line2)
    }

    #[test]
    fn test_synthetic_tle_matches_real_checksum() {
        let (line1, line2) = iss_like_tle(25544, "08264.51782528");
        assert_eq!(line1, ISS_LINE1);
        assert_eq!(line2, ISS_LINE2);
    }

    #[test]
    fn test_parse_tle() {
        let sat = iss();
        assert_eq!(sat.name.as_deref(), Some("ISS (ZARYA)"));
        assert_eq!(sat.norad_id, 25544);
        assert_relative_eq!(sat.revs_per_day, 15.72, epsilon = 0.1);
        assert_eq!(
            sat.epoch.date_naive(),
            chrono::NaiveDate::from_ymd_opt(2008, 9, 20).unwrap()
        );
    }

    #[test]
    fn test_parse_tle_rejects_garbage() {
        assert!(OrbitalElements::from_tle("1 garbage", "2 garbage", None).is_err());
    }

    #[test]
    fn test_position_reasonable() {
        let sat = iss();
        let state = sat.propagate(&sat.epoch).expect("Propagation failed");

        let r = state.position.norm();
        assert!(r > 6600.0 && r < 6900.0, "Position magnitude {} km out of range", r);
        let v = state.velocity.norm();
        assert!(v > 7.0 && v < 8.0, "Velocity magnitude {} km/s out of range", v);
        assert_relative_eq!(state.position_itrs.norm(), r, epsilon = 1e-6);
    }

    #[test]
    fn test_propagation_is_deterministic() {
        let sat = iss();
        let t = sat.epoch + Duration::minutes(97);
        let a = sat.propagate(&t).unwrap();
        let b = sat.propagate(&t).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_propagation_is_continuous() {
        let sat = iss();
        let t = sat.epoch + Duration::hours(30);
        let a = sat.propagate(&t).unwrap();
        let b = sat.propagate(&(t + Duration::seconds(1))).unwrap();
        let moved = (b.position - a.position).norm();
        assert!(moved < 10.0, "moved {} km in one second", moved);
        assert!(moved > 5.0, "moved only {} km in one second", moved);
    }

    #[test]
    fn test_stale_elements_rejected() {
        let sat = iss();
        let t = sat.epoch + Duration::days(31);
        match sat.propagate(&t) {
            Err(SkywindowError::StaleElements { satellite, .. }) => {
                assert_eq!(satellite, "ISS (ZARYA)")
            }
            other => panic!("expected StaleElements, got {:?}", other),
        }
        // Backwards in time is just as stale
        assert!(sat.propagate(&(sat.epoch - Duration::days(31))).is_err());
    }

    #[test]
    fn test_configurable_staleness() {
        let sat = iss().with_max_epoch_age(2.0);
        assert!(sat.propagate(&(sat.epoch + Duration::days(1))).is_ok());
        assert!(sat.propagate(&(sat.epoch + Duration::days(3))).is_err());
    }

    #[test]
    fn test_precision_window() {
        let sat = iss();
        assert!(sat.within_precision_window(&(sat.epoch + Duration::days(10))));
        assert!(!sat.within_precision_window(&(sat.epoch + Duration::days(20))));
    }

    #[test]
    fn test_display_and_id() {
        let sat = iss();
        let s = format!("{}", sat);
        assert!(s.contains("ISS (ZARYA)"));
        assert!(s.contains("25544"));
        assert_eq!(sat.id().norad_id, 25544);

        let anon = OrbitalElements::from_tle(ISS_LINE1, ISS_LINE2, None).unwrap();
        assert_eq!(anon.display_name(), "#25544");
    }

    #[test]
    fn test_parse_tle_file_three_line() {
        let text = format!(
            "ISS (ZARYA)\n{}\n{}\n\nISS COPY\n{}\n{}\n",
            ISS_LINE1, ISS_LINE2, ISS_LINE1, ISS_LINE2
        );
        let sats = parse_tle_file(&text).unwrap();
        assert_eq!(sats.len(), 2);
        assert_eq!(sats[1].name.as_deref(), Some("ISS COPY"));
    }

    #[test]
    fn test_parse_tle_file_two_line() {
        let text = format!("{}\n{}\n", ISS_LINE1, ISS_LINE2);
        let sats = parse_tle_file(&text).unwrap();
        assert_eq!(sats.len(), 1);
        assert_eq!(sats[0].display_name(), "#25544");
    }

    #[test]
    fn test_from_omm_json() {
        let omm = r#"{
            "OBJECT_NAME": "ISS (ZARYA)",
            "OBJECT_ID": "1998-067A",
            "EPOCH": "2024-01-01T12:00:00.000000",
            "MEAN_MOTION": 15.72125391,
            "ECCENTRICITY": 0.0006703,
            "INCLINATION": 51.6416,
            "RA_OF_ASC_NODE": 247.4627,
            "ARG_OF_PERICENTER": 130.536,
            "MEAN_ANOMALY": 325.0288,
            "EPHEMERIS_TYPE": 0,
            "CLASSIFICATION_TYPE": "U",
            "NORAD_CAT_ID": 25544,
            "ELEMENT_SET_NO": 999,
            "REV_AT_EPOCH": 0,
            "BSTAR": -0.11606E-4,
            "MEAN_MOTION_DOT": -0.00002182,
            "MEAN_MOTION_DDOT": 0
        }"#;

        let sat = OrbitalElements::from_omm(omm).expect("Failed to parse OMM");
        assert_eq!(sat.name.as_deref(), Some("ISS (ZARYA)"));
        assert_eq!(sat.epoch, Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_from_omm_invalid_json() {
        assert!(OrbitalElements::from_omm("not json").is_err());
    }
}
