//! Daily sun and moon events for an observer
//!
//! Answers "when does the sun set tonight, is the moon up, how bright is
//! it" for every local calendar day of a prediction horizon. Event times are
//! found by sampling a horizon crossing function every ten minutes and
//! bisecting each sign change with [`find_discrete`].
//!
//! Days without a given event (midnight sun, polar night, the moon rising
//! once every ~24h50m) carry `None` for it. Nothing is fabricated to fill
//! the gap.
//!
//! # Example
//!
//! ```ignore
//! use skywindow::almanac::daily_astronomy;
//!
//! let home = ObserverLocation::new(40.0, -75.0, 0.0).with_utc_offset_hours(-5.0);
//! let day = daily_astronomy(&home, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
//! println!("sunset {:?}, moon {:.0}% lit ({})", day.sunset, day.moon_illumination * 100.0, day.phase_name());
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::constants::DAY_S;
use crate::planetlib::{moon_illumination, moon_phase, moon_position, sun_position, MoonPhase};
use crate::searchlib::find_discrete;
use crate::sgp4lib::teme::inertial_to_itrs;
use crate::time::{add_days, from_julian_date, julian_date, local_date, local_midnight, local_noon};
use crate::toposlib::{GeographicPosition, ObserverLocation};
use crate::{Result, SkywindowError};

/// Sun's apparent angular radius plus standard refraction (50 arcminutes)
pub const SUN_HORIZON_DEGREES: f64 = -50.0 / 60.0;

/// Standard atmospheric refraction at the horizon (34 arcminutes)
pub const REFRACTION_DEGREES: f64 = -34.0 / 60.0;

/// Sampling step for rise/set searches (10 minutes in days)
const SCAN_STEP_DAYS: f64 = 600.0 / DAY_S;

/// Rise/set times are refined to one second
const EVENT_EPSILON_DAYS: f64 = 1.0 / DAY_S;

/// Bodies the almanac tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Body {
    Sun,
    Moon,
}

impl Body {
    /// Altitude of the body's centre at which it counts as rising or setting
    pub fn horizon_degrees(&self) -> f64 {
        match self {
            Body::Sun => SUN_HORIZON_DEGREES,
            Body::Moon => REFRACTION_DEGREES,
        }
    }
}

/// Topocentric altitude of a body in degrees.
pub fn body_altitude(observer: &GeographicPosition, body: Body, jd: f64) -> f64 {
    let inertial = match body {
        Body::Sun => sun_position(jd),
        Body::Moon => moon_position(jd),
    };
    let (alt, _, _) = observer.altaz_of(&inertial_to_itrs(jd, &inertial));
    alt
}

/// Return a closure that computes whether a body is above its horizon (1)
/// or below (0).
///
/// Use with [`find_discrete`] with a step shorter than the shortest
/// expected up or down period.
pub fn risings_and_settings(
    observer: &GeographicPosition,
    body: Body,
) -> impl FnMut(f64) -> i64 + '_ {
    let horizon = body.horizon_degrees();
    move |jd| {
        if body_altitude(observer, body, jd) >= horizon {
            1
        } else {
            0
        }
    }
}

/// Sun and moon summary for one local calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayAstronomy {
    pub date: NaiveDate,
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
    pub moonrise: Option<DateTime<Utc>>,
    pub moonset: Option<DateTime<Utc>>,
    /// Illuminated fraction at local noon
    pub moon_illumination: f64,
    /// Synodic fraction at local noon
    pub moon_phase: f64,
}

impl DayAstronomy {
    pub fn phase_name(&self) -> MoonPhase {
        MoonPhase::from_fraction(self.moon_phase)
    }
}

/// First rise and first set of `body` in `[jd_start, jd_end]`.
fn first_rise_and_set(
    observer: &GeographicPosition,
    body: Body,
    jd_start: f64,
    jd_end: f64,
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let events = find_discrete(
        jd_start,
        jd_end,
        SCAN_STEP_DAYS,
        EVENT_EPSILON_DAYS,
        risings_and_settings(observer, body),
    );
    let rise = events.iter().find(|(_, v)| *v == 1).map(|(jd, _)| from_julian_date(*jd));
    let set = events.iter().find(|(_, v)| *v == 0).map(|(jd, _)| from_julian_date(*jd));
    (rise, set)
}

/// Compute sunrise, sunset, moonrise, moonset and moon brightness for the
/// observer's local day `date`.
pub fn daily_astronomy(observer: &ObserverLocation, date: NaiveDate) -> DayAstronomy {
    let offset = observer.utc_offset();
    let position = observer.position();
    let jd_start = julian_date(&local_midnight(date, offset));
    let jd_end = jd_start + 1.0;

    let (sunrise, sunset) = first_rise_and_set(&position, Body::Sun, jd_start, jd_end);
    let (moonrise, moonset) = first_rise_and_set(&position, Body::Moon, jd_start, jd_end);

    let noon = julian_date(&local_noon(date, offset));
    DayAstronomy {
        date,
        sunrise,
        sunset,
        moonrise,
        moonset,
        moon_illumination: moon_illumination(noon),
        moon_phase: moon_phase(noon),
    }
}

/// Per-day astronomy over a horizon, keyed by local date.
#[derive(Debug, Clone, Default)]
pub struct AstronomyTable {
    days: BTreeMap<NaiveDate, DayAstronomy>,
}

impl AstronomyTable {
    /// Compute every local day touched by `[start, start + days]`, plus one
    /// day either side so that nights spanning the boundary are complete.
    ///
    /// Fails with `DataError` when the horizon end is not representable.
    pub fn for_horizon(
        observer: &ObserverLocation,
        start: DateTime<Utc>,
        days: f64,
    ) -> Result<Self> {
        let offset = observer.utc_offset();
        let end = add_days(&start, days)?;
        let (first, last) = (local_date(&start, offset), local_date(&end, offset));
        let first = first.pred_opt().unwrap_or(first);
        let last = last.succ_opt().unwrap_or(last);

        let dates: Vec<NaiveDate> = first.iter_days().take_while(|d| *d <= last).collect();
        debug!(
            "computing astronomy for {} days ({} to {})",
            dates.len(),
            first,
            last
        );

        let days = dates
            .par_iter()
            .map(|&date| (date, daily_astronomy(observer, date)))
            .collect();
        Ok(AstronomyTable { days })
    }

    pub fn get(&self, date: NaiveDate) -> Option<&DayAstronomy> {
        self.days.get(&date)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DayAstronomy> {
        self.days.values()
    }
}

/// The moon as seen by the observer at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MoonState {
    pub altitude_deg: f64,
    pub illumination: f64,
    pub phase: f64,
}

/// Solar and lunar context needed to annotate and filter passes.
///
/// `AnalyticEphemeris` is the production implementation; tests substitute
/// fixed values.
pub trait EphemerisLookup: Sync {
    /// Moon altitude and brightness at `t`.
    fn moon_at(&self, t: &DateTime<Utc>) -> MoonState;

    /// Daily summary for a local date, if it lies within the table.
    fn day(&self, date: NaiveDate) -> Option<&DayAstronomy>;

    /// Offset defining the observer's local days.
    fn utc_offset(&self) -> FixedOffset;

    /// The night interval relevant to `t`.
    ///
    /// Afternoon and evening instants (local time from noon) belong to the
    /// night that starts at this day's sunset; morning instants to the night
    /// that ends at this day's sunrise. Fails with `NoEvent` when either
    /// bounding event does not occur.
    fn night_interval(&self, t: &DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let offset = self.utc_offset();
        let date = local_date(t, offset);
        let (dusk_date, dawn_date) = if *t >= local_noon(date, offset) {
            (date, date + Duration::days(1))
        } else {
            (date - Duration::days(1), date)
        };

        let sunset = self.day(dusk_date).and_then(|d| d.sunset).ok_or(
            SkywindowError::NoEvent {
                event: "sunset",
                date: dusk_date,
            },
        )?;
        let sunrise = self.day(dawn_date).and_then(|d| d.sunrise).ok_or(
            SkywindowError::NoEvent {
                event: "sunrise",
                date: dawn_date,
            },
        )?;
        Ok((sunset, sunrise))
    }

    /// Whether `t` falls strictly between sunset and the following sunrise.
    fn is_night(&self, t: &DateTime<Utc>) -> Result<bool> {
        let (sunset, sunrise) = self.night_interval(t)?;
        Ok(sunset < *t && *t < sunrise)
    }
}

/// Ephemeris backed by the analytic sun and moon series and a precomputed
/// [`AstronomyTable`].
#[derive(Debug, Clone)]
pub struct AnalyticEphemeris {
    observer: ObserverLocation,
    position: GeographicPosition,
    table: AstronomyTable,
}

impl AnalyticEphemeris {
    pub fn for_horizon(
        observer: &ObserverLocation,
        start: DateTime<Utc>,
        days: f64,
    ) -> Result<Self> {
        Ok(AnalyticEphemeris {
            observer: *observer,
            position: observer.position(),
            table: AstronomyTable::for_horizon(observer, start, days)?,
        })
    }

    pub fn observer(&self) -> &ObserverLocation {
        &self.observer
    }

    pub fn table(&self) -> &AstronomyTable {
        &self.table
    }
}

impl EphemerisLookup for AnalyticEphemeris {
    fn moon_at(&self, t: &DateTime<Utc>) -> MoonState {
        let jd = julian_date(t);
        MoonState {
            altitude_deg: body_altitude(&self.position, Body::Moon, jd),
            illumination: moon_illumination(jd),
            phase: moon_phase(jd),
        }
    }

    fn day(&self, date: NaiveDate) -> Option<&DayAstronomy> {
        self.table.get(date)
    }

    fn utc_offset(&self) -> FixedOffset {
        self.observer.utc_offset()
    }
}
