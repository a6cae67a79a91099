//! Time conversions between `chrono` timestamps and Julian dates
//!
//! The public API speaks `DateTime<Utc>`; searches and ephemerides work on
//! Julian dates (`f64` days). UTC is used throughout. The TT/UT1 offsets
//! (about a minute) are far below the accuracy of the low-precision sun and
//! moon series and of SGP4 itself.

use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc,
};

use crate::constants::{DAYS_PER_CENTURY, DAY_S, J2000, UNIX_EPOCH_JD};
use crate::{Result, SkywindowError};

/// Convert a UTC timestamp to a Julian date.
pub fn julian_date(t: &DateTime<Utc>) -> f64 {
    let seconds = t.timestamp() as f64 + t.timestamp_subsec_nanos() as f64 / 1e9;
    UNIX_EPOCH_JD + seconds / DAY_S
}

/// Convert a Julian date back to a UTC timestamp, rounded to the millisecond.
///
/// Dates outside chrono's representable range collapse to the Unix epoch.
pub fn from_julian_date(jd: f64) -> DateTime<Utc> {
    let millis = ((jd - UNIX_EPOCH_JD) * DAY_S * 1000.0).round() as i64;
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

/// Julian centuries elapsed since J2000.0
pub fn centuries_since_j2000(jd: f64) -> f64 {
    (jd - J2000) / DAYS_PER_CENTURY
}

/// Fractional days between two timestamps (`b - a`).
pub fn days_between(a: &DateTime<Utc>, b: &DateTime<Utc>) -> f64 {
    (*b - *a).num_milliseconds() as f64 / (DAY_S * 1000.0)
}

/// Add a fractional number of days to a timestamp.
///
/// Fails with `DataError` when `days` is not finite or the result falls
/// outside chrono's representable range.
pub fn add_days(t: &DateTime<Utc>, days: f64) -> Result<DateTime<Utc>> {
    let millis = (days * DAY_S * 1000.0).round();
    let shifted = if millis.is_finite() && millis.abs() < i64::MAX as f64 {
        Duration::try_milliseconds(millis as i64).and_then(|d| t.checked_add_signed(d))
    } else {
        None
    };
    shifted.ok_or_else(|| {
        SkywindowError::DataError(format!("{} days from {} is out of range", days, t))
    })
}

/// The observer's local calendar date for a UTC instant.
pub fn local_date(t: &DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    t.with_timezone(&offset).date_naive()
}

/// UTC instant of local midnight starting `date`.
pub fn local_midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    (local - Duration::seconds(offset.local_minus_utc() as i64)).and_utc()
}

/// UTC instant of local noon on `date`.
pub fn local_noon(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    local_midnight(date, offset) + Duration::hours(12)
}

/// Build a fixed offset from hours east of UTC, clamped to the valid range.
pub fn offset_from_hours(hours: f64) -> FixedOffset {
    let seconds = (hours * 3600.0).round() as i32;
    FixedOffset::east_opt(seconds.clamp(-86_399, 86_399)).unwrap_or(Utc.fix())
}
