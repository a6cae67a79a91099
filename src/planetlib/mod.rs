//! Low-precision sun and moon ephemerides
//!
//! Analytic series from the Astronomical Almanac ("low precision formulae",
//! sections C and D). Accurate to about 0.01° for the sun and 0.3° for the
//! moon between 1950 and 2050, which is far tighter than anything a rise time
//! or shadow boundary needs.
//!
//! Positions are geocentric, in km, in the equator-of-date frame, so they can
//! be rotated into the Earth-fixed frame with
//! [`inertial_to_itrs`](crate::sgp4lib::teme::inertial_to_itrs).

use nalgebra::Vector3;
use serde::Serialize;

use crate::constants::{AU_KM, EARTH_RADIUS_KM, J2000};
use crate::time::centuries_since_j2000;

/// Mean obliquity of the ecliptic in degrees.
fn obliquity_deg(jd: f64) -> f64 {
    23.439 - 4.0e-7 * (jd - J2000)
}

fn sin_deg(x: f64) -> f64 {
    x.to_radians().sin()
}

fn cos_deg(x: f64) -> f64 {
    x.to_radians().cos()
}

/// Sun's apparent ecliptic longitude (radians) and distance (AU).
pub fn sun_ecliptic(jd: f64) -> (f64, f64) {
    let n = jd - J2000;
    let mean_longitude = 280.460 + 0.985_647_4 * n;
    let g = 357.528 + 0.985_600_3 * n;

    let lambda = mean_longitude + 1.915 * sin_deg(g) + 0.020 * sin_deg(2.0 * g);
    let distance_au = 1.000_14 - 0.016_71 * cos_deg(g) - 0.000_14 * cos_deg(2.0 * g);

    (lambda.rem_euclid(360.0).to_radians(), distance_au)
}

/// Geocentric sun position in km.
pub fn sun_position(jd: f64) -> Vector3<f64> {
    let (lambda, distance_au) = sun_ecliptic(jd);
    let eps = obliquity_deg(jd).to_radians();
    let r = distance_au * AU_KM;
    Vector3::new(
        r * lambda.cos(),
        r * eps.cos() * lambda.sin(),
        r * eps.sin() * lambda.sin(),
    )
}

/// Moon's ecliptic longitude, latitude (radians) and distance (km).
pub fn moon_ecliptic(jd: f64) -> (f64, f64, f64) {
    let t = centuries_since_j2000(jd);

    let lambda = 218.32 + 481_267.881 * t + 6.29 * sin_deg(135.0 + 477_198.87 * t)
        - 1.27 * sin_deg(259.3 - 413_335.36 * t)
        + 0.66 * sin_deg(235.7 + 890_534.22 * t)
        + 0.21 * sin_deg(269.9 + 954_397.74 * t)
        - 0.19 * sin_deg(357.5 + 35_999.05 * t)
        - 0.11 * sin_deg(186.5 + 966_404.03 * t);

    let beta = 5.13 * sin_deg(93.3 + 483_202.02 * t) + 0.28 * sin_deg(228.2 + 960_400.89 * t)
        - 0.28 * sin_deg(318.3 + 6_003.15 * t)
        - 0.17 * sin_deg(217.6 - 407_332.21 * t);

    // Horizontal parallax
    let parallax = 0.9508
        + 0.0518 * cos_deg(134.9 + 477_198.85 * t)
        + 0.0095 * cos_deg(259.2 - 413_335.38 * t)
        + 0.0078 * cos_deg(235.7 + 890_534.23 * t)
        + 0.0028 * cos_deg(269.9 + 954_397.70 * t);

    let distance_km = EARTH_RADIUS_KM / sin_deg(parallax);
    (
        lambda.rem_euclid(360.0).to_radians(),
        beta.to_radians(),
        distance_km,
    )
}

/// Geocentric moon position in km.
pub fn moon_position(jd: f64) -> Vector3<f64> {
    let (lambda, beta, r) = moon_ecliptic(jd);
    let eps = obliquity_deg(jd).to_radians();
    let (se, ce) = eps.sin_cos();

    let l = beta.cos() * lambda.cos();
    let m = ce * beta.cos() * lambda.sin() - se * beta.sin();
    let n = se * beta.cos() * lambda.sin() + ce * beta.sin();

    Vector3::new(r * l, r * m, r * n)
}

/// Illuminated fraction of the moon's disk, 0 (new) to 1 (full).
pub fn moon_illumination(jd: f64) -> f64 {
    let sun = sun_position(jd);
    let moon = moon_position(jd);

    let elongation = sun.angle(&moon);
    let r_sun = sun.norm();
    let phase_angle = (r_sun * elongation.sin()).atan2(moon.norm() - r_sun * elongation.cos());

    (1.0 + phase_angle.cos()) / 2.0
}

/// Position in the synodic cycle: 0 at new moon, 0.5 at full, back to 1.
pub fn moon_phase(jd: f64) -> f64 {
    let (moon_lon, _, _) = moon_ecliptic(jd);
    let (sun_lon, _) = sun_ecliptic(jd);
    (moon_lon - sun_lon).rem_euclid(std::f64::consts::TAU) / std::f64::consts::TAU
}

/// The eight named moon phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MoonPhase {
    NewMoon,
    WaxingCrescent,
    FirstQuarter,
    WaxingGibbous,
    FullMoon,
    WaningGibbous,
    LastQuarter,
    WaningCrescent,
}

impl MoonPhase {
    /// Name the phase for a synodic fraction from [`moon_phase`].
    ///
    /// Each principal phase owns the eighth of the cycle centred on it.
    pub fn from_fraction(phase: f64) -> Self {
        match (phase.rem_euclid(1.0) * 8.0).round() as u8 {
            1 => MoonPhase::WaxingCrescent,
            2 => MoonPhase::FirstQuarter,
            3 => MoonPhase::WaxingGibbous,
            4 => MoonPhase::FullMoon,
            5 => MoonPhase::WaningGibbous,
            6 => MoonPhase::LastQuarter,
            7 => MoonPhase::WaningCrescent,
            _ => MoonPhase::NewMoon,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MoonPhase::NewMoon => "New Moon",
            MoonPhase::WaxingCrescent => "Waxing Crescent",
            MoonPhase::FirstQuarter => "First Quarter",
            MoonPhase::WaxingGibbous => "Waxing Gibbous",
            MoonPhase::FullMoon => "Full Moon",
            MoonPhase::WaningGibbous => "Waning Gibbous",
            MoonPhase::LastQuarter => "Last Quarter",
            MoonPhase::WaningCrescent => "Waning Crescent",
        }
    }
}

impl std::fmt::Display for MoonPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::julian_date;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};

    fn jd(y: i32, m: u32, d: u32, h: u32) -> f64 {
        julian_date(&Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap())
    }

    #[test]
    fn test_sun_at_equinox() {
        // March equinox 2024: 2024-03-20 03:06 UTC
        let (lambda, r) = sun_ecliptic(jd(2024, 3, 20, 3));
        let lon = lambda.to_degrees();
        let off = if lon > 180.0 { lon - 360.0 } else { lon };
        assert!(off.abs() < 0.05, "longitude {}", lon);
        assert_relative_eq!(r, 0.996, epsilon = 0.002);

        let pos = sun_position(jd(2024, 3, 20, 3));
        assert!(pos.z.abs() / pos.norm() < 1e-3);
    }

    #[test]
    fn test_sun_at_june_solstice() {
        // Declination near +23.44 degrees
        let pos = sun_position(jd(2024, 6, 20, 21));
        let dec = (pos.z / pos.norm()).asin().to_degrees();
        assert_relative_eq!(dec, 23.44, epsilon = 0.02);
    }

    #[test]
    fn test_moon_distance_range() {
        for day in 0..30 {
            let r = moon_position(J2000 + day as f64).norm();
            assert!(r > 350_000.0 && r < 410_000.0, "moon distance {} km", r);
        }
    }

    #[test]
    fn test_full_and_new_moon() {
        // Full moon 2024-01-25 17:54 UTC, new moon 2024-02-09 22:59 UTC
        let full = jd(2024, 1, 25, 18);
        assert!(moon_illumination(full) > 0.98);
        assert_relative_eq!(moon_phase(full), 0.5, epsilon = 0.01);
        assert_eq!(MoonPhase::from_fraction(moon_phase(full)), MoonPhase::FullMoon);

        let new = jd(2024, 2, 9, 23);
        assert!(moon_illumination(new) < 0.02);
        assert_eq!(MoonPhase::from_fraction(moon_phase(new)), MoonPhase::NewMoon);
    }

    #[test]
    fn test_first_quarter_half_lit() {
        // First quarter 2024-02-16 15:01 UTC
        let t = jd(2024, 2, 16, 15);
        assert_relative_eq!(moon_illumination(t), 0.5, epsilon = 0.03);
        assert_eq!(MoonPhase::from_fraction(moon_phase(t)), MoonPhase::FirstQuarter);
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(MoonPhase::from_fraction(0.0), MoonPhase::NewMoon);
        assert_eq!(MoonPhase::from_fraction(0.97), MoonPhase::NewMoon);
        assert_eq!(MoonPhase::from_fraction(0.12), MoonPhase::WaxingCrescent);
        assert_eq!(MoonPhase::from_fraction(0.62), MoonPhase::WaningGibbous);
        assert_eq!(format!("{}", MoonPhase::LastQuarter), "Last Quarter");
    }
}
