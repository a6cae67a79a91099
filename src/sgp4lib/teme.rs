//! TEME (True Equator Mean Equinox) frame transformations
//!
//! TEME is the reference frame used by SGP4 for satellite positions.
//! Rotating it about the pole by Greenwich Mean Sidereal Time gives the
//! Earth-fixed pseudo-ITRS frame in which observers are stationary. Polar
//! motion (a few meters) is ignored.
//!
//! Reference: AIAA 2006-6753 (Revisiting Spacetrack Report #3)

use nalgebra::{Matrix3, Vector3};
use std::f64::consts::TAU;

use crate::constants::{DAYS_PER_CENTURY, DAY_S, EARTH_ANGVEL, J2000};

/// Compute Greenwich Mean Sidereal Time (1982 formulation)
///
/// Returns the GMST angle in radians, in `[0, 2π)`, for a UT1 (here UTC)
/// Julian date.
pub fn gmst1982(jd_ut1: f64) -> f64 {
    let frac = jd_ut1 - jd_ut1.floor();
    let t = (jd_ut1 - J2000) / DAYS_PER_CENTURY;

    // GMST polynomial in seconds of time, Vallado / AIAA 2006-6753
    let g = 67310.54841 + (8640184.812866 + (0.093104 + (-6.2e-6) * t) * t) * t;

    // Julian days begin at noon, which the polynomial's constant term absorbs
    (frac + g / DAY_S).rem_euclid(1.0) * TAU
}

/// Rotation matrix about the Z axis (frame rotation, not vector rotation)
pub(crate) fn rot_z(angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(c, s, 0.0, -s, c, 0.0, 0.0, 0.0, 1.0)
}

/// Rotate an inertial (TEME or equator-of-date) position into the
/// Earth-fixed frame at the given Julian date.
pub fn inertial_to_itrs(jd_ut1: f64, position: &Vector3<f64>) -> Vector3<f64> {
    rot_z(gmst1982(jd_ut1)) * position
}

/// Transform position and velocity from TEME to Earth-fixed coordinates.
///
/// Position in km, velocity in km/s. The velocity picks up the
/// `-ω × r` term of the rotating frame.
pub fn teme_to_itrs(
    jd_ut1: f64,
    pos_teme: &Vector3<f64>,
    vel_teme: &Vector3<f64>,
) -> (Vector3<f64>, Vector3<f64>) {
    let r = rot_z(gmst1982(jd_ut1));
    let pos = r * pos_teme;
    let omega = Vector3::new(0.0, 0.0, EARTH_ANGVEL);
    let vel = r * vel_teme - omega.cross(&pos);
    (pos, vel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gmst1982_at_j2000() {
        // GMST at J2000.0 is 18h 41m 50.548s = 280.4606 degrees
        let theta_deg = gmst1982(J2000).to_degrees();
        assert_relative_eq!(theta_deg, 280.4606, epsilon = 0.01);
    }

    #[test]
    fn test_gmst_advances_one_sidereal_day() {
        // After one solar day the Earth has turned ~360.9856 degrees
        let a = gmst1982(J2000);
        let b = gmst1982(J2000 + 1.0);
        let advance = (b - a).rem_euclid(TAU).to_degrees();
        assert_relative_eq!(advance, 0.9856, epsilon = 1e-3);
    }

    #[test]
    fn test_rot_z_90_degrees() {
        let r = rot_z(std::f64::consts::FRAC_PI_2);
        let v = Vector3::new(1.0, 0.0, 0.0);
        let result = r * v;
        assert_relative_eq!(result.x, 0.0, epsilon = 1e-10);
        assert_relative_eq!(result.y, -1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_teme_to_itrs_preserves_radius() {
        let pos = Vector3::new(6778.0, 120.0, -35.0);
        let vel = Vector3::new(0.1, 7.6, 0.2);
        let (p, v) = teme_to_itrs(2_460_000.25, &pos, &vel);
        assert_relative_eq!(p.norm(), pos.norm(), epsilon = 1e-9);
        // Rotating frame removes roughly omega * r = 0.49 km/s of eastward speed
        assert!(v.norm() < vel.norm());
    }
}
