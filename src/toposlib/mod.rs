//! Geographic observer positions on Earth
//!
//! Represents an observer at a geographic location and computes where a
//! satellite appears in their local sky.
//!
//! The key transformation chain is:
//! ```text
//! Geographic (lat/lon/elev) → Earth-fixed xyz ─┐
//! SGP4 TEME state → Earth-fixed xyz ───────────┴─► difference → south/east/up → alt/az
//! ```
//!
//! # Example
//!
//! ```ignore
//! use skywindow::toposlib::{topocentric, ObserverLocation};
//! use skywindow::eclipselib::ShadowModel;
//!
//! let home = ObserverLocation::new(40.0, -75.0, 0.0);
//! let state = iss.propagate(&t)?;
//! let sun = skywindow::planetlib::sun_position(julian_date(&t));
//! let sample = topocentric(&state, &home.position(), &sun, ShadowModel::Cylindrical);
//! println!("alt {:.1}° az {:.1}°", sample.altitude_deg, sample.azimuth_deg);
//! ```

use chrono::{DateTime, FixedOffset, Utc};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::constants::{EARTH_RADIUS_KM, WGS84_INVERSE_FLATTENING};
use crate::eclipselib::{is_sunlit, ShadowModel};
use crate::sgp4lib::StateVector;
use crate::time::offset_from_hours;

/// An Earth ellipsoid model used for geodetic-to-geocentric conversion.
#[derive(Debug, Clone)]
pub struct Geoid {
    /// Name of the geoid model
    pub name: &'static str,
    /// Equatorial radius in kilometers
    pub radius_km: f64,
    /// Inverse flattening (a / (a - b))
    pub inverse_flattening: f64,
    /// (1 - f)^2, precomputed
    one_minus_flattening_squared: f64,
}

impl Geoid {
    /// Create a new geoid model.
    pub const fn new(name: &'static str, radius_km: f64, inverse_flattening: f64) -> Self {
        let f = 1.0 / inverse_flattening;
        let omf = 1.0 - f;
        Geoid {
            name,
            radius_km,
            inverse_flattening,
            one_minus_flattening_squared: omf * omf,
        }
    }

    /// Create a geographic position on this ellipsoid.
    ///
    /// # Arguments
    /// * `latitude_degrees`: Geodetic latitude in degrees (positive north)
    /// * `longitude_degrees`: Geodetic longitude in degrees (positive east)
    /// * `elevation_m`: Height above ellipsoid in meters
    pub fn latlon(
        &self,
        latitude_degrees: f64,
        longitude_degrees: f64,
        elevation_m: f64,
    ) -> GeographicPosition {
        let lat = latitude_degrees.to_radians();
        let lon = longitude_degrees.to_radians();

        let (sinphi, cosphi) = lat.sin_cos();

        // Radius of curvature in the prime vertical
        let c =
            1.0 / (cosphi * cosphi + sinphi * sinphi * self.one_minus_flattening_squared).sqrt();
        let s = self.one_minus_flattening_squared * c;

        let elevation_km = elevation_m / 1000.0;

        let xy = (self.radius_km * c + elevation_km) * cosphi;
        let x = xy * lon.cos();
        let y = xy * lon.sin();
        let z = (self.radius_km * s + elevation_km) * sinphi;

        GeographicPosition {
            latitude: lat,
            longitude: lon,
            elevation_m,
            itrs_xyz: Vector3::new(x, y, z),
        }
    }
}

/// WGS84 ellipsoid (GPS standard)
pub const WGS84: Geoid = Geoid::new("WGS84", EARTH_RADIUS_KM, WGS84_INVERSE_FLATTENING);

/// A geographic position on Earth's surface.
///
/// Holds the geodetic coordinates and precomputed Earth-fixed position vector.
#[derive(Debug, Clone)]
pub struct GeographicPosition {
    /// Geodetic latitude in radians
    pub latitude: f64,
    /// Geodetic longitude in radians
    pub longitude: f64,
    /// Elevation above ellipsoid in meters
    pub elevation_m: f64,
    /// Earth-fixed position in km
    pub itrs_xyz: Vector3<f64>,
}

impl GeographicPosition {
    /// Rotate an Earth-fixed direction vector into local horizon coordinates.
    ///
    /// Returns (altitude_radians, azimuth_radians).
    pub(crate) fn itrs_to_horizon(&self, itrs_direction: &Vector3<f64>) -> (f64, f64) {
        let slat = self.latitude.sin();
        let clat = self.latitude.cos();
        let slon = self.longitude.sin();
        let clon = self.longitude.cos();

        // R = R_y(90° - lat) × R_z(lon)
        let south = slat * clon * itrs_direction.x + slat * slon * itrs_direction.y
            - clat * itrs_direction.z;
        let east = -slon * itrs_direction.x + clon * itrs_direction.y;
        let up = clat * clon * itrs_direction.x
            + clat * slon * itrs_direction.y
            + slat * itrs_direction.z;

        let alt = up.atan2(south.hypot(east));

        // Clockwise from north, and north is -south
        let mut az = east.atan2(-south);
        if az < 0.0 {
            az += 2.0 * PI;
        }

        (alt, az)
    }

    /// Altitude, azimuth (degrees) and range (km) of an Earth-fixed target.
    pub fn altaz_of(&self, target_itrs: &Vector3<f64>) -> (f64, f64, f64) {
        let los = target_itrs - self.itrs_xyz;
        let (alt, az) = self.itrs_to_horizon(&los);
        (alt.to_degrees(), az.to_degrees(), los.norm())
    }
}

impl std::fmt::Display for GeographicPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lat_d = self.latitude.to_degrees();
        let lon_d = self.longitude.to_degrees();
        let ns = if lat_d >= 0.0 { "N" } else { "S" };
        let ew = if lon_d >= 0.0 { "E" } else { "W" };
        write!(
            f,
            "{:.4}° {}, {:.4}° {}, {:.1} m",
            lat_d.abs(),
            ns,
            lon_d.abs(),
            ew,
            self.elevation_m
        )
    }
}

/// A ground observer: geodetic coordinates plus the fixed UTC offset used
/// to define local calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObserverLocation {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    #[serde(default)]
    pub elevation_m: f64,
    /// Seconds east of UTC
    #[serde(default)]
    pub utc_offset_seconds: i32,
}

impl ObserverLocation {
    /// Observer at the given coordinates with a UTC clock.
    pub fn new(latitude_deg: f64, longitude_deg: f64, elevation_m: f64) -> Self {
        ObserverLocation {
            latitude_deg,
            longitude_deg,
            elevation_m,
            utc_offset_seconds: 0,
        }
    }

    pub fn with_utc_offset_hours(mut self, hours: f64) -> Self {
        self.utc_offset_seconds = offset_from_hours(hours).local_minus_utc();
        self
    }

    /// The observer's local timezone as a fixed offset.
    pub fn utc_offset(&self) -> FixedOffset {
        offset_from_hours(self.utc_offset_seconds as f64 / 3600.0)
    }

    /// Position on the WGS84 ellipsoid.
    pub fn position(&self) -> GeographicPosition {
        WGS84.latlon(self.latitude_deg, self.longitude_deg, self.elevation_m)
    }
}

impl std::fmt::Display for ObserverLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.position())
    }
}

/// Where a satellite appears from the observer at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TopocentricSample {
    pub timestamp: DateTime<Utc>,
    pub altitude_deg: f64,
    /// Degrees clockwise from north
    pub azimuth_deg: f64,
    pub range_km: f64,
    /// Whether the satellite itself is in sunlight (not whether the
    /// observer is in darkness)
    pub sunlit: bool,
}

/// Compute the topocentric view of a satellite state.
///
/// `sun_position` is the geocentric sun vector in km in an inertial
/// equator-of-date frame. The shadow test runs in the inertial frame
/// against the TEME satellite position, the sub-arcsecond frame difference
/// being irrelevant for Earth's shadow.
pub fn topocentric(
    state: &StateVector,
    observer: &GeographicPosition,
    sun_position: &Vector3<f64>,
    shadow: ShadowModel,
) -> TopocentricSample {
    let (altitude_deg, azimuth_deg, range_km) = observer.altaz_of(&state.position_itrs);
    TopocentricSample {
        timestamp: state.timestamp,
        altitude_deg,
        azimuth_deg,
        range_km,
        sunlit: is_sunlit(&state.position, sun_position, shadow),
    }
}

const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// 16-point compass name for an azimuth in degrees.
pub fn cardinal_direction(azimuth_deg: f64) -> &'static str {
    let index = (azimuth_deg.rem_euclid(360.0) / 22.5).round() as usize % 16;
    COMPASS_POINTS[index]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn state_at(position_itrs: Vector3<f64>) -> StateVector {
        StateVector {
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            position: position_itrs,
            velocity: Vector3::zeros(),
            position_itrs,
            velocity_itrs: Vector3::zeros(),
        }
    }

    #[test]
    fn test_latlon_equator_prime_meridian() {
        let pos = WGS84.latlon(0.0, 0.0, 0.0);
        assert_relative_eq!(pos.itrs_xyz.x, WGS84.radius_km, epsilon = 1e-9);
        assert_relative_eq!(pos.itrs_xyz.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(pos.itrs_xyz.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_latlon_north_pole() {
        let pos = WGS84.latlon(90.0, 0.0, 0.0);
        assert_relative_eq!(pos.itrs_xyz.x, 0.0, epsilon = 1e-9);
        // Polar radius is about 21 km shorter than equatorial
        assert_relative_eq!(pos.itrs_xyz.z, 6356.752, epsilon = 1e-3);
    }

    #[test]
    fn test_elevation_adds_height() {
        let low = WGS84.latlon(45.0, 10.0, 0.0);
        let high = WGS84.latlon(45.0, 10.0, 1000.0);
        assert_relative_eq!((high.itrs_xyz - low.itrs_xyz).norm(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zenith_is_altitude_90() {
        let observer = WGS84.latlon(0.0, 0.0, 0.0);
        let state = state_at(Vector3::new(EARTH_RADIUS_KM + 400.0, 0.0, 0.0));
        let sample = topocentric(
            &state,
            &observer,
            &Vector3::new(1.5e8, 0.0, 0.0),
            ShadowModel::Cylindrical,
        );
        assert_relative_eq!(sample.altitude_deg, 90.0, epsilon = 1e-9);
        assert_relative_eq!(sample.range_km, 400.0, epsilon = 1e-9);
        assert!(sample.sunlit);
    }

    #[test]
    fn test_azimuth_north_and_east() {
        let observer = WGS84.latlon(0.0, 0.0, 0.0);

        // Target displaced toward +z (north) near the horizon
        let (_, az_north, _) = observer.altaz_of(&(observer.itrs_xyz + Vector3::new(0.0, 0.0, 100.0)));
        assert_relative_eq!(az_north, 0.0, epsilon = 1e-9);

        // +y at the prime meridian points east
        let (alt, az_east, _) =
            observer.altaz_of(&(observer.itrs_xyz + Vector3::new(0.0, 100.0, 0.0)));
        assert_relative_eq!(az_east, 90.0, epsilon = 1e-9);
        assert_relative_eq!(alt, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_below_horizon_is_negative() {
        let observer = WGS84.latlon(0.0, 0.0, 0.0);
        let (alt, _, _) = observer.altaz_of(&Vector3::new(-EARTH_RADIUS_KM - 400.0, 0.0, 0.0));
        assert!(alt < -80.0);
    }

    #[test]
    fn test_observer_offset() {
        let home = ObserverLocation::new(40.0, -75.0, 0.0).with_utc_offset_hours(-5.0);
        assert_eq!(home.utc_offset_seconds, -18_000);
        assert_eq!(home.utc_offset().local_minus_utc(), -18_000);
    }

    #[test]
    fn test_cardinal_direction() {
        assert_eq!(cardinal_direction(0.0), "N");
        assert_eq!(cardinal_direction(359.0), "N");
        assert_eq!(cardinal_direction(45.0), "NE");
        assert_eq!(cardinal_direction(100.0), "E");
        assert_eq!(cardinal_direction(202.5), "SSW");
        assert_eq!(cardinal_direction(-90.0), "W");
    }

    #[test]
    fn test_display() {
        let home = ObserverLocation::new(40.0, -75.0, 12.0);
        assert_eq!(format!("{}", home), "40.0000° N, 75.0000° W, 12.0 m");
    }
}
