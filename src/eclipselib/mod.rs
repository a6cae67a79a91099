//! Earth shadow tests for satellites
//!
//! A satellite is visible to the naked eye only while it reflects sunlight,
//! so every topocentric sample carries a shadow test. Two geometric models
//! are provided:
//!
//! - [`ShadowModel::Cylindrical`]: Earth casts a shadow cylinder of its own
//!   radius along the anti-sun axis. Cheap and within a few seconds of the
//!   true umbra entry for low orbits.
//! - [`ShadowModel::Conical`]: the umbral cone narrowing behind the Earth,
//!   using the sun's finite radius.
//!
//! Penumbra is treated as sunlit in both models.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::constants::{EARTH_RADIUS_KM, SUN_RADIUS_KM};

/// Geometry used to decide whether a satellite is inside Earth's shadow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowModel {
    #[default]
    Cylindrical,
    Conical,
}

impl std::str::FromStr for ShadowModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cylindrical" | "cylinder" => Ok(ShadowModel::Cylindrical),
            "conical" | "cone" | "umbra" => Ok(ShadowModel::Conical),
            other => Err(format!("unknown shadow model '{}'", other)),
        }
    }
}

impl std::fmt::Display for ShadowModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShadowModel::Cylindrical => write!(f, "cylindrical"),
            ShadowModel::Conical => write!(f, "conical"),
        }
    }
}

/// Test whether a satellite is illuminated by the sun.
///
/// # Arguments
/// * `satellite` - Geocentric satellite position in km
/// * `sun` - Geocentric sun position in km, same frame
/// * `model` - Shadow geometry
pub fn is_sunlit(satellite: &Vector3<f64>, sun: &Vector3<f64>, model: ShadowModel) -> bool {
    let sun_distance = sun.norm();
    if sun_distance == 0.0 {
        return true;
    }
    let sun_dir = sun / sun_distance;

    // Projection onto the sun axis; positive means on the day side
    let along = satellite.dot(&sun_dir);
    if along >= 0.0 {
        return true;
    }
    let perpendicular = (satellite - sun_dir * along).norm();

    match model {
        ShadowModel::Cylindrical => perpendicular > EARTH_RADIUS_KM,
        ShadowModel::Conical => perpendicular > umbra_radius(-along, sun_distance),
    }
}

/// Radius of Earth's umbral cone at `behind_km` behind the Earth's centre.
///
/// Zero beyond the apex.
pub fn umbra_radius(behind_km: f64, sun_distance_km: f64) -> f64 {
    let half_angle = ((SUN_RADIUS_KM - EARTH_RADIUS_KM) / sun_distance_km).asin();
    let apex = EARTH_RADIUS_KM / half_angle.sin();
    ((apex - behind_km) * half_angle.tan()).max(0.0)
}
