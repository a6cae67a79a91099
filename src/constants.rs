//! Physical and calendar constants

/// Seconds per day
pub const DAY_S: f64 = 86_400.0;

/// Minutes per day
pub const DAY_MIN: f64 = 1_440.0;

/// Julian date of the J2000.0 epoch (2000-01-01 12:00 TT)
pub const J2000: f64 = 2_451_545.0;

/// Julian date of the Unix epoch (1970-01-01 00:00 UTC)
pub const UNIX_EPOCH_JD: f64 = 2_440_587.5;

/// Days per Julian century
pub const DAYS_PER_CENTURY: f64 = 36_525.0;

/// Astronomical unit in kilometers (IAU 2012)
pub const AU_KM: f64 = 149_597_870.700;

/// WGS84 equatorial radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6_378.137;

/// WGS84 inverse flattening
pub const WGS84_INVERSE_FLATTENING: f64 = 298.257_223_563;

/// Mean solar radius in kilometers
pub const SUN_RADIUS_KM: f64 = 696_340.0;

/// Earth rotation rate in radians per second
pub const EARTH_ANGVEL: f64 = 7.292_115_146_706_4e-5;

/// Full circle in radians
pub const TAU: f64 = std::f64::consts::TAU;
