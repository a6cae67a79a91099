//! skywindow
//!
//! Predicts when satellites are observable from a ground location over a
//! multi-day horizon, then annotates and filters those windows with the
//! conditions that decide whether a pass is worth going outside for: sunlight
//! on the satellite, darkness at the observer, moonlight and cloud cover.
//!
//! The pipeline is:
//!
//! ```text
//! TLE ─► sgp4lib ─► passes ─► filters (almanac + weather) ─► export
//! ```
//!
//! # Example
//!
//! ```ignore
//! use skywindow::catalog::TleCatalog;
//! use skywindow::engine::Engine;
//! use skywindow::filters::FilterConfig;
//! use skywindow::toposlib::ObserverLocation;
//! use skywindow::weather::HourlyForecast;
//!
//! let catalog = TleCatalog::from_file("active.tle")?;
//! let forecast = HourlyForecast::default();
//! let engine = Engine::new(Default::default(), &catalog, &forecast);
//!
//! let home = ObserverLocation::new(40.0, -75.0, 0.0).with_utc_offset_hours(-5.0);
//! let filters = FilterConfig { sunlit_only: true, night_only: true, ..Default::default() };
//! let passes = engine.predict("ISS (ZARYA)", &home, &filters, chrono::Utc::now(), None)?;
//! print!("{}", skywindow::export::format_passes(&passes, home.utc_offset()));
//! ```

pub mod almanac;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod eclipselib;
pub mod engine;
pub mod export;
pub mod filters;
pub mod passes;
pub mod planetlib;
pub mod searchlib;
pub mod sgp4lib;
pub mod time;
pub mod toposlib;
pub mod weather;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

/// Errors raised by the prediction engine and its collaborators.
#[derive(Debug, Error)]
pub enum SkywindowError {
    /// Propagation requested too far from the element set's epoch
    #[error(
        "elements for {satellite} are stale: epoch {epoch} is more than {max_age_days} days from {requested}"
    )]
    StaleElements {
        satellite: String,
        epoch: DateTime<Utc>,
        requested: DateTime<Utc>,
        max_age_days: f64,
    },

    /// Unknown satellite name or catalog number
    #[error("satellite not found: {0}")]
    NotFound(String),

    /// Address could not be turned into coordinates
    #[error("could not resolve address: {0}")]
    GeocodeError(String),

    /// Weather or catalog collaborator failed or timed out
    #[error("{provider} unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    /// An astronomical event does not occur on the given day
    #[error("no {event} on {date}")]
    NoEvent { event: &'static str, date: NaiveDate },

    #[error("data error: {0}")]
    DataError(String),

    #[error("calculation error: {0}")]
    CalculationError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, SkywindowError>;

pub use catalog::SatelliteId;
pub use engine::{Engine, OptimalReport};
pub use filters::FilterConfig;
pub use passes::Pass;
pub use toposlib::ObserverLocation;
