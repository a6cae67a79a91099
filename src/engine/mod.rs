//! Prediction facade
//!
//! [`Engine`] ties the catalog, the pass detector, the almanac and the filter
//! pipeline together. [`Engine::predict`] answers for one satellite and
//! surfaces errors directly; [`Engine::find_optimal`] fans out over a list of
//! satellites on the rayon pool and reports failures per satellite.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::almanac::{AnalyticEphemeris, EphemerisLookup};
use crate::catalog::{CatalogProvider, SatelliteId};
use crate::config::EngineConfig;
use crate::filters::{apply_filters, Context, FilterConfig};
use crate::passes::{detect_passes, validate_horizon, Pass};
use crate::toposlib::ObserverLocation;
use crate::weather::WeatherProvider;
use crate::Result;

/// Shared flag for abandoning a multi-satellite search.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A satellite the optimal search could not process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SatelliteFailure {
    pub satellite: String,
    pub error: String,
}

/// Outcome of [`Engine::find_optimal`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct OptimalReport {
    /// Surviving passes per requested satellite, possibly empty
    pub results: BTreeMap<String, Vec<Pass>>,
    pub failures: Vec<SatelliteFailure>,
    /// Satellites not started because the search was cancelled
    pub skipped: Vec<String>,
}

impl OptimalReport {
    /// Every surviving pass, ordered by rise time.
    pub fn passes(&self) -> Vec<&Pass> {
        let mut all: Vec<&Pass> = self.results.values().flatten().collect();
        all.sort_by_key(|p| p.rise.time);
        all
    }
}

enum Outcome {
    Done(Vec<Pass>),
    Failed(String),
    Skipped,
}

pub struct Engine<'a> {
    config: EngineConfig,
    catalog: &'a dyn CatalogProvider,
    weather: &'a dyn WeatherProvider,
}

impl<'a> Engine<'a> {
    pub fn new(
        config: EngineConfig,
        catalog: &'a dyn CatalogProvider,
        weather: &'a dyn WeatherProvider,
    ) -> Self {
        Engine {
            config,
            catalog,
            weather,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn list_catalog(&self) -> Result<Vec<SatelliteId>> {
        self.catalog.list()
    }

    /// Detect, filter and annotate the passes of one satellite.
    ///
    /// `horizon_days` defaults to the configured horizon.
    pub fn predict(
        &self,
        satellite: &str,
        observer: &ObserverLocation,
        filters: &FilterConfig,
        start: DateTime<Utc>,
        horizon_days: Option<f64>,
    ) -> Result<Vec<Pass>> {
        let horizon = horizon_days.unwrap_or(self.config.horizon_days);
        let passes = self.detect(satellite, observer, start, horizon)?;
        let ephemeris = AnalyticEphemeris::for_horizon(observer, start, horizon)?;
        self.filter(passes, observer, filters, &ephemeris)
    }

    /// Run the optimal-window filters over several satellites at once.
    ///
    /// Only sunlit passes at night with a clear forecast survive. A satellite
    /// that cannot be looked up or propagated is reported in `failures`
    /// without affecting the others. Only a horizon no element set could
    /// cover fails the whole call.
    pub fn find_optimal(
        &self,
        subset: &[&str],
        observer: &ObserverLocation,
        start: DateTime<Utc>,
        horizon_days: Option<f64>,
        cancel: &CancelToken,
    ) -> Result<OptimalReport> {
        let horizon = horizon_days.unwrap_or(self.config.horizon_days);
        validate_horizon(horizon, self.config.max_epoch_age_days)?;
        let filters = FilterConfig::optimal();
        let ephemeris = AnalyticEphemeris::for_horizon(observer, start, horizon)?;
        info!(
            "optimal search over {} satellites, {} days from {}",
            subset.len(),
            horizon,
            start
        );

        let outcomes: Vec<(String, Outcome)> = subset
            .par_iter()
            .map(|name| {
                if cancel.is_cancelled() {
                    return (name.to_string(), Outcome::Skipped);
                }
                let outcome = self
                    .detect(name, observer, start, horizon)
                    .and_then(|passes| self.filter(passes, observer, &filters, &ephemeris));
                match outcome {
                    Ok(passes) => (name.to_string(), Outcome::Done(passes)),
                    Err(e) => {
                        warn!("{}: {}", name, e);
                        (name.to_string(), Outcome::Failed(e.to_string()))
                    }
                }
            })
            .collect();

        let mut report = OptimalReport::default();
        for (name, outcome) in outcomes {
            match outcome {
                Outcome::Done(passes) => {
                    report.results.insert(name, passes);
                }
                Outcome::Failed(error) => report.failures.push(SatelliteFailure {
                    satellite: name,
                    error,
                }),
                Outcome::Skipped => report.skipped.push(name),
            }
        }
        if !report.skipped.is_empty() {
            info!("search cancelled, {} satellites skipped", report.skipped.len());
        }
        Ok(report)
    }

    fn detect(
        &self,
        satellite: &str,
        observer: &ObserverLocation,
        start: DateTime<Utc>,
        horizon_days: f64,
    ) -> Result<Vec<Pass>> {
        let elements = self
            .catalog
            .get_elements(satellite)?
            .with_max_epoch_age(self.config.max_epoch_age_days);
        let passes = detect_passes(&elements, observer, start, horizon_days, &self.config.detector)?;
        debug!("{}: {} raw passes", elements.display_name(), passes.len());
        Ok(passes)
    }

    fn filter(
        &self,
        passes: Vec<Pass>,
        observer: &ObserverLocation,
        filters: &FilterConfig,
        ephemeris: &dyn EphemerisLookup,
    ) -> Result<Vec<Pass>> {
        let context = Context {
            forecast_tolerance: self.config.forecast_tolerance(),
            moon_illumination_threshold: self.config.moon_illumination_threshold,
            ..Context::new(ephemeris, self.weather, *observer)
        };
        apply_filters(passes, filters, &context)
    }
}
