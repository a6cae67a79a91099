//! Pass annotation and filtering
//!
//! A [`FilterConfig`] of independent toggles becomes a [`Pipeline`] of tagged
//! [`PassFilter`]s and [`Annotator`]s. For every pass the pipeline gathers the
//! context its stages need once (moon state, forecast, darkness at the
//! observer) into a [`PassContext`]. It then keeps the pass only if every
//! filter accepts it and finally lets each annotator attach its field.
//!
//! Filters are ANDed and read nothing but the pass and its context, so the
//! order they are added in never changes the result. Missing context (no
//! forecast near the peak, no sunset that day) never satisfies a filter.
//!
//! # Example
//!
//! ```ignore
//! use skywindow::filters::{apply_filters, Context, FilterConfig};
//!
//! let config = FilterConfig { night_only: true, add_moon_warning: true, ..Default::default() };
//! let context = Context::new(&ephemeris, &forecast, home);
//! let visible = apply_filters(passes, &config, &context)?;
//! ```

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::almanac::{EphemerisLookup, MoonState};
use crate::passes::{MoonWarning, Pass};
use crate::toposlib::ObserverLocation;
use crate::weather::{SkyCondition, WeatherProvider};
use crate::Result;

/// Default distance between a pass peak and the forecast sample describing it
pub const DEFAULT_FORECAST_TOLERANCE_MINUTES: i64 = 45;

/// Default illuminated fraction above which a risen moon spoils a pass
pub const DEFAULT_MOON_ILLUMINATION_THRESHOLD: f64 = 0.5;

/// Independently toggleable filters (first four) and annotators (last three).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Keep passes whose peak is in sunlight
    pub sunlit_only: bool,
    /// Drop passes with a bright moon above the horizon at peak
    pub moonlight_filter: bool,
    /// Keep passes with a clear forecast at peak
    pub clear_sky_only: bool,
    /// Keep passes peaking between sunset and sunrise
    pub night_only: bool,
    pub add_sunlit: bool,
    pub add_moon_warning: bool,
    pub add_forecast: bool,
}

impl FilterConfig {
    /// Settings used by the multi-satellite optimal search.
    pub fn optimal() -> Self {
        FilterConfig {
            sunlit_only: true,
            clear_sky_only: true,
            night_only: true,
            ..Default::default()
        }
    }

    pub fn pipeline(&self) -> Pipeline {
        let mut builder = PipelineBuilder::new();
        let filters = [
            (self.sunlit_only, PassFilter::SunlitOnly),
            (self.moonlight_filter, PassFilter::Moonlight),
            (self.clear_sky_only, PassFilter::ClearSky),
            (self.night_only, PassFilter::NightOnly),
        ];
        for (enabled, filter) in filters {
            if enabled {
                builder = builder.filter(filter);
            }
        }
        let annotators = [
            (self.add_sunlit, Annotator::Sunlit),
            (self.add_moon_warning, Annotator::MoonWarning),
            (self.add_forecast, Annotator::Forecast),
        ];
        for (enabled, annotator) in annotators {
            if enabled {
                builder = builder.annotate(annotator);
            }
        }
        builder.build()
    }
}

/// Exclusionary predicates over a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PassFilter {
    SunlitOnly,
    Moonlight,
    ClearSky,
    NightOnly,
}

impl PassFilter {
    fn needs(&self) -> Needs {
        match self {
            PassFilter::SunlitOnly => Needs::default(),
            PassFilter::Moonlight => Needs {
                moon: true,
                ..Default::default()
            },
            PassFilter::ClearSky => Needs {
                forecast: true,
                ..Default::default()
            },
            PassFilter::NightOnly => Needs {
                night: true,
                ..Default::default()
            },
        }
    }

    pub fn keep(&self, pass: &Pass, ctx: &PassContext) -> bool {
        match self {
            PassFilter::SunlitOnly => pass.peak.sunlit,
            PassFilter::Moonlight => ctx.moon_warning.is_none(),
            PassFilter::ClearSky => ctx.forecast.as_ref().is_some_and(SkyCondition::is_clear),
            PassFilter::NightOnly => ctx.night == Some(true),
        }
    }
}

/// Stages that attach a field to a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Annotator {
    Sunlit,
    MoonWarning,
    Forecast,
}

impl Annotator {
    fn needs(&self) -> Needs {
        match self {
            Annotator::Sunlit => Needs::default(),
            Annotator::MoonWarning => Needs {
                moon: true,
                ..Default::default()
            },
            Annotator::Forecast => Needs {
                forecast: true,
                ..Default::default()
            },
        }
    }

    pub fn apply(&self, pass: &mut Pass, ctx: &PassContext) {
        match self {
            Annotator::Sunlit => pass.annotations.sunlit = Some(pass.sunlit_state),
            Annotator::MoonWarning => pass.annotations.moon_warning = ctx.moon_warning,
            Annotator::Forecast => {
                pass.annotations.forecast = Some(ctx.forecast.clone().unwrap_or_default())
            }
        }
    }
}

/// Which context a pipeline has to gather.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Needs {
    moon: bool,
    forecast: bool,
    night: bool,
}

impl Needs {
    fn union(self, other: Needs) -> Needs {
        Needs {
            moon: self.moon || other.moon,
            forecast: self.forecast || other.forecast,
            night: self.night || other.night,
        }
    }
}

/// Collaborators and thresholds shared by every pass in a run.
pub struct Context<'a> {
    pub ephemeris: &'a dyn EphemerisLookup,
    pub weather: &'a dyn WeatherProvider,
    pub observer: ObserverLocation,
    pub forecast_tolerance: Duration,
    pub moon_illumination_threshold: f64,
}

impl<'a> Context<'a> {
    pub fn new(
        ephemeris: &'a dyn EphemerisLookup,
        weather: &'a dyn WeatherProvider,
        observer: ObserverLocation,
    ) -> Self {
        Context {
            ephemeris,
            weather,
            observer,
            forecast_tolerance: Duration::minutes(DEFAULT_FORECAST_TOLERANCE_MINUTES),
            moon_illumination_threshold: DEFAULT_MOON_ILLUMINATION_THRESHOLD,
        }
    }

    /// A risen moon brighter than the threshold.
    pub fn moon_warning(&self, moon: &MoonState) -> Option<MoonWarning> {
        (moon.altitude_deg > 0.0 && moon.illumination > self.moon_illumination_threshold).then(
            || MoonWarning {
                illumination: moon.illumination,
                phase: moon.phase,
                altitude_deg: moon.altitude_deg,
            },
        )
    }

    /// Forecast condition at the pass peak, `Unknown` when the nearest
    /// sample is further away than the tolerance.
    pub fn forecast_at_peak(&self, pass: &Pass) -> Result<SkyCondition> {
        let peak = pass.peak.time;
        let sample = self.weather.lookup(&self.observer, &peak)?;
        Ok(match sample {
            Some(s)
                if s.timestamp - peak <= self.forecast_tolerance
                    && peak - s.timestamp <= self.forecast_tolerance =>
            {
                s.condition
            }
            _ => SkyCondition::Unknown,
        })
    }

    fn pass_context(&self, pass: &Pass, needs: Needs) -> Result<PassContext> {
        let moon_warning = if needs.moon {
            self.moon_warning(&self.ephemeris.moon_at(&pass.peak.time))
        } else {
            None
        };
        let forecast = if needs.forecast {
            Some(self.forecast_at_peak(pass)?)
        } else {
            None
        };
        let night = if needs.night {
            match self.ephemeris.is_night(&pass.peak.time) {
                Ok(night) => Some(night),
                Err(e) => {
                    debug!("{}: darkness undecidable at peak: {}", pass.satellite, e);
                    None
                }
            }
        } else {
            None
        };
        Ok(PassContext {
            moon_warning,
            forecast,
            night,
        })
    }
}

/// Context gathered once per pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassContext {
    pub moon_warning: Option<MoonWarning>,
    pub forecast: Option<SkyCondition>,
    /// `None` when sunset or sunrise is missing around the peak
    pub night: Option<bool>,
}

/// Collects filters and annotators in any order.
#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder {
    filters: Vec<PassFilter>,
    annotators: Vec<Annotator>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: PassFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn annotate(mut self, annotator: Annotator) -> Self {
        self.annotators.push(annotator);
        self
    }

    pub fn build(mut self) -> Pipeline {
        self.filters.sort();
        self.filters.dedup();
        self.annotators.sort();
        self.annotators.dedup();
        Pipeline {
            filters: self.filters,
            annotators: self.annotators,
        }
    }
}

/// A built set of filters and annotators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    filters: Vec<PassFilter>,
    annotators: Vec<Annotator>,
}

impl Pipeline {
    pub fn filters(&self) -> &[PassFilter] {
        &self.filters
    }

    pub fn annotators(&self) -> &[Annotator] {
        &self.annotators
    }

    fn needs(&self) -> Needs {
        self.filters
            .iter()
            .map(PassFilter::needs)
            .chain(self.annotators.iter().map(Annotator::needs))
            .fold(Needs::default(), Needs::union)
    }

    /// Filter the passes, then annotate the survivors.
    pub fn run(&self, passes: Vec<Pass>, ctx: &Context<'_>) -> Result<Vec<Pass>> {
        let needs = self.needs();
        let total = passes.len();
        let mut kept = Vec::with_capacity(total);

        for mut pass in passes {
            let pass_ctx = ctx.pass_context(&pass, needs)?;
            if let Some(rejected) = self.filters.iter().find(|f| !f.keep(&pass, &pass_ctx)) {
                debug!(
                    "{}: pass peaking {} removed by {:?}",
                    pass.satellite, pass.peak.time, rejected
                );
                continue;
            }
            for annotator in &self.annotators {
                annotator.apply(&mut pass, &pass_ctx);
            }
            kept.push(pass);
        }

        debug!("filters kept {} of {} passes", kept.len(), total);
        Ok(kept)
    }
}

/// Attach the configured annotations to one pass without filtering it.
pub fn annotate(pass: Pass, context: &Context<'_>, config: &FilterConfig) -> Result<Pass> {
    let pipeline = FilterConfig {
        add_sunlit: config.add_sunlit,
        add_moon_warning: config.add_moon_warning,
        add_forecast: config.add_forecast,
        ..Default::default()
    }
    .pipeline();

    let pass_ctx = context.pass_context(&pass, pipeline.needs())?;
    let mut pass = pass;
    for annotator in pipeline.annotators() {
        annotator.apply(&mut pass, &pass_ctx);
    }
    Ok(pass)
}

/// Run the full pipeline a config describes.
pub fn apply_filters(
    passes: Vec<Pass>,
    config: &FilterConfig,
    context: &Context<'_>,
) -> Result<Vec<Pass>> {
    config.pipeline().run(passes, context)
}
