use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use skywindow::catalog::{Gazetteer, GeocodeProvider, TleCatalog};
use skywindow::config::EngineConfig;
use skywindow::engine::{CancelToken, Engine};
use skywindow::export::{format_passes, write_export};
use skywindow::filters::FilterConfig;
use skywindow::toposlib::ObserverLocation;
use skywindow::weather::{HourlyForecast, WithTimeout};

#[derive(Parser)]
#[command(name = "skywindow")]
#[command(about = "Predict when satellites are visible from a location")]
struct Args {
    /// Two- or three-line element file
    #[arg(long)]
    tle: PathBuf,

    /// Hourly forecast file of `timestamp,condition` lines
    #[arg(long)]
    forecast: Option<PathBuf>,

    /// Observer latitude in degrees
    #[arg(long, allow_hyphen_values = true, required_unless_present_any = ["address", "list"])]
    lat: Option<f64>,

    /// Observer longitude in degrees, east positive
    #[arg(long, allow_hyphen_values = true, required_unless_present_any = ["address", "list"])]
    lon: Option<f64>,

    /// Observer elevation in meters
    #[arg(long, default_value = "0.0")]
    elev: f64,

    /// Observer UTC offset in hours
    #[arg(long, allow_hyphen_values = true, default_value = "0.0")]
    utc_offset: f64,

    /// Place name to look up in the gazetteer instead of --lat/--lon
    #[arg(long, requires = "gazetteer", conflicts_with_all = ["lat", "lon"])]
    address: Option<String>,

    /// File of `name;lat;lon[;elev[;utc_offset]]` lines
    #[arg(long)]
    gazetteer: Option<PathBuf>,

    /// Satellite name or NORAD number; repeat for the optimal search
    #[arg(short, long)]
    satellite: Vec<String>,

    /// Search several satellites for sunlit passes at night under clear sky
    #[arg(long)]
    optimal: bool,

    /// List the satellites in the element file and exit
    #[arg(long)]
    list: bool,

    /// Start of the horizon, RFC 3339 (default: now)
    #[arg(long)]
    start: Option<DateTime<Utc>>,

    /// Horizon length in days
    #[arg(long)]
    days: Option<f64>,

    /// Visibility threshold in degrees
    #[arg(long)]
    min_altitude: Option<f64>,

    #[arg(long)]
    sunlit_only: bool,
    #[arg(long)]
    moonlight_filter: bool,
    #[arg(long)]
    clear_sky_only: bool,
    #[arg(long)]
    night_only: bool,
    #[arg(long)]
    add_sunlit: bool,
    #[arg(long)]
    add_moon_warning: bool,
    #[arg(long)]
    add_forecast: bool,

    /// Write the listing to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl Args {
    fn filters(&self) -> FilterConfig {
        FilterConfig {
            sunlit_only: self.sunlit_only,
            moonlight_filter: self.moonlight_filter,
            clear_sky_only: self.clear_sky_only,
            night_only: self.night_only,
            add_sunlit: self.add_sunlit,
            add_moon_warning: self.add_moon_warning,
            add_forecast: self.add_forecast,
        }
    }

    fn observer(&self) -> Result<ObserverLocation, Box<dyn std::error::Error>> {
        if let (Some(address), Some(gazetteer)) = (&self.address, &self.gazetteer) {
            return Ok(Gazetteer::from_file(gazetteer)?.resolve(address)?);
        }
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => {
                Ok(ObserverLocation::new(lat, lon, self.elev).with_utc_offset_hours(self.utc_offset))
            }
            _ => Err("either --lat/--lon or --address is required".into()),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let args = Args::parse();

    let mut config = EngineConfig::from_env();
    if let Some(min_altitude) = args.min_altitude {
        config.detector.min_altitude_deg = min_altitude;
    }
    let timeout = config.weather_timeout();

    let catalog = TleCatalog::from_file(&args.tle)?;
    let forecast = match &args.forecast {
        Some(path) => HourlyForecast::from_file(path)?,
        None => HourlyForecast::default(),
    };
    let weather = WithTimeout::new(forecast, timeout);
    let engine = Engine::new(config, &catalog, &weather);

    if args.list {
        for id in engine.list_catalog()? {
            println!("{}", id);
        }
        return Ok(());
    }

    let observer = args.observer()?;
    let start = args.start.unwrap_or_else(Utc::now);
    info!("observer {}", observer);

    let passes = if args.optimal {
        let names: Vec<String> = if args.satellite.is_empty() {
            catalog.popular().into_iter().map(|id| id.name).collect()
        } else {
            args.satellite.clone()
        };
        let subset: Vec<&str> = names.iter().map(String::as_str).collect();
        let report = engine.find_optimal(&subset, &observer, start, args.days, &CancelToken::new())?;
        for failure in &report.failures {
            eprintln!("{}: {}", failure.satellite, failure.error);
        }
        report.passes().into_iter().cloned().collect()
    } else {
        let name = args
            .satellite
            .first()
            .ok_or("--satellite is required unless --optimal or --list is given")?;
        engine.predict(name, &observer, &args.filters(), start, args.days)?
    };

    match &args.output {
        Some(path) => write_export(path, &passes, observer.utc_offset())?,
        None => print!("{}", format_passes(&passes, observer.utc_offset())),
    }
    Ok(())
}
