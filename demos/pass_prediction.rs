//! Pass prediction example
//!
//! Loads an ISS element set, propagates it, then lists a few days of passes
//! over Philadelphia with sunlight and moon annotations.
//!
//! Run with: cargo run --example pass_prediction

use chrono::Duration;
use skywindow::almanac::{daily_astronomy, AnalyticEphemeris};
use skywindow::catalog::TleCatalog;
use skywindow::config::EngineConfig;
use skywindow::engine::Engine;
use skywindow::export::format_passes;
use skywindow::filters::FilterConfig;
use skywindow::sgp4lib::OrbitalElements;
use skywindow::toposlib::ObserverLocation;
use skywindow::weather::HourlyForecast;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ISS TLE (from September 2008)
    // In a real application, you would fetch this from Celestrak or Space-Track
    let line1 = "1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927";
    let line2 = "2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537";

    let iss = OrbitalElements::from_tle(line1, line2, Some("ISS (ZARYA)"))?;

    println!("=== Pass Prediction Example ===\n");
    println!("Satellite:  {}", iss.display_name());
    println!("NORAD ID:   {}", iss.norad_id);
    println!("Orbits/day: {:.2}", iss.revs_per_day);
    println!("Period:     {:.1} minutes", 24.0 * 60.0 / iss.revs_per_day);
    println!();

    let state = iss.propagate(&iss.epoch)?;
    println!("State at epoch {}:", iss.epoch.format("%Y-%m-%d %H:%M:%S UTC"));
    println!(
        "  TEME position: [{:.3}, {:.3}, {:.3}] km",
        state.position.x, state.position.y, state.position.z
    );
    println!("  Altitude:      {:.1} km", state.position.norm() - 6378.137);
    println!("  Speed:         {:.3} km/s", state.velocity.norm());
    println!();

    let philadelphia = ObserverLocation::new(39.95, -75.17, 12.0).with_utc_offset_hours(-4.0);
    let day = daily_astronomy(&philadelphia, iss.epoch.date_naive());
    println!("Almanac for {} at {}:", day.date, philadelphia);
    if let (Some(rise), Some(set)) = (day.sunrise, day.sunset) {
        println!("  Sunrise {}  Sunset {}", rise.format("%H:%M UTC"), set.format("%H:%M UTC"));
    }
    println!(
        "  Moon {:.0}% illuminated ({})",
        day.moon_illumination * 100.0,
        day.phase_name()
    );
    println!();

    let catalog = TleCatalog::new(vec![iss.clone()]);
    let forecast = HourlyForecast::default();
    let engine = Engine::new(EngineConfig::default(), &catalog, &forecast);
    let filters = FilterConfig {
        add_sunlit: true,
        add_moon_warning: true,
        ..Default::default()
    };

    let start = iss.epoch - Duration::hours(1);
    let passes = engine.predict("ISS (ZARYA)", &philadelphia, &filters, start, Some(3.0))?;
    println!("{} passes in 3 days:\n", passes.len());
    print!("{}", format_passes(&passes, philadelphia.utc_offset()));

    let ephemeris = AnalyticEphemeris::for_horizon(&philadelphia, start, 3.0)?;
    println!("\nAlmanac table covers {} days", ephemeris.table().len());

    Ok(())
}
