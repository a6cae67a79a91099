//! Plain-text pass listing
//!
//! One block per pass, blocks separated by a blank line:
//!
//! ```text
//! ISS (ZARYA) (#25544)
//!   rise  2024-01-10 16:55:12 -05:00  alt  10.0°  az 300.2° (WNW)  range 1480.3 km
//!   peak  2024-01-10 17:00:12 -05:00  alt  61.4°  az 220.9° (SW)   range  438.0 km
//!   set   2024-01-10 17:05:12 -05:00  alt  10.0°  az 130.6° (SE)   range 1479.8 km
//!   sunlit: Sunlit
//!   moon: 91% lit, 34.5° up
//!   forecast: Clear
//! ```
//!
//! Timestamps are written in the observer's local offset at whole-second
//! precision.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use tracing::info;

use crate::catalog::SatelliteId;
use crate::passes::{Pass, PassPoint, SunlitState, Truncation};
use crate::toposlib::cardinal_direction;
use crate::weather::SkyCondition;
use crate::{Result, SkywindowError};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S %:z";

fn format_point(out: &mut String, label: &str, point: &PassPoint, offset: FixedOffset) {
    let _ = writeln!(
        out,
        "  {:<5} {}  alt {:5.1}°  az {:5.1}° {:<6} range {:6.1} km",
        label,
        point.time.with_timezone(&offset).format(TIMESTAMP_FORMAT),
        point.altitude_deg,
        point.azimuth_deg,
        format!("({})", cardinal_direction(point.azimuth_deg)),
        point.range_km,
    );
}

/// Render passes as text with times in `offset`.
pub fn format_passes(passes: &[Pass], offset: FixedOffset) -> String {
    let mut out = String::new();
    for (i, pass) in passes.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "{}", pass.satellite);
        format_point(&mut out, "rise", &pass.rise, offset);
        format_point(&mut out, "peak", &pass.peak, offset);
        format_point(&mut out, "set", &pass.set, offset);

        if pass.truncated != Truncation::None {
            let _ = writeln!(out, "  truncated: {:?}", pass.truncated);
        }
        let notes = &pass.annotations;
        if let Some(sunlit) = notes.sunlit {
            let _ = writeln!(out, "  sunlit: {}", sunlit);
        }
        if let Some(moon) = notes.moon_warning {
            let _ = writeln!(
                out,
                "  moon: {:.0}% lit, {:.1}° up",
                moon.illumination * 100.0,
                moon.altitude_deg
            );
        }
        if let Some(forecast) = &notes.forecast {
            let _ = writeln!(out, "  forecast: {}", forecast);
        }
    }
    out
}

/// Write [`format_passes`] output to a file.
pub fn write_export<P: AsRef<Path>>(path: P, passes: &[Pass], offset: FixedOffset) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, format_passes(passes, offset))?;
    info!("exported {} passes to {}", passes.len(), path.display());
    Ok(())
}

/// A point read back from an export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExportedPoint {
    pub time: DateTime<Utc>,
    pub altitude_deg: f64,
    pub azimuth_deg: f64,
}

/// A pass read back from an export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedPass {
    pub satellite: SatelliteId,
    pub rise: ExportedPoint,
    pub peak: ExportedPoint,
    pub set: ExportedPoint,
    pub sunlit: Option<SunlitState>,
    pub forecast: Option<SkyCondition>,
}

#[derive(Default)]
struct Block {
    satellite: Option<SatelliteId>,
    rise: Option<ExportedPoint>,
    peak: Option<ExportedPoint>,
    set: Option<ExportedPoint>,
    sunlit: Option<SunlitState>,
    forecast: Option<SkyCondition>,
}

impl Block {
    fn finish(self, line: usize) -> Result<ExportedPass> {
        let missing = |what: &str| {
            SkywindowError::DataError(format!("export block ending at line {}: no {}", line, what))
        };
        Ok(ExportedPass {
            satellite: self.satellite.ok_or_else(|| missing("header"))?,
            rise: self.rise.ok_or_else(|| missing("rise"))?,
            peak: self.peak.ok_or_else(|| missing("peak"))?,
            set: self.set.ok_or_else(|| missing("set"))?,
            sunlit: self.sunlit,
            forecast: self.forecast,
        })
    }
}

fn parse_point(rest: &str, line: usize) -> Result<ExportedPoint> {
    let bad = |what: &str| SkywindowError::DataError(format!("export line {}: bad {}", line, what));
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    if tokens.len() < 7 || tokens[3] != "alt" || tokens[5] != "az" {
        return Err(bad("point"));
    }
    let stamp = tokens[..3].join(" ");
    let time = DateTime::parse_from_str(&stamp, TIMESTAMP_FORMAT)
        .map_err(|_| bad("timestamp"))?
        .with_timezone(&Utc);
    let degrees = |s: &str| s.trim_end_matches('°').parse::<f64>();
    Ok(ExportedPoint {
        time,
        altitude_deg: degrees(tokens[4]).map_err(|_| bad("altitude"))?,
        azimuth_deg: degrees(tokens[6]).map_err(|_| bad("azimuth"))?,
    })
}

/// Read back text written by [`format_passes`].
pub fn parse_export(text: &str) -> Result<Vec<ExportedPass>> {
    let mut passes = Vec::new();
    let mut block = Block::default();
    let mut last_line = 0;

    for (index, raw) in text.lines().enumerate() {
        let number = index + 1;
        last_line = number;
        if raw.trim().is_empty() {
            if block.satellite.is_some() {
                passes.push(std::mem::take(&mut block).finish(number)?);
            }
            continue;
        }
        if !raw.starts_with(' ') {
            if block.satellite.is_some() {
                passes.push(std::mem::take(&mut block).finish(number)?);
            }
            let id = raw.parse::<SatelliteId>().map_err(|e| {
                SkywindowError::DataError(format!("export line {}: bad header: {}", number, e))
            })?;
            block.satellite = Some(id);
            continue;
        }
        if block.satellite.is_none() {
            return Err(SkywindowError::DataError(format!(
                "export line {}: detail before any header",
                number
            )));
        }

        let line = raw.trim();
        let (key, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        match key {
            "rise" => block.rise = Some(parse_point(rest, number)?),
            "peak" => block.peak = Some(parse_point(rest, number)?),
            "set" => block.set = Some(parse_point(rest, number)?),
            "sunlit:" => {
                block.sunlit = Some(rest.parse().map_err(SkywindowError::DataError)?);
            }
            "forecast:" => block.forecast = Some(SkyCondition::parse(rest)),
            // moon and truncation lines are informational
            _ => {}
        }
    }
    if block.satellite.is_some() {
        passes.push(block.finish(last_line)?);
    }
    Ok(passes)
}
