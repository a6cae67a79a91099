//! Satellite catalogs and place lookup
//!
//! The engine asks a [`CatalogProvider`] for element sets by name or NORAD
//! number and a [`GeocodeProvider`] for observer coordinates. Fetching
//! either from the network is left to the caller; [`TleCatalog`] and
//! [`Gazetteer`] serve already-loaded data.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::sgp4lib::{parse_tle_file, OrbitalElements};
use crate::time::offset_from_hours;
use crate::toposlib::ObserverLocation;
use crate::{Result, SkywindowError};

/// Frequently observed satellites, offered as the default selection.
pub const POPULAR_SATELLITES: &[&str] = &[
    "ISS (ZARYA)",
    "CSS (TIANHE)",
    "NOAA 15",
    "NOAA 18",
    "NOAA 19",
    "METOP-B",
    "NORSAT 1",
    "NORSAT 2",
    "NORSAT 3",
    "AISSAT 1",
    "AISSAT 2",
    "CENTAURI-1",
    "CENTAURI-3 (TYVAK-0210)",
    "ITASAT",
    "KKS-1 (KISEKI)",
    "ZHUHAI-1 02 (CAS-4B)",
    "PROXIMA I",
    "PROXIMA II",
    "KHAYYAM",
];

/// Name and catalog number of a satellite, shown as `NAME (#NORAD)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SatelliteId {
    pub name: String,
    pub norad_id: u64,
}

impl SatelliteId {
    pub fn new(name: impl Into<String>, norad_id: u64) -> Self {
        SatelliteId {
            name: name.into(),
            norad_id,
        }
    }
}

impl std::fmt::Display for SatelliteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (#{})", self.name, self.norad_id)
    }
}

impl std::str::FromStr for SatelliteId {
    type Err = SkywindowError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let malformed = || SkywindowError::DataError(format!("malformed satellite id '{}'", s));

        let open = s.rfind(" (#").ok_or_else(malformed)?;
        let digits = s[open + 3..].strip_suffix(')').ok_or_else(malformed)?;
        let norad_id = digits.parse().map_err(|_| malformed())?;
        Ok(SatelliteId::new(&s[..open], norad_id))
    }
}

/// Source of orbital element sets.
pub trait CatalogProvider: Sync {
    /// Every satellite the catalog knows.
    fn list(&self) -> Result<Vec<SatelliteId>>;

    /// Element set for a satellite name, NORAD number, `#NORAD` or
    /// `NAME (#NORAD)`. Fails with `NotFound` if unknown.
    fn get_elements(&self, name_or_id: &str) -> Result<OrbitalElements>;
}

/// In-memory catalog over parsed TLE data.
#[derive(Debug, Clone, Default)]
pub struct TleCatalog {
    entries: Vec<OrbitalElements>,
}

impl TleCatalog {
    pub fn new(entries: Vec<OrbitalElements>) -> Self {
        TleCatalog { entries }
    }

    /// Parse two- or three-line TLE text.
    pub fn from_tle_text(text: &str) -> Result<Self> {
        let entries = parse_tle_file(text)?;
        info!("loaded {} element sets", entries.len());
        Ok(TleCatalog { entries })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("reading TLE catalog from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_tle_text(&text)
    }

    /// Apply a staleness threshold to every element set.
    pub fn with_max_epoch_age(mut self, days: f64) -> Self {
        self.entries = self
            .entries
            .into_iter()
            .map(|e| e.with_max_epoch_age(days))
            .collect();
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entries of [`POPULAR_SATELLITES`] present in this catalog.
    pub fn popular(&self) -> Vec<SatelliteId> {
        POPULAR_SATELLITES
            .iter()
            .filter_map(|name| self.find(name))
            .map(OrbitalElements::id)
            .collect()
    }

    fn find(&self, query: &str) -> Option<&OrbitalElements> {
        let query = query.trim();
        if let Ok(id) = query.parse::<SatelliteId>() {
            return self.entries.iter().find(|e| e.norad_id == id.norad_id);
        }
        if let Ok(norad_id) = query.trim_start_matches('#').parse::<u64>() {
            return self.entries.iter().find(|e| e.norad_id == norad_id);
        }
        self.entries
            .iter()
            .find(|e| e.display_name().eq_ignore_ascii_case(query))
    }
}

impl CatalogProvider for TleCatalog {
    fn list(&self) -> Result<Vec<SatelliteId>> {
        Ok(self.entries.iter().map(OrbitalElements::id).collect())
    }

    fn get_elements(&self, name_or_id: &str) -> Result<OrbitalElements> {
        self.find(name_or_id)
            .cloned()
            .ok_or_else(|| SkywindowError::NotFound(name_or_id.trim().to_string()))
    }
}

/// Resolves free-text addresses to observer locations.
pub trait GeocodeProvider: Sync {
    fn resolve(&self, address: &str) -> Result<ObserverLocation>;
}

/// Fixed table of named places.
#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    places: HashMap<String, ObserverLocation>,
}

fn normalize(address: &str) -> String {
    address
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl Gazetteer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_place(mut self, name: &str, location: ObserverLocation) -> Self {
        self.places.insert(normalize(name), location);
        self
    }

    /// Parse `name;latitude;longitude[;elevation_m[;utc_offset_hours]]`
    /// lines. Names may contain commas.
    pub fn parse(text: &str) -> Result<Self> {
        let mut gazetteer = Gazetteer::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split(';').map(str::trim).collect();
            if fields.len() < 3 {
                return Err(SkywindowError::DataError(format!(
                    "gazetteer line {}: expected 'name;latitude;longitude'",
                    number + 1
                )));
            }
            let number_at = |i: usize| -> Result<f64> {
                fields.get(i).map_or(Ok(0.0), |f| {
                    f.parse().map_err(|_| {
                        SkywindowError::DataError(format!(
                            "gazetteer line {}: '{}' is not a number",
                            number + 1,
                            f
                        ))
                    })
                })
            };
            let mut location = ObserverLocation::new(number_at(1)?, number_at(2)?, number_at(3)?);
            location.utc_offset_seconds = offset_from_hours(number_at(4)?).local_minus_utc();
            gazetteer = gazetteer.with_place(fields[0], location);
        }
        Ok(gazetteer)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }
}

impl GeocodeProvider for Gazetteer {
    fn resolve(&self, address: &str) -> Result<ObserverLocation> {
        let key = normalize(address);
        if key.is_empty() {
            return Err(SkywindowError::GeocodeError("empty address".into()));
        }
        self.places
            .get(&key)
            .copied()
            .ok_or_else(|| SkywindowError::GeocodeError(address.trim().to_string()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::sgp4lib::tests::{iss_like_tle, ISS_LINE1, ISS_LINE2};

    pub(crate) fn catalog_text() -> String {
        let (n1, n2) = iss_like_tle(28654, "24001.50000000");
        format!(
            "ISS (ZARYA)\n{}\n{}\nNOAA 18\n{}\n{}\n",
            ISS_LINE1, ISS_LINE2, n1, n2
        )
    }

    #[test]
    fn test_satellite_id_display_and_parse() {
        let id = SatelliteId::new("CENTAURI-3 (TYVAK-0210)", 43809);
        let text = id.to_string();
        assert_eq!(text, "CENTAURI-3 (TYVAK-0210) (#43809)");
        assert_eq!(text.parse::<SatelliteId>().unwrap(), id);
        assert!("ISS".parse::<SatelliteId>().is_err());
        assert!("ISS (#abc)".parse::<SatelliteId>().is_err());
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = TleCatalog::from_tle_text(&catalog_text()).unwrap();
        assert_eq!(catalog.len(), 2);

        assert_eq!(catalog.get_elements("ISS (ZARYA)").unwrap().norad_id, 25544);
        assert_eq!(catalog.get_elements("iss (zarya)").unwrap().norad_id, 25544);
        assert_eq!(catalog.get_elements("28654").unwrap().display_name(), "NOAA 18");
        assert_eq!(catalog.get_elements("#28654").unwrap().norad_id, 28654);
        assert_eq!(
            catalog.get_elements("NOAA 18 (#28654)").unwrap().norad_id,
            28654
        );
    }

    #[test]
    fn test_catalog_not_found() {
        let catalog = TleCatalog::from_tle_text(&catalog_text()).unwrap();
        match catalog.get_elements("HUBBLE") {
            Err(SkywindowError::NotFound(name)) => assert_eq!(name, "HUBBLE"),
            other => panic!("expected NotFound, got {:?}", other.map(|e| e.norad_id)),
        }
    }

    #[test]
    fn test_list_and_popular() {
        let catalog = TleCatalog::from_tle_text(&catalog_text()).unwrap();
        let listed = catalog.list().unwrap();
        assert_eq!(listed[0], SatelliteId::new("ISS (ZARYA)", 25544));

        let popular: Vec<String> = catalog.popular().into_iter().map(|s| s.name).collect();
        assert_eq!(popular, vec!["ISS (ZARYA)", "NOAA 18"]);
    }

    #[test]
    fn test_gazetteer() {
        let text = "\
# name;lat;lon;elev;offset
Philadelphia, PA;39.95;-75.17;12;-5
Tromso;69.65;18.96
";
        let gazetteer = Gazetteer::parse(text).unwrap();
        let philly = gazetteer.resolve("  philadelphia,   PA ").unwrap();
        assert_eq!(philly.latitude_deg, 39.95);
        assert_eq!(philly.elevation_m, 12.0);
        assert_eq!(philly.utc_offset_seconds, -18_000);

        let tromso = gazetteer.resolve("Tromso").unwrap();
        assert_eq!(tromso.utc_offset_seconds, 0);

        assert!(matches!(
            gazetteer.resolve("Atlantis"),
            Err(SkywindowError::GeocodeError(_))
        ));
        assert!(gazetteer.resolve("   ").is_err());
        assert!(Gazetteer::parse("Nowhere;north;east").is_err());
    }
}
