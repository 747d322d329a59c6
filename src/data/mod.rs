mod coastlines;

pub use coastlines::{outline_sources, Coastlines, OutlineLoader, OutlineLod, OutlineSet, OutlineSource};

use crate::error::DataError;
use crate::geo::GeoPoint;
use serde::Deserialize;
use simd_json::OwnedValue;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Embedded dataset used when no location document can be loaded.
const EMBEDDED_LOCATIONS: &str = include_str!("locations.json");

/// Achievement category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Award,
    Innovation,
    Sustainability,
    Operational,
    Partnership,
    Social,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Award,
        Category::Innovation,
        Category::Sustainability,
        Category::Operational,
        Category::Partnership,
        Category::Social,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Award => "award",
            Category::Innovation => "innovation",
            Category::Sustainability => "sustainability",
            Category::Operational => "operational",
            Category::Partnership => "partnership",
            Category::Social => "social",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Achievement {
    pub title: String,
    pub category: Category,
    pub year: i32,
    pub description: String,
    pub impact: String,
    pub metrics: BTreeMap<String, String>,
}

/// An office on the globe. Built once at startup and read-only afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub role: Option<String>,
    pub description: Option<String>,
    pub geo: GeoPoint,
    pub color_tag: String,
    pub established_year: i32,
    pub employee_count: u32,
    pub achievements: Vec<Achievement>,
}

impl Location {
    pub fn latitude(&self) -> f64 {
        self.geo.latitude()
    }

    pub fn longitude(&self) -> f64 {
        self.geo.longitude()
    }
}

/// Where the active dataset came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataSource {
    File(std::path::PathBuf),
    Embedded,
}

#[derive(Debug, Deserialize)]
struct RawAchievement {
    title: Option<String>,
    category: Option<String>,
    year: Option<i32>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    impact: Option<String>,
    /// Values are shown as text; numbers keep their JSON spelling
    #[serde(default)]
    metrics: BTreeMap<String, OwnedValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLocation {
    id: Option<String>,
    name: Option<String>,
    #[serde(alias = "lat")]
    latitude: Option<f64>,
    #[serde(alias = "lng", alias = "lon")]
    longitude: Option<f64>,
    #[serde(alias = "color")]
    color_tag: Option<String>,
    #[serde(alias = "established")]
    established_year: Option<i32>,
    #[serde(alias = "employees")]
    employee_count: Option<u32>,
    role: Option<String>,
    description: Option<String>,
    #[serde(default)]
    achievements: Vec<RawAchievement>,
}

/// Entries stay untyped until each is decoded on its own, so one bad entry
/// cannot fail the whole document.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LocationDocument {
    List(Vec<OwnedValue>),
    Wrapped { locations: Vec<OwnedValue> },
}

impl LocationDocument {
    fn into_records(self) -> Vec<OwnedValue> {
        match self {
            LocationDocument::List(records) => records,
            LocationDocument::Wrapped { locations } => locations,
        }
    }
}

fn metric_text(value: OwnedValue) -> String {
    match value {
        OwnedValue::String(text) => text,
        other => other.to_string(),
    }
}

fn required<T>(value: Option<T>, id: &str, field: &'static str) -> Result<T, DataError> {
    value.ok_or_else(|| DataError::MissingField {
        id: id.to_string(),
        field,
    })
}

fn validate_achievement(raw: RawAchievement, location_id: &str) -> Result<Achievement, DataError> {
    let title = required(raw.title, location_id, "achievements[].title")?;
    let category_str = required(raw.category, location_id, "achievements[].category")?;
    let category = category_str
        .parse::<Category>()
        .map_err(|_| DataError::UnknownCategory {
            id: location_id.to_string(),
            category: category_str.clone(),
        })?;
    let year = required(raw.year, location_id, "achievements[].year")?;
    let description = raw
        .description
        .unwrap_or_else(|| format!("Outstanding achievement in {category}"));

    Ok(Achievement {
        title,
        category,
        year,
        description,
        impact: raw.impact.unwrap_or_default(),
        metrics: raw
            .metrics
            .into_iter()
            .map(|(key, value)| (key, metric_text(value)))
            .collect(),
    })
}

fn validate_location(raw: RawLocation) -> Result<Location, DataError> {
    let id = raw.id.ok_or(DataError::MissingField {
        id: "<unknown>".to_string(),
        field: "id",
    })?;
    let name = required(raw.name, &id, "name")?;
    let latitude = required(raw.latitude, &id, "latitude")?;
    let longitude = required(raw.longitude, &id, "longitude")?;
    let established_year = required(raw.established_year, &id, "establishedYear")?;
    let geo = GeoPoint::surface(latitude, longitude).map_err(|e| DataError::Coordinates {
        id: id.clone(),
        source: Box::new(e),
    })?;

    let achievements = raw
        .achievements
        .into_iter()
        .map(|a| validate_achievement(a, &id))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Location {
        color_tag: raw.color_tag.unwrap_or_else(|| "#44ffff".to_string()),
        employee_count: raw.employee_count.unwrap_or(0),
        role: raw.role,
        description: raw.description,
        id,
        name,
        geo,
        established_year,
        achievements,
    })
}

/// Parse a location document. Malformed entries are rejected and reported individually;
/// the valid remainder is returned.
pub fn parse_locations(bytes: &mut [u8]) -> Result<(Vec<Location>, Vec<DataError>), simd_json::Error> {
    let document: LocationDocument = simd_json::serde::from_slice(bytes)?;

    let mut locations = Vec::new();
    let mut rejected = Vec::new();
    for (index, entry) in document.into_records().into_iter().enumerate() {
        let decoded = simd_json::serde::from_owned_value::<RawLocation>(entry)
            .map_err(|e| DataError::Malformed {
                index,
                message: e.to_string(),
            })
            .and_then(validate_location);
        match decoded {
            Ok(location) => locations.push(location),
            Err(e) => rejected.push(e),
        }
    }
    Ok((locations, rejected))
}

/// Read and validate a location document from disk.
pub fn load_location_file(path: &Path) -> Result<Vec<Location>, DataError> {
    let mut bytes = fs::read(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let (locations, rejected) = parse_locations(&mut bytes).map_err(|e| DataError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    for err in &rejected {
        tracing::warn!(path = %path.display(), "rejected location entry: {err}");
    }
    Ok(locations)
}

/// The built-in four-office dataset.
pub fn embedded_locations() -> Result<Vec<Location>, DataError> {
    let mut bytes = EMBEDDED_LOCATIONS.as_bytes().to_vec();
    let (locations, rejected) = parse_locations(&mut bytes).map_err(|e| DataError::Parse {
        path: "<embedded>".into(),
        message: e.to_string(),
    })?;
    if let Some(err) = rejected.into_iter().next() {
        return Err(err);
    }
    Ok(locations)
}

/// Load locations from `path`, falling back to the embedded dataset when the file is
/// missing, unreadable, malformed or yields no valid entries.
pub fn load_locations(path: Option<&Path>) -> Result<(Vec<Location>, DataSource), DataError> {
    if let Some(path) = path {
        match load_location_file(path) {
            Ok(locations) if !locations.is_empty() => {
                tracing::info!(path = %path.display(), count = locations.len(), "loaded locations");
                return Ok((locations, DataSource::File(path.to_path_buf())));
            }
            Ok(_) => {
                tracing::warn!(path = %path.display(), "no valid locations in document, using embedded dataset");
            }
            Err(e) => {
                tracing::warn!("could not load locations: {e}; using embedded dataset");
            }
        }
    }
    let locations = embedded_locations()?;
    Ok((locations, DataSource::Embedded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_embedded_dataset() {
        let locations = embedded_locations().unwrap();
        assert_eq!(locations.len(), 4);
        let nyc = &locations[0];
        assert_eq!(nyc.name, "New York HQ");
        assert_eq!(nyc.achievements.len(), 3);
        assert!((nyc.latitude() - 40.7128).abs() < 1e-12);
        assert!((nyc.longitude() + 74.006).abs() < 1e-12);
        assert_eq!(nyc.established_year, 1995);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("award".parse::<Category>(), Ok(Category::Award));
        assert_eq!(" Social ".parse::<Category>(), Ok(Category::Social));
        assert!("marketing".parse::<Category>().is_err());
    }

    #[test]
    fn test_malformed_entries_are_rejected_individually() {
        let mut doc = br#"{"locations": [
            {"id": "ok", "name": "Ok", "latitude": 1.0, "longitude": 2.0, "establishedYear": 2000},
            {"id": "noname", "latitude": 1.0, "longitude": 2.0, "establishedYear": 2000},
            {"id": "badlat", "name": "Bad", "lat": 123.0, "lng": 2.0, "established": 2000},
            {"id": "badcat", "name": "Cat", "lat": 1.0, "lng": 2.0, "established": 2000,
             "achievements": [{"title": "x", "category": "marketing", "year": 2020}]}
        ]}"#
        .to_vec();
        let (locations, rejected) = parse_locations(&mut doc).unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].id, "ok");
        assert_eq!(rejected.len(), 3);
        assert!(matches!(rejected[0], DataError::MissingField { field: "name", .. }));
        assert!(matches!(rejected[1], DataError::Coordinates { .. }));
        assert!(matches!(rejected[2], DataError::UnknownCategory { .. }));
    }

    #[test]
    fn test_mistyped_entry_does_not_sink_document() {
        let mut doc = br#"[
            {"id": "str", "name": "Stringly", "lat": "40.7", "lng": -74.0, "established": 2000},
            "not an object",
            {"id": "ok", "name": "Ok", "lat": 1.0, "lng": 2.0, "established": 2000,
             "achievements": [{"title": "Patents", "category": "innovation", "year": 2021,
                               "metrics": {"patents": 25, "growth": 1.5, "team": "R&D"}}]}
        ]"#
        .to_vec();
        let (locations, rejected) = parse_locations(&mut doc).unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].id, "ok");
        assert_eq!(rejected.len(), 2);
        assert!(matches!(rejected[0], DataError::Malformed { index: 0, .. }));
        assert!(matches!(rejected[1], DataError::Malformed { index: 1, .. }));

        let metrics = &locations[0].achievements[0].metrics;
        assert_eq!(metrics["patents"], "25");
        assert_eq!(metrics["growth"], "1.5");
        assert_eq!(metrics["team"], "R&D");
    }

    #[test]
    fn test_missing_description_gets_default() {
        let mut doc = br#"[{"id": "a", "name": "A", "lat": 0, "lng": 0, "established": 2010,
            "achievements": [{"title": "T", "category": "partnership", "year": 2021}]}]"#
            .to_vec();
        let (locations, _) = parse_locations(&mut doc).unwrap();
        let a = &locations[0].achievements[0];
        assert_eq!(a.description, "Outstanding achievement in partnership");
        assert!(a.metrics.is_empty());
    }

    #[test]
    fn test_load_falls_back_to_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let (locations, source) = load_locations(Some(&missing)).unwrap();
        assert_eq!(source, DataSource::Embedded);
        assert_eq!(locations.len(), 4);

        let broken = dir.path().join("broken.json");
        fs::File::create(&broken).unwrap().write_all(b"{ not json").unwrap();
        let (_, source) = load_locations(Some(&broken)).unwrap();
        assert_eq!(source, DataSource::Embedded);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locations.json");
        fs::write(
            &path,
            r#"[{"id": "sg", "name": "Singapore Lab", "lat": 1.3521, "lng": 103.8198, "established": 2015}]"#,
        )
        .unwrap();
        let (locations, source) = load_locations(Some(&path)).unwrap();
        assert_eq!(source, DataSource::File(path.clone()));
        assert_eq!(locations[0].name, "Singapore Lab");
        assert_eq!(locations[0].color_tag, "#44ffff");
    }
}
