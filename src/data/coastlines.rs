use anyhow::{bail, Result};
use geojson::{GeoJson, Geometry, Value};
use glam::DVec3;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;

use crate::geo::{lat_lng_to_vec3, EARTH_RADIUS};

/// A geographic line (sequence of lon/lat coordinates)
pub type LineString = Vec<(f64, f64)>;

/// Where the globe outline came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutlineSource {
    File(PathBuf),
    Procedural,
}

/// Outline detail, picked from the camera distance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutlineLod {
    High,   // 10m
    Medium, // 50m
    Low,    // 110m
}

impl OutlineLod {
    pub const ALL: [OutlineLod; 3] = [OutlineLod::High, OutlineLod::Medium, OutlineLod::Low];

    /// Beyond 9R the coarse outline, beyond 6R the medium one, otherwise full detail.
    pub fn from_distance(distance: f64) -> Self {
        if distance > 9.0 * EARTH_RADIUS {
            OutlineLod::Low
        } else if distance > 6.0 * EARTH_RADIUS {
            OutlineLod::Medium
        } else {
            OutlineLod::High
        }
    }

    fn file_name(self) -> &'static str {
        match self {
            OutlineLod::High => "ne_10m_coastline.json",
            OutlineLod::Medium => "ne_50m_coastline.json",
            OutlineLod::Low => "ne_110m_coastline.json",
        }
    }

    /// Levels to try for `self`, best match first.
    fn preference(self) -> [OutlineLod; 3] {
        match self {
            OutlineLod::High => [OutlineLod::High, OutlineLod::Medium, OutlineLod::Low],
            OutlineLod::Medium => [OutlineLod::Medium, OutlineLod::Low, OutlineLod::High],
            OutlineLod::Low => [OutlineLod::Low, OutlineLod::Medium, OutlineLod::High],
        }
    }
}

impl fmt::Display for OutlineLod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutlineLod::High => "10m",
            OutlineLod::Medium => "50m",
            OutlineLod::Low => "110m",
        })
    }
}

/// Globe outline polylines as unit-sphere vectors, densified along great circles.
pub struct Coastlines {
    pub lines: Vec<Vec<DVec3>>,
    pub source: OutlineSource,
}

impl Coastlines {
    pub fn from_lines(lines: Vec<LineString>, source: OutlineSource) -> Self {
        let lines = lines
            .into_iter()
            .filter(|l| l.len() >= 2)
            .map(|l| densify(&l))
            .collect();
        Self { lines, source }
    }

    pub fn procedural() -> Self {
        let lines = PROCEDURAL_OUTLINE
            .iter()
            .map(|ring| ring.iter().map(|&(lat, lng)| (lng, lat)).collect())
            .collect();
        Self::from_lines(lines, OutlineSource::Procedural)
    }

    pub fn point_count(&self) -> usize {
        self.lines.iter().map(Vec::len).sum()
    }
}

/// Every loaded detail level, with the procedural outline behind them.
pub struct OutlineSet {
    levels: Vec<(OutlineLod, Coastlines)>,
    fallback: Coastlines,
}

impl Default for OutlineSet {
    fn default() -> Self {
        Self {
            levels: Vec::new(),
            fallback: Coastlines::procedural(),
        }
    }
}

impl OutlineSet {
    pub fn insert(&mut self, lod: OutlineLod, outline: Coastlines) {
        self.levels.retain(|(l, _)| *l != lod);
        self.levels.push((lod, outline));
    }

    /// Closest loaded level to `lod`, or the procedural outline when nothing loaded.
    pub fn get(&self, lod: OutlineLod) -> &Coastlines {
        lod.preference()
            .iter()
            .find_map(|want| self.levels.iter().find(|(l, _)| l == want))
            .map_or(&self.fallback, |(_, outline)| outline)
    }
}

/// Interpolate a lon/lat polyline along great-circle arcs in ~2° steps.
fn densify(line: &[(f64, f64)]) -> Vec<DVec3> {
    let mut out = Vec::with_capacity(line.len() * 2);
    let (lon0, lat0) = line[0];
    out.push(lat_lng_to_vec3(lat0, lon0, 1.0));

    for pair in line.windows(2) {
        let a = lat_lng_to_vec3(pair[0].1, pair[0].0, 1.0);
        let b = lat_lng_to_vec3(pair[1].1, pair[1].0, 1.0);
        walk_great_circle(a, b, |p| out.push(p));
    }
    out
}

/// Visit subdivision points of the great-circle arc from `a` to `b` (excluding `a`).
#[inline]
pub fn walk_great_circle(a: DVec3, b: DVec3, mut visitor: impl FnMut(DVec3)) {
    let angle = a.dot(b).clamp(-1.0, 1.0).acos();
    let steps = ((angle.to_degrees() / 2.0).ceil() as usize).max(1);

    let sin_angle = angle.sin();
    if steps == 1 || sin_angle.abs() < 1e-10 {
        // Short segment, or identical/antipodal endpoints
        visitor(b);
        return;
    }

    for i in 1..=steps {
        let t = i as f64 / steps as f64;
        let sa = ((1.0 - t) * angle).sin() / sin_angle;
        let sb = (t * angle).sin() / sin_angle;
        visitor(a * sa + b * sb);
    }
}

/// Load outline polylines from a GeoJSON file.
pub fn load_geojson_outline(path: &Path) -> Result<Vec<LineString>> {
    let geojson: GeoJson = fs::read_to_string(path)?.parse()?;
    let lines = outline_rings(geojson);
    if lines.is_empty() {
        bail!("{} contains no line geometry", path.display());
    }
    Ok(lines)
}

/// Line strings and outer polygon rings of a document, in document order.
fn outline_rings(geojson: GeoJson) -> Vec<LineString> {
    let geometries: Vec<Geometry> = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features.into_iter().filter_map(|f| f.geometry).collect(),
        GeoJson::Feature(f) => f.geometry.into_iter().collect(),
        GeoJson::Geometry(g) => vec![g],
    };
    geometries.into_iter().flat_map(|g| rings_of(g.value)).collect()
}

fn rings_of(value: Value) -> Vec<LineString> {
    let lon_lat = |ring: Vec<Vec<f64>>| -> LineString {
        ring.into_iter()
            .filter_map(|p| Some((*p.first()?, *p.get(1)?)))
            .collect()
    };
    match value {
        Value::LineString(line) => vec![lon_lat(line)],
        Value::MultiLineString(lines) => lines.into_iter().map(lon_lat).collect(),
        Value::Polygon(rings) => rings.into_iter().take(1).map(lon_lat).collect(),
        Value::MultiPolygon(polygons) => polygons
            .into_iter()
            .filter_map(|rings| rings.into_iter().next())
            .map(lon_lat)
            .collect(),
        Value::GeometryCollection(children) => children.into_iter().flat_map(|g| rings_of(g.value)).collect(),
        _ => Vec::new(),
    }
}

/// Background loader for the outline detail levels.
///
/// Sources are tried in order, each on its own worker with its own timeout. Every level
/// that loads is sent over the channel as soon as it is ready; slow workers that time out
/// are abandoned and their results dropped. Levels that never arrive leave the
/// procedural outline in place.
pub struct OutlineLoader {
    rx: Option<Receiver<(OutlineLod, Coastlines)>>,
}

impl OutlineLoader {
    pub fn spawn(sources: Vec<(OutlineLod, PathBuf)>, timeout: Duration) -> Self {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            for (lod, path) in sources {
                if let Some(outline) = load_with_timeout(&path, timeout) {
                    // Receiver may already be gone after teardown
                    if tx.send((lod, outline)).is_err() {
                        return;
                    }
                }
            }
        });

        Self { rx: Some(rx) }
    }

    /// Non-blocking check for the next loaded level.
    pub fn poll(&mut self) -> Option<(OutlineLod, Coastlines)> {
        let rx = self.rx.as_ref()?;
        match rx.try_recv() {
            Ok(level) => Some(level),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                tracing::debug!("outline loader finished");
                self.rx = None;
                None
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.rx.is_some()
    }
}

/// Outline files in `data_dir`, highest resolution first.
pub fn outline_sources(data_dir: &Path) -> Vec<(OutlineLod, PathBuf)> {
    OutlineLod::ALL
        .iter()
        .map(|&lod| (lod, data_dir.join(lod.file_name())))
        .collect()
}

fn load_with_timeout(path: &Path, timeout: Duration) -> Option<Coastlines> {
    let (tx, rx) = mpsc::channel();
    let worker_path = path.to_path_buf();
    thread::spawn(move || {
        let _ = tx.send(load_geojson_outline(&worker_path));
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok(lines)) => {
            tracing::info!(path = %path.display(), lines = lines.len(), "globe outline loaded");
            Some(Coastlines::from_lines(lines, OutlineSource::File(path.to_path_buf())))
        }
        Ok(Err(e)) => {
            tracing::warn!(path = %path.display(), "outline source failed: {e}");
            None
        }
        Err(RecvTimeoutError::Timeout) => {
            tracing::warn!(path = %path.display(), ?timeout, "outline source timed out");
            None
        }
        Err(RecvTimeoutError::Disconnected) => {
            tracing::warn!(path = %path.display(), "outline worker died");
            None
        }
    }
}

/// Rough continent rings as (lat, lng), used until a GeoJSON level loads.
const PROCEDURAL_OUTLINE: [&[(f64, f64)]; 6] = [
    // North and Central America
    &[
        (71.0, -156.0), (70.0, -141.0), (69.0, -125.0), (68.0, -108.0), (67.0, -95.0),
        (63.0, -92.0), (58.0, -94.0), (55.0, -82.0), (60.0, -78.0), (62.0, -73.0),
        (58.0, -68.0), (53.0, -56.0), (47.0, -53.0), (46.0, -61.0), (44.0, -66.0),
        (42.0, -70.0), (39.0, -74.0), (35.0, -76.0), (31.0, -81.0), (27.0, -80.0),
        (25.0, -81.0), (30.0, -84.0), (29.0, -90.0), (29.0, -95.0), (26.0, -97.0),
        (21.0, -97.0), (18.0, -95.0), (21.0, -87.0), (16.0, -88.0), (15.0, -84.0),
        (11.0, -84.0), (8.0, -78.0), (7.0, -81.0), (13.0, -88.0), (16.0, -95.0),
        (20.0, -105.0), (23.0, -110.0), (32.0, -117.0), (35.0, -121.0), (40.0, -124.0),
        (46.0, -124.0), (49.0, -125.0), (55.0, -131.0), (59.0, -139.0), (60.0, -147.0),
        (58.0, -153.0), (55.0, -162.0), (60.0, -165.0), (65.0, -168.0), (71.0, -156.0),
    ],
    // South America
    &[
        (12.0, -72.0), (11.0, -64.0), (8.0, -60.0), (5.0, -52.0), (0.0, -50.0),
        (-3.0, -40.0), (-5.0, -35.0), (-13.0, -38.0), (-23.0, -42.0), (-28.0, -48.0),
        (-34.0, -53.0), (-38.0, -57.0), (-41.0, -63.0), (-47.0, -66.0), (-52.0, -69.0),
        (-55.0, -68.0), (-53.0, -74.0), (-46.0, -75.0), (-37.0, -73.0), (-27.0, -71.0),
        (-18.0, -70.0), (-14.0, -76.0), (-6.0, -81.0), (-1.0, -80.0), (4.0, -77.0),
        (8.0, -77.0), (12.0, -72.0),
    ],
    // Europe
    &[
        (36.0, -6.0), (37.0, -9.0), (43.0, -9.0), (44.0, -1.0), (48.0, -5.0),
        (49.0, 0.0), (51.0, 2.0), (53.0, 5.0), (54.0, 9.0), (57.0, 8.0),
        (59.0, 10.0), (58.0, 6.0), (62.0, 5.0), (66.0, 13.0), (70.0, 20.0),
        (71.0, 26.0), (69.0, 33.0), (66.0, 40.0), (47.0, 40.0), (45.0, 37.0),
        (41.0, 29.0), (40.0, 26.0), (38.0, 24.0), (40.0, 20.0), (42.0, 19.0),
        (45.0, 13.0), (41.0, 13.0), (43.0, 10.0), (43.0, 5.0), (41.0, 3.0),
        (39.0, 0.0), (37.0, -2.0), (36.0, -6.0),
    ],
    // Africa
    &[
        (36.0, -6.0), (35.0, 10.0), (33.0, 11.0), (31.0, 20.0), (31.0, 32.0),
        (22.0, 37.0), (12.0, 43.0), (11.0, 51.0), (2.0, 46.0), (-5.0, 39.0),
        (-11.0, 40.0), (-19.0, 35.0), (-26.0, 33.0), (-34.0, 26.0), (-35.0, 20.0),
        (-29.0, 16.0), (-22.0, 14.0), (-12.0, 13.0), (-5.0, 12.0), (4.0, 9.0),
        (5.0, -2.0), (5.0, -8.0), (8.0, -13.0), (15.0, -17.0), (21.0, -17.0),
        (28.0, -13.0), (33.0, -8.0), (36.0, -6.0),
    ],
    // Asia
    &[
        (41.0, 29.0), (42.0, 41.0), (37.0, 36.0), (33.0, 35.0), (28.0, 34.0),
        (13.0, 43.0), (16.0, 52.0), (22.0, 59.0), (25.0, 57.0), (25.0, 66.0),
        (21.0, 72.0), (15.0, 74.0), (8.0, 77.0), (13.0, 80.0), (21.0, 87.0),
        (22.0, 91.0), (16.0, 95.0), (10.0, 98.0), (1.0, 104.0), (10.0, 106.0),
        (17.0, 107.0), (22.0, 108.0), (23.0, 117.0), (31.0, 122.0), (38.0, 118.0),
        (40.0, 122.0), (39.0, 126.0), (35.0, 127.0), (42.0, 130.0), (48.0, 140.0),
        (53.0, 141.0), (59.0, 143.0), (60.0, 163.0), (66.0, 179.0), (70.0, 170.0),
        (73.0, 140.0), (77.0, 105.0), (73.0, 80.0), (70.0, 67.0), (68.0, 55.0),
        (66.0, 40.0), (47.0, 40.0), (41.0, 29.0),
    ],
    // Australia
    &[
        (-11.0, 131.0), (-12.0, 137.0), (-17.0, 141.0), (-11.0, 142.0), (-19.0, 147.0),
        (-25.0, 153.0), (-33.0, 152.0), (-38.0, 148.0), (-38.0, 141.0), (-35.0, 137.0),
        (-32.0, 133.0), (-34.0, 123.0), (-34.0, 115.0), (-27.0, 113.0), (-21.0, 115.0),
        (-17.0, 123.0), (-14.0, 127.0), (-11.0, 131.0),
    ],
];
