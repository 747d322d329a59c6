use glam::DVec3;

use crate::data::Location;
use crate::geo::{to_cartesian, EARTH_RADIUS, MARKER_ALTITUDE};
use crate::map::projection::{is_facing_camera, Camera, Ray};

/// Radius of a marker's bounding sphere at scale 1.
pub const MARKER_RADIUS: f64 = 0.14;

/// Smallest screen-space pick radius in dots: half the diagonal of a 2x4 Braille cell.
pub const MIN_PICK_RADIUS_PX: f64 = 2.24;

/// Inputs for distance-adaptive marker scaling.
#[derive(Clone, Copy, Debug)]
pub struct ScaleParams {
    pub min_distance: f64,
    pub max_distance: f64,
    pub min_scale: f64,
    pub max_scale: f64,
}

impl Default for ScaleParams {
    fn default() -> Self {
        Self {
            min_distance: 0.6 * EARTH_RADIUS,
            max_distance: 5.0 * EARTH_RADIUS,
            min_scale: 0.3,
            max_scale: 2.0,
        }
    }
}

/// Marker scale for a camera distance. The 0.7 exponent makes scale grow faster
/// near the close end of the range.
pub fn adaptive_scale(camera_distance: f64, p: &ScaleParams) -> f64 {
    let span = (p.max_distance - p.min_distance).max(f64::EPSILON);
    let normalized = ((camera_distance - p.min_distance) / span).clamp(0.0, 1.0);
    let scale = p.min_scale + (p.max_scale - p.min_scale) * normalized.powf(0.7);
    scale.clamp(p.min_scale, p.max_scale)
}

/// Colours the renderer uses for a marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarkerHandles {
    pub color: (u8, u8, u8),
    pub emissive: (u8, u8, u8),
}

impl MarkerHandles {
    /// Map a location colour tag onto the high-contrast marker palette.
    pub fn from_color_tag(tag: &str) -> Self {
        let (color, emissive) = match tag.to_ascii_lowercase().as_str() {
            "#ff4444" => ((0, 255, 255), (0, 204, 204)),
            "#44ff44" | "#44ff88" => ((0, 255, 0), (0, 204, 0)),
            "#4444ff" | "#4488ff" => ((255, 215, 0), (255, 176, 0)),
            "#ff44ff" | "#ff8844" => ((255, 20, 147), (204, 17, 119)),
            "#ffff44" => ((255, 69, 0), (204, 51, 0)),
            "#44ffff" => ((147, 112, 219), (123, 104, 238)),
            other => match parse_hex(other) {
                Some(rgb) => (rgb, rgb),
                None => ((0, 255, 255), (0, 204, 204)),
            },
        };
        Self { color, emissive }
    }
}

fn parse_hex(tag: &str) -> Option<(u8, u8, u8)> {
    let hex = tag.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// Per-frame animation values for a marker's three layers.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pulse {
    pub core_scale: f64,
    pub core_glow: f64,
    pub ring_scale: f64,
    pub ring_opacity: f64,
    pub halo_scale: f64,
    pub halo_opacity: f64,
}

impl Pulse {
    pub fn at(time_secs: f64, adaptive_scale: f64) -> Self {
        let t = time_secs;
        Self {
            core_scale: (1.0 + 0.15 * (t * 2.5).sin()) * adaptive_scale,
            core_glow: 0.8 + 0.3 * (t * 4.0).sin(),
            ring_scale: (1.0 + 0.2 * (t * 3.0).sin()) * adaptive_scale,
            ring_opacity: 0.8 * (1.5 / adaptive_scale).min(1.0) + 0.2 * (t * 2.0).sin(),
            halo_scale: (1.0 + 0.3 * (t * 1.5).sin()) * adaptive_scale,
            halo_opacity: 0.3 * (1.2 / adaptive_scale).min(1.0) + 0.2 * (t * 1.8).sin(),
        }
    }
}

/// Scene-side state for one registered location.
#[derive(Clone, Debug)]
pub struct MarkerVisual {
    /// Index of the location in the registry
    pub location: usize,
    world_position: DVec3,
    pub handles: MarkerHandles,
    pub adaptive_scale: f64,
    pub pulse: Pulse,
    /// Hidden markers are skipped by rendering and picking
    pub visible: bool,
}

impl MarkerVisual {
    /// Position is fixed at registration from the location's coordinates.
    pub fn world_position(&self) -> DVec3 {
        self.world_position
    }

    pub fn hit_radius(&self) -> f64 {
        MARKER_RADIUS * self.adaptive_scale
    }
}

/// One marker per office location, with picking and per-frame animation.
#[derive(Default)]
pub struct MarkerRegistry {
    locations: Vec<Location>,
    markers: Vec<MarkerVisual>,
    params: ScaleParams,
}

impl MarkerRegistry {
    pub fn new(params: ScaleParams) -> Self {
        Self {
            locations: Vec::new(),
            markers: Vec::new(),
            params,
        }
    }

    pub fn register(&mut self, location: Location) -> &MarkerVisual {
        let lifted = location
            .geo
            .with_altitude(MARKER_ALTITUDE)
            .unwrap_or(location.geo);
        let world_position = to_cartesian(&lifted, EARTH_RADIUS);
        let handles = MarkerHandles::from_color_tag(&location.color_tag);

        tracing::debug!(id = %location.id, ?world_position, "registered marker");

        let index = self.locations.len();
        self.locations.push(location);
        self.markers.push(MarkerVisual {
            location: index,
            world_position,
            handles,
            adaptive_scale: 1.0,
            pulse: Pulse::at(0.0, 1.0),
            visible: true,
        });
        &self.markers[index]
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn markers(&self) -> &[MarkerVisual] {
        &self.markers
    }

    pub fn location(&self, index: usize) -> Option<&Location> {
        self.locations.get(index)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Nearest visible marker along the ray, if any. Markers hidden behind the globe
    /// do not count. `None` means "deselect".
    pub fn hit_test_index(&self, ray: &Ray) -> Option<usize> {
        let globe_hit = ray.intersect_sphere(DVec3::ZERO, EARTH_RADIUS);

        self.markers
            .iter()
            .filter(|m| m.visible)
            .filter_map(|m| {
                let t = ray.intersect_sphere(m.world_position, m.hit_radius())?;
                match globe_hit {
                    Some(surface) if t > surface + 1e-6 => None,
                    _ => Some((m.location, t)),
                }
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }

    /// Nearest visible marker drawn within reach of a viewport pixel. The reach is the
    /// marker's projected radius, but never less than [`MIN_PICK_RADIUS_PX`], so a click
    /// anywhere in the cell holding a small marker still lands.
    pub fn pick_screen(&self, camera: &Camera, x: f64, y: f64, width: f64, height: f64) -> Option<usize> {
        self.markers
            .iter()
            .filter(|m| m.visible && is_facing_camera(m.world_position, camera.position))
            .filter_map(|m| {
                let p = camera.to_screen(m.world_position, width, height);
                if !p.visible {
                    return None;
                }
                let depth = camera.position.distance(m.world_position);
                let reach = (m.hit_radius() * camera.pixels_per_unit(height, depth)).max(MIN_PICK_RADIUS_PX);
                let d = (p.x - x).hypot(p.y - y);
                (d <= reach).then_some((m.location, d))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }

    pub fn hit_test(&self, ray: &Ray) -> Option<&Location> {
        self.hit_test_index(ray).and_then(|i| self.locations.get(i))
    }

    /// Recompute adaptive scale and pulse for every marker.
    pub fn update_frame(&mut self, camera_distance: f64, time_secs: f64) {
        let scale = adaptive_scale(camera_distance, &self.params);
        let pulse = Pulse::at(time_secs, scale);
        for marker in &mut self.markers {
            marker.adaptive_scale = scale;
            marker.pulse = pulse;
        }
    }

    /// Hide offices established after `year`; `None` shows everything.
    pub fn apply_timeline(&mut self, year: Option<i32>) {
        for marker in &mut self.markers {
            let established = self.locations[marker.location].established_year;
            marker.visible = year.map_or(true, |y| established <= y);
        }
    }

    /// Tooltip text for a hovered marker.
    pub fn tooltip(&self, index: usize) -> Option<String> {
        let loc = self.locations.get(index)?;
        let role = loc.role.as_deref().unwrap_or("Global Office");
        Some(format!("{} — {} since {}", loc.name, role, loc.established_year))
    }
}
