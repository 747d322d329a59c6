use glam::DVec3;
use std::cmp::Ordering;

use crate::geo::{to_cartesian, GeoPoint, EARTH_RADIUS, LABEL_ALTITUDE};
use crate::map::projection::{is_facing_camera, Camera};
use crate::map::spatial::ScreenGrid;

/// Minimum pixel distance between two displayed labels.
pub const OVERLAP_THRESHOLD_PX: f64 = 50.0;

/// Granularity of a label. Coarser kinds win overlap contests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LabelKind {
    Continent,
    Country,
    City,
}

impl LabelKind {
    pub fn priority(self) -> u8 {
        match self {
            LabelKind::Continent => 3,
            LabelKind::Country => 2,
            LabelKind::City => 1,
        }
    }
}

/// A named geographic label. `screen_position`, `visible` and `opacity` are
/// recomputed every frame.
#[derive(Clone, Debug)]
pub struct LabelEntry {
    pub text: String,
    pub geo: GeoPoint,
    pub kind: LabelKind,
    /// Shown only while the camera is at most this far from the globe centre
    pub min_visible_distance: f64,
    world_position: DVec3,
    pub screen_position: Option<(f64, f64)>,
    pub visible: bool,
    pub opacity: f64,
}

impl LabelEntry {
    pub fn new(text: impl Into<String>, geo: GeoPoint, kind: LabelKind, min_visible_distance: f64) -> Self {
        let anchored = geo.with_altitude(LABEL_ALTITUDE).unwrap_or(geo);
        Self {
            text: text.into(),
            geo,
            kind,
            min_visible_distance,
            world_position: to_cartesian(&anchored, EARTH_RADIUS),
            screen_position: None,
            visible: false,
            opacity: 0.0,
        }
    }

    pub fn world_position(&self) -> DVec3 {
        self.world_position
    }

    fn hide(&mut self) {
        self.visible = false;
        self.opacity = 0.0;
    }
}

/// A label that survived the zoom and on-screen tests this frame.
struct Candidate {
    index: usize,
    priority: u8,
    distance: f64,
    x: f64,
    y: f64,
}

/// Progressive-disclosure label placement with greedy overlap suppression.
pub struct LabelEngine {
    labels: Vec<LabelEntry>,
    overlap_threshold: f64,
    grid: ScreenGrid,
    last_view: Option<(DVec3, DVec3, f64, f64)>,
}

impl LabelEngine {
    pub fn new(labels: Vec<LabelEntry>, overlap_threshold: f64) -> Self {
        Self {
            labels,
            overlap_threshold,
            grid: ScreenGrid::new(overlap_threshold),
            last_view: None,
        }
    }

    pub fn labels(&self) -> &[LabelEntry] {
        &self.labels
    }

    pub fn visible_labels(&self) -> impl Iterator<Item = &LabelEntry> {
        self.labels.iter().filter(|l| l.visible)
    }

    /// Recompute visibility for the current camera. Returns indices of accepted labels in
    /// acceptance order (highest priority first).
    pub fn update_visibility(&mut self, camera: &Camera, width: f64, height: f64) -> Vec<usize> {
        self.last_view = Some((camera.position, camera.target, width, height));
        let camera_distance = camera.distance_to_origin();

        let mut candidates = Vec::with_capacity(self.labels.len());
        for (index, label) in self.labels.iter_mut().enumerate() {
            label.screen_position = None;
            label.hide();

            if camera_distance > label.min_visible_distance {
                continue;
            }

            let p = camera.to_screen(label.world_position, width, height);
            if !p.visible || !is_facing_camera(label.world_position, camera.position) {
                continue;
            }

            label.screen_position = Some((p.x, p.y));
            candidates.push(Candidate {
                index,
                priority: label.kind.priority(),
                distance: camera.position.distance(label.world_position),
                x: p.x,
                y: p.y,
            });
        }

        candidates.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal))
                .then_with(|| a.index.cmp(&b.index))
        });

        self.grid.clear();
        let mut accepted = Vec::with_capacity(candidates.len());
        for c in candidates {
            if self.grid.any_within(c.x, c.y, self.overlap_threshold) {
                continue;
            }
            self.grid.insert(c.x, c.y);
            let label = &mut self.labels[c.index];
            label.visible = true;
            label.opacity = 1.0;
            accepted.push(c.index);
        }

        accepted
    }

    /// Recompute only when the camera or viewport moved since the last pass.
    pub fn update_if_changed(&mut self, camera: &Camera, width: f64, height: f64) -> bool {
        if self.last_view == Some((camera.position, camera.target, width, height)) {
            return false;
        }
        self.update_visibility(camera, width, height);
        true
    }

    pub fn hide_all(&mut self) {
        self.last_view = None;
        for label in &mut self.labels {
            label.screen_position = None;
            label.hide();
        }
    }
}

/// Built-in continent, country and city labels.
pub fn default_catalog() -> Vec<LabelEntry> {
    let entries: [(&str, f64, f64, f64, LabelKind); 22] = [
        ("North America", 54.5260, -105.2551, 25.0, LabelKind::Continent),
        ("South America", -8.7832, -55.4915, 25.0, LabelKind::Continent),
        ("Europe", 54.5260, 15.2551, 25.0, LabelKind::Continent),
        ("Asia", 29.8405, 89.2964, 25.0, LabelKind::Continent),
        ("Africa", -8.7832, 34.5085, 25.0, LabelKind::Continent),
        ("Australia", -25.2744, 133.7751, 25.0, LabelKind::Continent),
        ("United States", 39.8283, -98.5795, 15.0, LabelKind::Country),
        ("China", 35.8617, 104.1954, 15.0, LabelKind::Country),
        ("Russia", 61.5240, 105.3188, 15.0, LabelKind::Country),
        ("Brazil", -14.2350, -51.9253, 15.0, LabelKind::Country),
        ("India", 20.5937, 78.9629, 15.0, LabelKind::Country),
        ("Australia", -25.2744, 133.7751, 15.0, LabelKind::Country),
        ("New York", 40.7128, -74.0060, 10.0, LabelKind::City),
        ("London", 51.5074, -0.1278, 10.0, LabelKind::City),
        ("Tokyo", 35.6762, 139.6503, 10.0, LabelKind::City),
        ("Paris", 48.8566, 2.3522, 10.0, LabelKind::City),
        ("Singapore", 1.3521, 103.8198, 10.0, LabelKind::City),
        ("Dubai", 25.2048, 55.2708, 10.0, LabelKind::City),
        ("Sydney", -33.8688, 151.2093, 10.0, LabelKind::City),
        ("Los Angeles", 34.0522, -118.2437, 8.0, LabelKind::City),
        ("Mumbai", 19.0760, 72.8777, 8.0, LabelKind::City),
        ("São Paulo", -23.5505, -46.6333, 8.0, LabelKind::City),
    ];

    entries
        .into_iter()
        .filter_map(|(name, lat, lng, min_distance, kind)| {
            GeoPoint::surface(lat, lng)
                .ok()
                .map(|geo| LabelEntry::new(name, geo, kind, min_distance))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: f64 = 400.0;
    const H: f64 = 200.0;

    fn label(text: &str, lat: f64, lng: f64, kind: LabelKind) -> LabelEntry {
        LabelEntry::new(text, GeoPoint::surface(lat, lng).unwrap(), kind, 100.0)
    }

    /// Camera on the +X axis looking at lat 0 / lng 0.
    fn camera_at(distance: f64) -> Camera {
        Camera::new(DVec3::new(distance, 0.0, 0.0), DVec3::ZERO)
    }

    #[test]
    fn test_overlapping_labels_keep_higher_priority() {
        let mut engine = LabelEngine::new(
            vec![
                label("City", 0.5, 0.5, LabelKind::City),
                label("Country", 0.0, 0.0, LabelKind::Country),
            ],
            OVERLAP_THRESHOLD_PX,
        );
        let accepted = engine.update_visibility(&camera_at(20.0), W, H);
        assert_eq!(accepted, vec![1]);
        assert!(engine.labels()[1].visible);
        assert!(!engine.labels()[0].visible);
        assert_eq!(engine.labels()[0].opacity, 0.0);
        // Occluded labels still know where they would have been
        assert!(engine.labels()[0].screen_position.is_some());
    }

    #[test]
    fn test_equal_priority_tie_goes_to_nearer_label() {
        let mut engine = LabelEngine::new(
            vec![
                // Off-centre: farther from a camera on the +X axis
                label("Far", 2.0, 2.0, LabelKind::City),
                label("Near", 0.0, 0.0, LabelKind::City),
            ],
            OVERLAP_THRESHOLD_PX,
        );
        let accepted = engine.update_visibility(&camera_at(20.0), W, H);
        assert_eq!(accepted, vec![1]);
    }

    #[test]
    fn test_separated_labels_are_both_visible() {
        let mut engine = LabelEngine::new(
            vec![
                label("West", 0.0, -60.0, LabelKind::City),
                label("East", 0.0, 60.0, LabelKind::City),
            ],
            OVERLAP_THRESHOLD_PX,
        );
        let accepted = engine.update_visibility(&camera_at(20.0), W, H);
        assert_eq!(accepted.len(), 2);
        assert!(engine.labels().iter().all(|l| l.visible && l.opacity == 1.0));
    }

    #[test]
    fn test_identical_positions_first_in_sort_order_wins() {
        let mut engine = LabelEngine::new(
            vec![
                label("Dup A", 10.0, 10.0, LabelKind::City),
                label("Dup B", 10.0, 10.0, LabelKind::City),
            ],
            OVERLAP_THRESHOLD_PX,
        );
        assert_eq!(engine.update_visibility(&camera_at(20.0), W, H), vec![0]);
    }

    #[test]
    fn test_progressive_disclosure_by_distance() {
        let mut engine = LabelEngine::new(default_catalog(), OVERLAP_THRESHOLD_PX);

        // Far out: only continents qualify
        engine.update_visibility(&camera_at(20.0), W, H);
        assert!(engine.visible_labels().count() > 0);
        assert!(engine.visible_labels().all(|l| l.kind == LabelKind::Continent));

        // Countries join at 15, cities not until 10
        engine.update_visibility(&camera_at(12.0), W, H);
        assert!(engine.visible_labels().all(|l| l.kind != LabelKind::City));

        // Beyond every threshold nothing is shown
        engine.update_visibility(&camera_at(40.0), W, H);
        assert_eq!(engine.visible_labels().count(), 0);
    }

    #[test]
    fn test_far_side_labels_are_hidden() {
        let mut engine = LabelEngine::new(
            vec![
                label("Front", 0.0, 0.0, LabelKind::City),
                label("Back", 0.0, 180.0, LabelKind::City),
            ],
            OVERLAP_THRESHOLD_PX,
        );
        let accepted = engine.update_visibility(&camera_at(20.0), W, H);
        assert_eq!(accepted, vec![0]);
        assert!(engine.labels()[1].screen_position.is_none());
    }

    #[test]
    fn test_update_if_changed_skips_static_camera() {
        let mut engine = LabelEngine::new(default_catalog(), OVERLAP_THRESHOLD_PX);
        let cam = camera_at(20.0);
        assert!(engine.update_if_changed(&cam, W, H));
        assert!(!engine.update_if_changed(&cam, W, H));
        assert!(engine.update_if_changed(&camera_at(19.0), W, H));
        engine.hide_all();
        assert_eq!(engine.visible_labels().count(), 0);
    }

    #[test]
    fn test_accepted_labels_never_overlap() {
        let mut engine = LabelEngine::new(default_catalog(), OVERLAP_THRESHOLD_PX);
        let cam = Camera::new(DVec3::new(3.0, 4.0, -8.0), DVec3::ZERO);
        engine.update_visibility(&cam, 800.0, 400.0);
        let shown: Vec<_> = engine.visible_labels().filter_map(|l| l.screen_position).collect();
        for (i, a) in shown.iter().enumerate() {
            for b in &shown[i + 1..] {
                let d = ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt();
                assert!(d >= OVERLAP_THRESHOLD_PX);
            }
        }
    }
}
