use chrono::{DateTime, Datelike, Utc};
use std::f64::consts::PI;
use std::time::{Duration, Instant};

use crate::achievements::{achievement_years, display_list, summary_at, AchievementFilter, LiveMetrics, Summary, Timeline};
use crate::camera::CameraController;
use crate::config::Config;
use crate::data::{Achievement, Coastlines, DataSource, Location, OutlineLoader, OutlineLod, OutlineSet, OutlineSource};
use crate::input::{Action, InputEvent, InputQueue, OrbitDirection};
use crate::lighting::DayNightCycle;
use crate::map::labels::{default_catalog, LabelEngine};
use crate::map::markers::{MarkerRegistry, ScaleParams};
use crate::map::projection::Camera;

/// Smallest terminal the globe is drawn in.
pub const MIN_COLS: u16 = 40;
pub const MIN_ROWS: u16 = 12;

/// Keyboard orbit step, in radians.
const ORBIT_STEP: f64 = PI / 36.0;

/// Keyboard zoom factor per press.
const ZOOM_STEP: f64 = 0.9;

const INTENSITY_STEP: f64 = 0.1;

/// How long a marker stays highlighted after a fly-to lands on it.
pub const ARRIVAL_FLASH: Duration = Duration::from_millis(500);

/// Width in cells of the achievement drawer inside a globe area `area_width` wide.
pub fn drawer_width(area_width: u16) -> u16 {
    (area_width * 2 / 5).max(30).min(area_width)
}

/// Terminal size in cells, and the globe viewport carved out of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub cols: u16,
    pub rows: u16,
}

impl Viewport {
    /// Top-left cell of the globe area (inside the border).
    pub const ORIGIN: (u16, u16) = (1, 1);

    /// Globe area in cells: border on all sides plus one status line.
    pub fn globe_cells(&self) -> (u16, u16) {
        (self.cols.saturating_sub(2), self.rows.saturating_sub(3))
    }

    /// Globe area in Braille dots.
    pub fn pixel_size(&self) -> (f64, f64) {
        let (c, r) = self.globe_cells();
        (c as f64 * 2.0, r as f64 * 4.0)
    }

    pub fn is_supported(&self) -> bool {
        self.cols >= MIN_COLS && self.rows >= MIN_ROWS
    }
}

/// Application context. Owns every core component and is threaded through the frame loop.
pub struct App {
    pub registry: MarkerRegistry,
    pub labels: LabelEngine,
    pub camera: CameraController,
    pub lighting: DayNightCycle,
    pub timeline: Timeline,
    pub filter: AchievementFilter,
    pub live: LiveMetrics,
    /// Outline detail for the current camera distance
    pub lod: OutlineLod,
    pub input: InputQueue,
    pub viewport: Viewport,
    pub data_source: DataSource,
    /// Location whose achievements are shown in the drawer
    pub selected: Option<usize>,
    pub hovered: Option<usize>,
    pub drawer_open: bool,
    pub show_labels: bool,
    pub should_quit: bool,
    /// Last pointer position, for the tooltip
    pub pointer: Option<(f64, f64)>,
    pub frame: u64,
    /// Wall clock of the last tick
    pub clock: DateTime<Utc>,
    outlines: OutlineSet,
    loader: Option<OutlineLoader>,
    flying_to: Option<usize>,
    flash: Option<(usize, Instant)>,
    achievement_years: Vec<i32>,
    retry_requested: bool,
    started: Instant,
}

impl App {
    pub fn new(
        config: &Config,
        locations: Vec<Location>,
        data_source: DataSource,
        viewport: Viewport,
        now: Instant,
        utc: DateTime<Utc>,
    ) -> Self {
        let years = achievement_years(&locations);
        let timeline = Timeline::new(
            &locations,
            utc.year(),
            Duration::from_millis(config.timeline.play_duration_ms),
        );

        let mut registry = MarkerRegistry::new(ScaleParams::default());
        for location in locations {
            registry.register(location);
        }
        tracing::info!(markers = registry.len(), source = ?data_source, "markers registered");

        let camera = CameraController::new(config.camera_settings());
        let lod = OutlineLod::from_distance(camera.distance());

        Self {
            registry,
            labels: LabelEngine::new(default_catalog(), config.labels.overlap_threshold_px),
            camera,
            lighting: DayNightCycle::new(
                config.lighting.mode,
                config.lighting.intensity,
                Duration::from_secs(config.lighting.refresh_secs),
                now,
                utc,
            ),
            timeline,
            filter: AchievementFilter::default(),
            live: LiveMetrics::new(now, utc.timestamp().unsigned_abs()),
            lod,
            input: InputQueue::new(),
            viewport,
            data_source,
            selected: None,
            hovered: None,
            drawer_open: false,
            show_labels: config.labels.enabled,
            should_quit: false,
            pointer: None,
            frame: 0,
            clock: utc,
            outlines: OutlineSet::default(),
            loader: None,
            flying_to: None,
            flash: None,
            achievement_years: years,
            retry_requested: false,
            started: now,
        }
    }

    /// Outline levels are added as the background loader delivers them.
    pub fn attach_loader(&mut self, loader: OutlineLoader) {
        self.loader = Some(loader);
    }

    pub fn outline_pending(&self) -> bool {
        self.loader.as_ref().is_some_and(OutlineLoader::is_pending)
    }

    /// Outline drawn at the current level of detail.
    pub fn coastlines(&self) -> &Coastlines {
        self.outlines.get(self.lod)
    }

    pub fn outline_source(&self) -> &OutlineSource {
        &self.coastlines().source
    }

    /// Marker still highlighted from a fly-to arrival.
    pub fn flashing(&self) -> Option<usize> {
        self.flash.map(|(index, _)| index)
    }

    pub fn current_camera(&self) -> Camera {
        self.camera.camera()
    }

    /// One frame: drain input, then advance every component to `now`.
    pub fn tick(&mut self, now: Instant, utc: DateTime<Utc>) {
        self.frame = self.frame.wrapping_add(1);
        self.clock = utc;

        let events: Vec<InputEvent> = self.input.drain().collect();
        for event in events {
            self.handle_event(event, now);
        }

        if let Some(loader) = self.loader.as_mut() {
            while let Some((lod, outline)) = loader.poll() {
                tracing::info!(%lod, source = ?outline.source, points = outline.point_count(), "globe outline ready");
                self.outlines.insert(lod, outline);
            }
            if !loader.is_pending() {
                self.loader = None;
            }
        }

        if self.camera.update(now) {
            if let Some(index) = self.flying_to.take() {
                self.flash = Some((index, now + ARRIVAL_FLASH));
            }
        }
        if !self.camera.is_animating() {
            self.flying_to = None;
        }
        if self.flash.is_some_and(|(_, until)| now >= until) {
            self.flash = None;
        }

        let lod = OutlineLod::from_distance(self.camera.distance());
        if lod != self.lod {
            tracing::debug!(%lod, distance = self.camera.distance(), "outline detail changed");
            self.lod = lod;
        }

        // The globe moves under a still pointer too
        if let Some((x, y)) = self.pointer {
            self.hovered = self.pick_outside_drawer(x, y);
        }

        if self.live.tick(now) {
            tracing::debug!(projects = self.live.projects(), "live metrics drifted");
        }
        self.timeline.tick(now);
        self.registry.apply_timeline(Some(self.timeline.year()));
        self.lighting.tick(now, utc);

        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();
        self.registry.update_frame(self.camera.distance(), elapsed);

        if self.show_labels {
            let (w, h) = self.viewport.pixel_size();
            self.labels.update_if_changed(&self.camera.camera(), w, h);
        } else {
            self.labels.hide_all();
        }
    }

    fn handle_event(&mut self, event: InputEvent, now: Instant) {
        let (_, height) = self.viewport.pixel_size();
        match event {
            InputEvent::PointerDown { x, y } => self.camera.pointer_down(x, y, now),
            InputEvent::PointerMove { x, y } => {
                self.pointer = Some((x, y));
                self.camera.pointer_move(x, y, height);
            }
            InputEvent::PointerUp { .. } => self.camera.pointer_up(now),
            InputEvent::Click { x, y } => self.click(x, y),
            InputEvent::Zoom(steps) => self.camera.zoom_delta(steps, now),
            InputEvent::Key(action) => self.handle_action(action, now),
            InputEvent::Resize { cols, rows } => self.resize(cols, rows),
        }
    }

    fn handle_action(&mut self, action: Action, now: Instant) {
        match action {
            Action::Quit => self.quit(),
            Action::CloseOverlay => self.close_drawer(),
            Action::FlyTo(n) => self.fly_to(n, now),
            Action::NextLocation => {
                if !self.registry.is_empty() {
                    let next = self.selected.map_or(0, |i| (i + 1) % self.registry.len());
                    self.fly_to(next, now);
                }
            }
            Action::CycleCategory => self.filter.cycle_category(),
            Action::CycleYear => self.filter.cycle_year(&self.achievement_years),
            Action::CycleLightMode => {
                self.lighting.cycle_mode();
                tracing::info!(mode = %self.lighting.mode(), "lighting mode changed");
            }
            Action::IntensityDown => self.lighting.adjust_intensity(-INTENSITY_STEP),
            Action::IntensityUp => self.lighting.adjust_intensity(INTENSITY_STEP),
            Action::TimelineBack => self.timeline.step(-1),
            Action::TimelineForward => self.timeline.step(1),
            Action::TogglePlay => self.timeline.toggle_play(now),
            Action::ZoomIn => self.camera.zoom_by(ZOOM_STEP, now),
            Action::ZoomOut => self.camera.zoom_by(1.0 / ZOOM_STEP, now),
            Action::Orbit(direction) => {
                let (da, dp) = match direction {
                    OrbitDirection::Left => (-ORBIT_STEP, 0.0),
                    OrbitDirection::Right => (ORBIT_STEP, 0.0),
                    OrbitDirection::Up => (0.0, -ORBIT_STEP),
                    OrbitDirection::Down => (0.0, ORBIT_STEP),
                };
                self.camera.rotate_by(da, dp, now);
            }
            Action::ToggleLabels => self.show_labels = !self.show_labels,
            Action::Retry => self.retry_requested = true,
        }
    }

    /// Marker under a viewport pixel, if any. A ray hit wins; otherwise the nearest
    /// marker drawn within reach of the pixel.
    pub fn pick(&self, x: f64, y: f64) -> Option<usize> {
        let (w, h) = self.viewport.pixel_size();
        if w <= 0.0 || h <= 0.0 {
            return None;
        }
        let camera = self.camera.camera();
        let ray = camera.screen_ray(x, y, w, h);
        self.registry
            .hit_test_index(&ray)
            .or_else(|| self.registry.pick_screen(&camera, x, y, w, h))
    }

    fn pick_outside_drawer(&self, x: f64, y: f64) -> Option<usize> {
        if self.over_drawer(x) {
            return None;
        }
        self.pick(x, y)
    }

    /// Whether a viewport pixel column lies under the open drawer.
    pub fn over_drawer(&self, x: f64) -> bool {
        if !self.drawer_open || self.selected.is_none() {
            return false;
        }
        let (cols, _) = self.viewport.globe_cells();
        let left = cols.saturating_sub(drawer_width(cols));
        x >= left as f64 * 2.0
    }

    /// Select the marker under the click, or deselect on a miss. Clicks on the
    /// drawer belong to the drawer.
    pub fn click(&mut self, x: f64, y: f64) {
        if self.over_drawer(x) {
            return;
        }
        match self.pick(x, y) {
            Some(index) => self.select(index),
            None => self.close_drawer(),
        }
    }

    pub fn select(&mut self, index: usize) {
        if let Some(location) = self.registry.location(index) {
            tracing::info!(id = %location.id, "location selected");
            self.selected = Some(index);
            self.drawer_open = true;
        }
    }

    pub fn fly_to(&mut self, index: usize, now: Instant) {
        let Some(location) = self.registry.location(index) else {
            tracing::debug!(index, "no location for fly-to");
            return;
        };
        let target = location.geo;
        self.select(index);
        self.camera.navigate_to(&target, now);
        self.flying_to = Some(index);
    }

    pub fn close_drawer(&mut self) {
        self.drawer_open = false;
        self.selected = None;
    }

    pub fn selected_location(&self) -> Option<&Location> {
        self.selected.and_then(|i| self.registry.location(i))
    }

    /// Filtered achievements of the selected location.
    pub fn drawer_items(&self) -> Vec<&Achievement> {
        self.selected_location()
            .map(|location| display_list(location, &self.filter))
            .unwrap_or_default()
    }

    pub fn hover_text(&self) -> Option<String> {
        self.hovered.and_then(|i| self.registry.tooltip(i))
    }

    pub fn summary(&self) -> Summary {
        summary_at(self.registry.locations(), self.timeline.year())
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        let supported_before = self.viewport.is_supported();
        self.viewport = Viewport { cols, rows };
        if supported_before && !self.viewport.is_supported() {
            tracing::warn!(cols, rows, "terminal too small for the globe");
        }
    }

    /// True once after the user asked to retry the capability check.
    pub fn take_retry_request(&mut self) -> bool {
        std::mem::take(&mut self.retry_requested)
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{embedded_locations, Category};
    use crate::geo::{to_cartesian, EARTH_RADIUS, MARKER_ALTITUDE};
    use crate::map::projection::is_facing_camera;
    use chrono::TimeZone;
    use crossterm::event::{Event, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

    fn utc() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 21, 12, 0, 0).unwrap()
    }

    fn app(now: Instant) -> App {
        app_with(&Config::default(), now)
    }

    fn app_with(config: &Config, now: Instant) -> App {
        App::new(
            config,
            embedded_locations().unwrap(),
            DataSource::Embedded,
            Viewport { cols: 120, rows: 40 },
            now,
            utc(),
        )
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    /// Press and release the left button on the terminal cell holding a viewport pixel.
    fn click_cell_at(app: &mut App, x: f64, y: f64) {
        let col = (x / 2.0).floor() as u16 + Viewport::ORIGIN.0;
        let row = (y / 4.0).floor() as u16 + Viewport::ORIGIN.1;
        app.input
            .push_host_event(&mouse(MouseEventKind::Down(MouseButton::Left), col, row), Viewport::ORIGIN);
        app.input
            .push_host_event(&mouse(MouseEventKind::Up(MouseButton::Left), col, row), Viewport::ORIGIN);
    }

    /// App whose camera has flown to New York and settled `distance` globe radii out.
    fn settled_over_new_york(distance: f64, t0: Instant) -> (App, Instant) {
        let mut config = Config::default();
        config.camera.fly_to_distance = distance;
        let mut app = app_with(&config, t0);
        app.input.push(InputEvent::Key(Action::FlyTo(0)));
        app.tick(t0, utc());
        let landed = t0 + Duration::from_millis(config.camera.fly_to_ms + 16);
        app.tick(landed, utc());
        assert!(!app.camera.is_animating());
        app.close_drawer();
        (app, landed)
    }

    fn marker_on_screen(app: &App, index: usize) -> Option<(f64, f64)> {
        let camera = app.current_camera();
        let world = app.registry.markers()[index].world_position();
        let (w, h) = app.viewport.pixel_size();
        let p = camera.to_screen(world, w, h);
        (p.visible && is_facing_camera(world, camera.position)).then_some((p.x, p.y))
    }

    #[test]
    fn test_viewport_geometry() {
        let vp = Viewport { cols: 120, rows: 40 };
        assert_eq!(vp.globe_cells(), (118, 37));
        assert_eq!(vp.pixel_size(), (236.0, 148.0));
        assert!(vp.is_supported());
        assert!(!Viewport { cols: 39, rows: 40 }.is_supported());
    }

    #[test]
    fn test_click_on_new_york_opens_its_achievements() {
        let t0 = Instant::now();
        let mut app = app(t0);
        app.input.push(InputEvent::Key(Action::FlyTo(0)));
        app.tick(t0, utc());
        app.tick(t0 + Duration::from_millis(1100), utc());
        app.close_drawer();

        let nyc = app.registry.locations()[0].geo.with_altitude(MARKER_ALTITUDE).unwrap();
        let (w, h) = app.viewport.pixel_size();
        let p = app.current_camera().to_screen(to_cartesian(&nyc, EARTH_RADIUS), w, h);
        assert!(p.visible);

        app.input.push(InputEvent::PointerDown { x: p.x, y: p.y });
        app.input.push(InputEvent::PointerUp { x: p.x, y: p.y });
        app.tick(t0 + Duration::from_millis(1116), utc());

        let selected = app.selected_location().unwrap();
        assert_eq!(selected.name, "New York HQ");
        assert!(app.drawer_open);
        assert_eq!(app.drawer_items().len(), 3);

        app.filter.category = Some(Category::Award);
        let items = app.drawer_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].category, Category::Award);
    }

    #[test]
    fn test_terminal_click_on_marker_cell_selects_at_any_zoom() {
        for distance in [1.5, 2.5, 5.0, 7.16, 10.0] {
            let t0 = Instant::now();
            let (mut app, landed) = settled_over_new_york(distance, t0);

            let (x, y) = marker_on_screen(&app, 0).unwrap();
            click_cell_at(&mut app, x, y);
            app.tick(landed + Duration::from_millis(16), utc());
            assert_eq!(app.selected, Some(0), "New York at {distance}R");
            assert!(app.drawer_open);

            if distance >= 2.5 {
                app.close_drawer();
                let (x, y) = marker_on_screen(&app, 1).unwrap();
                click_cell_at(&mut app, x, y);
                app.tick(landed + Duration::from_millis(32), utc());
                assert_eq!(app.selected, Some(1), "London at {distance}R");
            }
        }
    }

    #[test]
    fn test_click_on_drawer_keeps_selection() {
        let t0 = Instant::now();
        let mut app = app(t0);
        app.select(1);
        let (w, h) = app.viewport.pixel_size();
        assert!(app.over_drawer(w - 4.0));
        assert!(!app.over_drawer(0.0));

        app.input.push(InputEvent::PointerDown { x: w - 4.0, y: h / 2.0 });
        app.input.push(InputEvent::PointerUp { x: w - 4.0, y: h / 2.0 });
        app.tick(t0, utc());
        assert_eq!(app.selected, Some(1));
        assert!(app.drawer_open);
    }

    #[test]
    fn test_hover_follows_globe_under_still_pointer() {
        let t0 = Instant::now();
        let mut app = app(t0);
        let (w, h) = app.viewport.pixel_size();
        // New York lands in the middle of the view
        app.input.push(InputEvent::PointerMove { x: w / 2.0, y: h / 2.0 });
        app.input.push(InputEvent::Key(Action::FlyTo(0)));
        app.tick(t0, utc());
        app.close_drawer();

        app.tick(t0 + Duration::from_millis(1016), utc());
        assert_eq!(app.hovered, Some(0));
        assert!(app.hover_text().unwrap().starts_with("New York HQ"));
    }

    #[test]
    fn test_arrival_flashes_marker_briefly() {
        let t0 = Instant::now();
        let mut app = app(t0);
        app.input.push(InputEvent::Key(Action::FlyTo(2)));
        app.tick(t0, utc());
        assert_eq!(app.flashing(), None);

        let landed = t0 + Duration::from_millis(1000);
        app.tick(landed, utc());
        assert_eq!(app.flashing(), Some(2));
        app.tick(landed + Duration::from_millis(400), utc());
        assert_eq!(app.flashing(), Some(2));
        app.tick(landed + ARRIVAL_FLASH, utc());
        assert_eq!(app.flashing(), None);
    }

    #[test]
    fn test_interrupted_fly_to_does_not_flash() {
        let t0 = Instant::now();
        let mut app = app(t0);
        app.input.push(InputEvent::Key(Action::FlyTo(1)));
        app.tick(t0, utc());
        app.input.push(InputEvent::Key(Action::ZoomIn));
        app.tick(t0 + Duration::from_millis(300), utc());
        app.tick(t0 + Duration::from_millis(1200), utc());
        assert_eq!(app.flashing(), None);
    }

    #[test]
    fn test_outline_detail_follows_distance() {
        let t0 = Instant::now();
        for (distance, lod) in [(2.5, OutlineLod::High), (7.0, OutlineLod::Medium), (9.5, OutlineLod::Low)] {
            let (app, _) = settled_over_new_york(distance, t0);
            assert_eq!(app.lod, lod, "{distance}R");
            assert_eq!(app.outline_source(), &OutlineSource::Procedural);
        }
    }

    #[test]
    fn test_live_metrics_tick_with_app() {
        let t0 = Instant::now();
        let mut app = app(t0);
        app.tick(t0, utc());
        assert_eq!(app.live.projects(), 42);
        for n in 1..=20 {
            app.tick(t0 + crate::achievements::LIVE_METRICS_INTERVAL * n, utc());
        }
        assert!((30..=50).contains(&app.live.projects()));
    }

    #[test]
    fn test_click_on_empty_space_deselects() {
        let t0 = Instant::now();
        let mut app = app(t0);
        app.select(1);
        assert!(app.drawer_open);
        // Corner of the viewport is open space
        app.input.push(InputEvent::PointerDown { x: 0.0, y: 0.0 });
        app.input.push(InputEvent::PointerUp { x: 0.0, y: 0.0 });
        app.tick(t0, utc());
        assert!(!app.drawer_open);
        assert_eq!(app.selected, None);
    }

    #[test]
    fn test_escape_closes_drawer() {
        let t0 = Instant::now();
        let mut app = app(t0);
        app.select(2);
        app.input.push(InputEvent::Key(Action::CloseOverlay));
        app.tick(t0, utc());
        assert!(!app.drawer_open);
    }

    #[test]
    fn test_tab_cycles_locations() {
        let t0 = Instant::now();
        let mut app = app(t0);
        for expected in [0, 1, 2, 3, 0] {
            app.input.push(InputEvent::Key(Action::NextLocation));
            app.tick(t0, utc());
            assert_eq!(app.selected, Some(expected));
        }
        assert!(app.camera.is_animating());
    }

    #[test]
    fn test_fly_to_out_of_range_is_ignored() {
        let t0 = Instant::now();
        let mut app = app(t0);
        app.input.push(InputEvent::Key(Action::FlyTo(8)));
        app.tick(t0, utc());
        assert_eq!(app.selected, None);
        assert!(!app.camera.is_animating());
    }

    #[test]
    fn test_timeline_hides_later_offices() {
        let t0 = Instant::now();
        let mut app = app(t0);
        app.timeline.set_year(1999);
        app.tick(t0, utc());
        let visible = app.registry.markers().iter().filter(|m| m.visible).count();
        assert_eq!(visible, 2);
        assert_eq!(app.summary().locations, 2);
    }

    #[test]
    fn test_labels_toggle() {
        let t0 = Instant::now();
        let mut app = app(t0);
        app.tick(t0, utc());
        app.input.push(InputEvent::Key(Action::ToggleLabels));
        app.tick(t0 + Duration::from_millis(16), utc());
        assert!(!app.show_labels);
        assert_eq!(app.labels.visible_labels().count(), 0);
    }

    #[test]
    fn test_retry_request_is_taken_once() {
        let t0 = Instant::now();
        let mut app = app(t0);
        app.input.push(InputEvent::Key(Action::Retry));
        app.tick(t0, utc());
        assert!(app.take_retry_request());
        assert!(!app.take_retry_request());
    }

    #[test]
    fn test_resize_updates_capability() {
        let t0 = Instant::now();
        let mut app = app(t0);
        app.input.push(InputEvent::Resize { cols: 30, rows: 10 });
        app.tick(t0, utc());
        assert!(!app.viewport.is_supported());
    }
}
