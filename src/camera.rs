use glam::{DQuat, DVec3};
use std::f64::consts::{PI, TAU};
use std::time::{Duration, Instant};

use crate::geo::{to_cartesian, GeoPoint, EARTH_RADIUS};
use crate::map::projection::Camera;

/// Keep the polar angle off the poles so the view never flips.
const POLAR_EPSILON: f64 = 0.01;

/// Largest frame step fed to damping and auto-rotation.
const MAX_FRAME_STEP: f64 = 0.1;

#[derive(Clone, Copy, Debug)]
pub struct CameraSettings {
    pub min_distance: f64,
    pub max_distance: f64,
    pub idle_delay: Duration,
    pub fly_duration: Duration,
    /// Distance from the globe centre at the end of a fly-to
    pub fly_distance: f64,
    /// Orbit-control units: 2.0 is one revolution per 30 s
    pub auto_rotate_speed: f64,
    /// Fraction of the remaining offset closed per 60 Hz frame
    pub damping: f64,
    pub auto_rotate: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            min_distance: 1.1 * EARTH_RADIUS,
            max_distance: 10.0 * EARTH_RADIUS,
            idle_delay: Duration::from_secs(3),
            fly_duration: Duration::from_millis(1000),
            fly_distance: 2.5 * EARTH_RADIUS,
            auto_rotate_speed: 0.5,
            damping: 0.05,
            auto_rotate: true,
        }
    }
}

/// Spherical camera coordinates around the origin.
/// `azimuth` is measured from +Z towards +X, `polar` from +Y.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Orbit {
    pub azimuth: f64,
    pub polar: f64,
    pub distance: f64,
}

impl Orbit {
    pub fn from_position(p: DVec3) -> Self {
        let distance = p.length();
        if distance < f64::EPSILON {
            return Self { azimuth: 0.0, polar: PI / 2.0, distance: 0.0 };
        }
        Self {
            azimuth: p.x.atan2(p.z),
            polar: (p.y / distance).clamp(-1.0, 1.0).acos(),
            distance,
        }
    }

    pub fn position(&self) -> DVec3 {
        let (sin_p, cos_p) = self.polar.sin_cos();
        let (sin_a, cos_a) = self.azimuth.sin_cos();
        DVec3::new(sin_p * sin_a, cos_p, sin_p * cos_a) * self.distance
    }

    fn clamp(mut self, settings: &CameraSettings) -> Self {
        self.polar = self.polar.clamp(POLAR_EPSILON, PI - POLAR_EPSILON);
        self.distance = self.distance.clamp(settings.min_distance, settings.max_distance);
        self
    }
}

/// An in-flight fly-to animation.
#[derive(Clone, Copy, Debug)]
pub struct FlyTo {
    from: DVec3,
    to: DVec3,
    started: Instant,
    duration: Duration,
}

impl FlyTo {
    fn progress(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();
        (elapsed / self.duration.as_secs_f64().max(f64::EPSILON)).clamp(0.0, 1.0)
    }

    /// Direction is slerped and distance lerped, so the path hugs the globe
    /// instead of cutting through it.
    fn position_at(&self, t: f64) -> DVec3 {
        let eased = ease_in_out(t);
        let (from_len, to_len) = (self.from.length(), self.to.length());
        let rotation = DQuat::from_rotation_arc(self.from / from_len, self.to / to_len);
        let direction = DQuat::IDENTITY.slerp(rotation, eased) * (self.from / from_len);
        direction * (from_len + (to_len - from_len) * eased)
    }

    pub fn target(&self) -> DVec3 {
        self.to
    }
}

pub fn ease_in_out(t: f64) -> f64 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}

#[derive(Clone, Copy, Debug)]
pub enum CameraState {
    Idle {
        auto_rotating: bool,
        /// Auto-rotation resumes at this instant unless more input arrives
        resume_at: Option<Instant>,
    },
    Dragging {
        last: (f64, f64),
    },
    Animating(FlyTo),
}

/// Orbit camera with damping, clamped zoom, idle auto-rotation and fly-to.
pub struct CameraController {
    settings: CameraSettings,
    current: Orbit,
    goal: Orbit,
    state: CameraState,
    last_update: Option<Instant>,
}

impl CameraController {
    pub fn new(settings: CameraSettings) -> Self {
        // Start roughly over the Atlantic at a comfortable distance
        let start = Orbit {
            azimuth: PI / 2.0,
            polar: PI / 2.0 - 0.35,
            distance: 3.0 * EARTH_RADIUS,
        }
        .clamp(&settings);
        Self {
            settings,
            current: start,
            goal: start,
            state: CameraState::Idle {
                auto_rotating: settings.auto_rotate,
                resume_at: None,
            },
            last_update: None,
        }
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    pub fn state(&self) -> &CameraState {
        &self.state
    }

    pub fn orbit(&self) -> Orbit {
        self.current
    }

    pub fn position(&self) -> DVec3 {
        self.current.position()
    }

    pub fn distance(&self) -> f64 {
        self.current.distance
    }

    pub fn camera(&self) -> Camera {
        Camera::new(self.current.position(), DVec3::ZERO)
    }

    pub fn is_auto_rotating(&self) -> bool {
        matches!(self.state, CameraState::Idle { auto_rotating: true, .. })
    }

    pub fn is_animating(&self) -> bool {
        matches!(self.state, CameraState::Animating(_))
    }

    pub fn set_auto_rotate(&mut self, enabled: bool) {
        self.settings.auto_rotate = enabled;
        if !enabled {
            if let CameraState::Idle { auto_rotating, .. } = &mut self.state {
                *auto_rotating = false;
            }
        }
    }

    /// Any user input stops auto-rotation and cancels a running fly-to.
    fn interrupt(&mut self, now: Instant) {
        if let CameraState::Animating(_) = self.state {
            self.goal = self.current;
        }
        if !matches!(self.state, CameraState::Dragging { .. }) {
            self.state = self.idle_after(now);
        }
    }

    fn idle_after(&self, now: Instant) -> CameraState {
        CameraState::Idle {
            auto_rotating: false,
            resume_at: self.settings.auto_rotate.then(|| now + self.settings.idle_delay),
        }
    }

    pub fn pointer_down(&mut self, x: f64, y: f64, now: Instant) {
        self.interrupt(now);
        self.state = CameraState::Dragging { last: (x, y) };
    }

    /// Rotate by the pointer movement since the last event. A full viewport
    /// height of movement is one revolution.
    pub fn pointer_move(&mut self, x: f64, y: f64, viewport_height: f64) {
        if let CameraState::Dragging { last } = &mut self.state {
            let (dx, dy) = (x - last.0, y - last.1);
            *last = (x, y);
            let per_pixel = TAU / viewport_height.max(1.0);
            self.goal.azimuth -= dx * per_pixel;
            self.goal.polar -= dy * per_pixel;
            self.goal = self.goal.clamp(&self.settings);
        }
    }

    pub fn pointer_up(&mut self, now: Instant) {
        if let CameraState::Dragging { .. } = self.state {
            self.state = self.idle_after(now);
        }
    }

    /// Keyboard orbit, in radians.
    pub fn rotate_by(&mut self, d_azimuth: f64, d_polar: f64, now: Instant) {
        self.interrupt(now);
        self.goal.azimuth += d_azimuth;
        self.goal.polar += d_polar;
        self.goal = self.goal.clamp(&self.settings);
    }

    /// Multiply the camera distance; factors below 1 zoom in.
    pub fn zoom_by(&mut self, factor: f64, now: Instant) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        self.interrupt(now);
        self.goal.distance *= factor;
        self.goal = self.goal.clamp(&self.settings);
        self.current = self.current.clamp(&self.settings);
    }

    /// Wheel-style zoom: positive steps zoom in by 5% each.
    pub fn zoom_delta(&mut self, steps: i32, now: Instant) {
        self.zoom_by(0.95f64.powi(steps), now);
    }

    /// Fly to a point above `target`. A fly-to already in progress is superseded,
    /// starting from wherever the camera is right now.
    pub fn navigate_to(&mut self, target: &GeoPoint, now: Instant) {
        let distance = self
            .settings
            .fly_distance
            .clamp(self.settings.min_distance, self.settings.max_distance);
        let to = to_cartesian(target, EARTH_RADIUS).normalize_or_zero() * distance;
        if to == DVec3::ZERO {
            return;
        }
        let from = self.position();
        tracing::debug!(
            lat = target.latitude(),
            lng = target.longitude(),
            "camera fly-to"
        );
        self.state = CameraState::Animating(FlyTo {
            from,
            to,
            started: now,
            duration: self.settings.fly_duration,
        });
    }

    /// Advance the camera to `now`. Returns true on the frame a fly-to lands.
    pub fn update(&mut self, now: Instant) -> bool {
        let dt = self
            .last_update
            .map(|t| now.saturating_duration_since(t).as_secs_f64().min(MAX_FRAME_STEP))
            .unwrap_or(0.0);
        self.last_update = Some(now);
        let mut arrived = false;

        match self.state {
            CameraState::Animating(fly) => {
                let t = fly.progress(now);
                self.current = Orbit::from_position(fly.position_at(t)).clamp(&self.settings);
                self.goal = self.current;
                if t >= 1.0 {
                    arrived = true;
                    self.state = CameraState::Idle {
                        auto_rotating: false,
                        resume_at: self
                            .settings
                            .auto_rotate
                            .then(|| fly.started + fly.duration + self.settings.idle_delay),
                    };
                }
            }
            CameraState::Idle { auto_rotating, resume_at } => {
                if !auto_rotating {
                    if let Some(at) = resume_at.filter(|at| now >= *at) {
                        tracing::debug!(?at, "auto-rotate resumed");
                        self.state = CameraState::Idle {
                            auto_rotating: true,
                            resume_at: None,
                        };
                    }
                }
                if self.is_auto_rotating() {
                    self.goal.azimuth -= TAU * self.settings.auto_rotate_speed / 60.0 * dt;
                }
                self.damp(dt);
            }
            CameraState::Dragging { .. } => self.damp(dt),
        }

        self.current = self.current.clamp(&self.settings);
        self.wrap_azimuth();
        arrived
    }

    fn damp(&mut self, dt: f64) {
        let k = 1.0 - (1.0 - self.settings.damping).powf(dt * 60.0);
        self.current.azimuth += (self.goal.azimuth - self.current.azimuth) * k;
        self.current.polar += (self.goal.polar - self.current.polar) * k;
        self.current.distance += (self.goal.distance - self.current.distance) * k;
    }

    fn wrap_azimuth(&mut self) {
        let turns = (self.current.azimuth / TAU).floor();
        if turns != 0.0 {
            self.current.azimuth -= turns * TAU;
            self.goal.azimuth -= turns * TAU;
        }
    }
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new(CameraSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_range(c: &CameraController) -> bool {
        let s = c.settings();
        c.distance() >= s.min_distance - 1e-9 && c.distance() <= s.max_distance + 1e-9
    }

    #[test]
    fn test_orbit_round_trip() {
        let orbit = Orbit { azimuth: 1.2, polar: 0.8, distance: 12.0 };
        let back = Orbit::from_position(orbit.position());
        assert!((back.azimuth - 1.2).abs() < 1e-12);
        assert!((back.polar - 0.8).abs() < 1e-12);
        assert!((back.distance - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_ease_in_out() {
        assert_eq!(ease_in_out(0.0), 0.0);
        assert_eq!(ease_in_out(0.5), 0.5);
        assert_eq!(ease_in_out(1.0), 1.0);
        assert!(ease_in_out(0.25) < 0.25);
        assert!(ease_in_out(0.75) > 0.75);
    }

    #[test]
    fn test_repeated_zoom_stays_clamped() {
        let mut cam = CameraController::default();
        let mut now = Instant::now();
        for _ in 0..500 {
            cam.zoom_by(0.5, now);
            now += Duration::from_millis(16);
            cam.update(now);
            assert!(in_range(&cam));
        }
        for _ in 0..200 {
            cam.update(now);
            now += Duration::from_millis(16);
        }
        assert!((cam.distance() - cam.settings().min_distance).abs() < 1e-3);

        for _ in 0..500 {
            cam.zoom_delta(-20, now);
            now += Duration::from_millis(16);
            cam.update(now);
            assert!(in_range(&cam));
        }
    }

    #[test]
    fn test_polar_angle_is_clamped() {
        let mut cam = CameraController::default();
        let mut now = Instant::now();
        cam.rotate_by(0.0, -10.0, now);
        for _ in 0..600 {
            now += Duration::from_millis(16);
            cam.update(now);
        }
        assert!(cam.orbit().polar >= POLAR_EPSILON);
        assert!(cam.position().y > 0.0);
    }

    #[test]
    fn test_fly_to_lands_above_target() {
        let mut cam = CameraController::default();
        let start = Instant::now();
        let nyc = GeoPoint::surface(40.7128, -74.0060).unwrap();
        cam.navigate_to(&nyc, start);
        assert!(cam.is_animating());

        assert!(!cam.update(start + Duration::from_millis(500)));
        assert!(cam.update(start + Duration::from_millis(1000)));
        assert!(!cam.is_animating());
        // Lands exactly once
        assert!(!cam.update(start + Duration::from_millis(1016)));
        let expected = to_cartesian(&nyc, EARTH_RADIUS).normalize() * 2.5 * EARTH_RADIUS;
        assert!(cam.position().distance(expected) < 1e-6);
    }

    #[test]
    fn test_fly_to_interruption_does_not_jump() {
        let mut cam = CameraController::default();
        let start = Instant::now();
        let tokyo = GeoPoint::surface(35.6762, 139.6503).unwrap();
        let sydney = GeoPoint::surface(-33.8688, 151.2093).unwrap();

        cam.navigate_to(&tokyo, start);
        let mid = start + Duration::from_millis(400);
        cam.update(mid);
        let before = cam.position();

        cam.navigate_to(&sydney, mid);
        cam.update(mid);
        assert!(cam.position().distance(before) < 1e-9);

        // Continues smoothly from there
        let later = mid + Duration::from_millis(16);
        cam.update(later);
        assert!(cam.position().distance(before) < 0.5);
    }

    #[test]
    fn test_auto_rotate_resumes_after_idle_delay() {
        let mut cam = CameraController::default();
        let t0 = Instant::now();
        assert!(cam.is_auto_rotating());

        cam.pointer_down(10.0, 10.0, t0);
        assert!(matches!(cam.state(), CameraState::Dragging { .. }));
        cam.pointer_up(t0);
        cam.update(t0 + Duration::from_millis(2900));
        assert!(!cam.is_auto_rotating());
        cam.update(t0 + Duration::from_secs(3));
        assert!(cam.is_auto_rotating());
    }

    #[test]
    fn test_input_restarts_idle_timer() {
        let mut cam = CameraController::default();
        let t0 = Instant::now();
        cam.pointer_down(0.0, 0.0, t0);
        cam.pointer_up(t0);
        cam.zoom_by(0.9, t0 + Duration::from_secs(2));
        cam.update(t0 + Duration::from_secs(4));
        assert!(!cam.is_auto_rotating());
        cam.update(t0 + Duration::from_secs(5));
        assert!(cam.is_auto_rotating());
    }

    #[test]
    fn test_drag_rotates_camera() {
        let mut cam = CameraController::default();
        let mut now = Instant::now();
        cam.update(now);
        let before = cam.orbit().azimuth;
        cam.pointer_down(100.0, 50.0, now);
        cam.pointer_move(150.0, 50.0, 200.0);
        for _ in 0..300 {
            now += Duration::from_millis(16);
            cam.update(now);
        }
        let turned = before - cam.orbit().azimuth;
        let expected = 50.0 * TAU / 200.0;
        let diff = (turned - expected).rem_euclid(TAU);
        assert!(diff < 1e-3 || TAU - diff < 1e-3);
    }

    #[test]
    fn test_auto_rotation_moves_azimuth() {
        let mut cam = CameraController::default();
        let mut now = Instant::now();
        cam.update(now);
        let before = cam.position();
        for _ in 0..120 {
            now += Duration::from_millis(16);
            cam.update(now);
        }
        assert!(cam.position().distance(before) > 1e-3);
        assert!(in_range(&cam));
    }
}
