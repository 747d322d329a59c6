use chrono::{DateTime, Datelike, Timelike, Utc};
use glam::DVec3;
use std::f64::consts::PI;
use std::fmt;
use std::time::{Duration, Instant};

/// Distance of the directional light from the globe centre.
pub const SUN_DISTANCE: f64 = 50.0;

/// Maximum solar declination in degrees.
const AXIAL_TILT_DEG: f64 = 23.45;

/// Sun position derived from wall-clock UTC time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SunState {
    pub declination_rad: f64,
    pub hour_angle_rad: f64,
    pub direction: DVec3,
    pub is_daylight: bool,
    /// 0 at or below the horizon, 1 with the sun overhead
    pub sun_height: f64,
    pub day_of_year: u32,
    pub utc_hours: f64,
}

pub fn compute_sun_state(now: DateTime<Utc>) -> SunState {
    let day_of_year = now.ordinal();
    let utc_hours = now.hour() as f64 + now.minute() as f64 / 60.0 + now.second() as f64 / 3600.0;

    let declination_rad =
        AXIAL_TILT_DEG.to_radians() * (2.0 * PI * (284.0 + day_of_year as f64) / 365.0).sin();
    let hour_angle_rad = ((utc_hours - 12.0) * 15.0).to_radians();

    let (sin_d, cos_d) = declination_rad.sin_cos();
    let (sin_h, cos_h) = hour_angle_rad.sin_cos();
    let direction = DVec3::new(cos_d * cos_h, sin_d, cos_d * sin_h) * SUN_DISTANCE;

    SunState {
        declination_rad,
        hour_angle_rad,
        direction,
        is_daylight: direction.x > 0.0,
        sun_height: (direction.x / SUN_DISTANCE).clamp(0.0, 1.0),
        day_of_year,
        utc_hours,
    }
}

/// How high the sun stands, as shown in the status line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DaylightPhase {
    BrightDaylight,
    Daylight,
    GoldenHour,
    Nighttime,
}

impl DaylightPhase {
    pub fn of(sun: &SunState) -> Self {
        match sun.sun_height {
            _ if !sun.is_daylight => DaylightPhase::Nighttime,
            h if h > 0.7 => DaylightPhase::BrightDaylight,
            h if h > 0.4 => DaylightPhase::Daylight,
            _ => DaylightPhase::GoldenHour,
        }
    }

    pub fn icon(self) -> char {
        match self {
            DaylightPhase::BrightDaylight => '☀',
            DaylightPhase::Daylight => '☼',
            DaylightPhase::GoldenHour => '◒',
            DaylightPhase::Nighttime => '☾',
        }
    }
}

impl fmt::Display for DaylightPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DaylightPhase::BrightDaylight => "Bright Daylight",
            DaylightPhase::Daylight => "Daylight",
            DaylightPhase::GoldenHour => "Golden Hour",
            DaylightPhase::Nighttime => "Nighttime",
        })
    }
}

/// Northern-hemisphere season by day of year.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub fn from_day_of_year(day: u32) -> Self {
        match day {
            80..=171 => Season::Spring,
            172..=265 => Season::Summer,
            266..=354 => Season::Autumn,
            _ => Season::Winter,
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Autumn => "Autumn",
            Season::Winter => "Winter",
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LightingMode {
    Day,
    Night,
    #[default]
    Auto,
}

impl LightingMode {
    pub fn next(self) -> Self {
        match self {
            LightingMode::Auto => LightingMode::Day,
            LightingMode::Day => LightingMode::Night,
            LightingMode::Night => LightingMode::Auto,
        }
    }
}

impl fmt::Display for LightingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LightingMode::Day => "day",
            LightingMode::Night => "night",
            LightingMode::Auto => "auto",
        })
    }
}

/// Light intensities and colours handed to the renderer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightLevels {
    pub sun: f64,
    pub ambient: f64,
    /// Extra cool fill light used at night only
    pub night_ambient: Option<f64>,
    pub sun_color: (u8, u8, u8),
    pub ambient_color: (u8, u8, u8),
    pub daylight: bool,
}

const DAY_SUN: (u8, u8, u8) = (255, 255, 255);
const DAY_AMBIENT: (u8, u8, u8) = (64, 64, 64);
const NIGHT_SUN: (u8, u8, u8) = (0x44, 0x66, 0xaa);
const NIGHT_AMBIENT: (u8, u8, u8) = (0x22, 0x22, 0x44);

/// Map a sun state to light intensities. `user_intensity` is clamped to [0, 1]
/// and every intensity has a floor so the globe never goes fully black.
pub fn apply_lighting(sun: &SunState, mode: LightingMode, user_intensity: f64) -> LightLevels {
    let i = if user_intensity.is_finite() { user_intensity.clamp(0.0, 1.0) } else { 1.0 };
    let h = sun.sun_height;

    let day = |sun_k: f64, ambient_k: f64| LightLevels {
        sun: (sun_k * i).max(0.1),
        ambient: (ambient_k * i).max(0.05),
        night_ambient: None,
        sun_color: DAY_SUN,
        ambient_color: DAY_AMBIENT,
        daylight: true,
    };
    let night = |sun_k: f64, ambient_k: f64, fill_k: f64| LightLevels {
        sun: (sun_k * i).max(0.01),
        ambient: (ambient_k * i).max(0.02),
        night_ambient: Some((fill_k * i).max(0.05)),
        sun_color: NIGHT_SUN,
        ambient_color: NIGHT_AMBIENT,
        daylight: false,
    };

    match mode {
        LightingMode::Day => day(2.5, 0.8),
        LightingMode::Night => night(0.2, 0.15, 0.4),
        LightingMode::Auto if sun.is_daylight => day(1.5 + 0.5 * h, 0.6 + 0.2 * h),
        LightingMode::Auto => night(0.1, 0.12, 0.35),
    }
}

/// Owns the sun refresh timer and the user's lighting controls.
pub struct DayNightCycle {
    mode: LightingMode,
    intensity: f64,
    refresh_interval: Duration,
    sun: SunState,
    levels: LightLevels,
    last_refresh: Instant,
}

impl DayNightCycle {
    pub fn new(mode: LightingMode, intensity: f64, refresh_interval: Duration, now: Instant, utc: DateTime<Utc>) -> Self {
        let sun = compute_sun_state(utc);
        let intensity = intensity.clamp(0.0, 1.0);
        Self {
            mode,
            intensity,
            refresh_interval,
            levels: apply_lighting(&sun, mode, intensity),
            sun,
            last_refresh: now,
        }
    }

    pub fn sun(&self) -> &SunState {
        &self.sun
    }

    pub fn levels(&self) -> &LightLevels {
        &self.levels
    }

    pub fn mode(&self) -> LightingMode {
        self.mode
    }

    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    /// Recompute the sun once the refresh interval has elapsed.
    /// Returns true when the sun state changed.
    pub fn tick(&mut self, now: Instant, utc: DateTime<Utc>) -> bool {
        if now.saturating_duration_since(self.last_refresh) < self.refresh_interval {
            return false;
        }
        self.last_refresh = now;
        self.sun = compute_sun_state(utc);
        self.levels = apply_lighting(&self.sun, self.mode, self.intensity);
        tracing::debug!(
            daylight = self.sun.is_daylight,
            height = self.sun.sun_height,
            "sun position refreshed"
        );
        true
    }

    pub fn set_mode(&mut self, mode: LightingMode) {
        self.mode = mode;
        self.reapply();
    }

    pub fn cycle_mode(&mut self) {
        self.set_mode(self.mode.next());
    }

    pub fn set_intensity(&mut self, intensity: f64) {
        self.intensity = intensity.clamp(0.0, 1.0);
        self.reapply();
    }

    pub fn adjust_intensity(&mut self, delta: f64) {
        self.set_intensity(self.intensity + delta);
    }

    /// Status line such as `Daylight (GMT 14:05) • Spring`. The clock reads `utc`
    /// directly so it stays live between sun refreshes.
    pub fn status_text(&self, utc: DateTime<Utc>) -> String {
        let clock = format!("GMT {:02}:{:02}", utc.hour(), utc.minute());
        match self.mode {
            LightingMode::Day => format!("Always Day Mode ({clock})"),
            LightingMode::Night => format!("Always Night Mode ({clock})"),
            LightingMode::Auto => format!(
                "{} ({clock}) • {}",
                DaylightPhase::of(&self.sun),
                Season::from_day_of_year(self.sun.day_of_year)
            ),
        }
    }

    pub fn phase(&self) -> DaylightPhase {
        match self.mode {
            LightingMode::Day => DaylightPhase::BrightDaylight,
            LightingMode::Night => DaylightPhase::Nighttime,
            LightingMode::Auto => DaylightPhase::of(&self.sun),
        }
    }

    fn reapply(&mut self) {
        self.levels = apply_lighting(&self.sun, self.mode, self.intensity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn equinox_noon() -> DateTime<Utc> {
        // 2023-03-21 is day 80
        Utc.with_ymd_and_hms(2023, 3, 21, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_equinox_noon() {
        let sun = compute_sun_state(equinox_noon());
        assert_eq!(sun.day_of_year, 80);
        assert!(sun.declination_rad.abs() < 0.5f64.to_radians());
        assert!(sun.hour_angle_rad.abs() < 1e-12);
        assert!(sun.is_daylight);
        assert!(sun.sun_height > 0.99);
        assert!((sun.direction.length() - SUN_DISTANCE).abs() < 1e-9);
    }

    #[test]
    fn test_midnight_is_dark() {
        let sun = compute_sun_state(Utc.with_ymd_and_hms(2023, 3, 21, 0, 0, 0).unwrap());
        assert!(!sun.is_daylight);
        assert_eq!(sun.sun_height, 0.0);
    }

    #[test]
    fn test_solstice_declination() {
        let sun = compute_sun_state(Utc.with_ymd_and_hms(2023, 6, 21, 12, 0, 0).unwrap());
        assert!((sun.declination_rad.to_degrees() - 23.45).abs() < 0.1);
        assert!(sun.direction.y > 0.0);
    }

    #[test]
    fn test_lighting_tables() {
        let noon = compute_sun_state(equinox_noon());

        let day = apply_lighting(&noon, LightingMode::Day, 1.0);
        assert!((day.sun - 2.5).abs() < 1e-12);
        assert!((day.ambient - 0.8).abs() < 1e-12);
        assert_eq!(day.night_ambient, None);

        let night = apply_lighting(&noon, LightingMode::Night, 1.0);
        assert!((night.sun - 0.2).abs() < 1e-12);
        assert_eq!(night.night_ambient, Some(0.4));

        let auto = apply_lighting(&noon, LightingMode::Auto, 1.0);
        assert!(auto.daylight);
        assert!((auto.sun - (1.5 + 0.5 * noon.sun_height)).abs() < 1e-12);
    }

    #[test]
    fn test_intensity_floors() {
        let noon = compute_sun_state(equinox_noon());
        let day = apply_lighting(&noon, LightingMode::Day, 0.0);
        assert_eq!((day.sun, day.ambient), (0.1, 0.05));
        let night = apply_lighting(&noon, LightingMode::Night, -3.0);
        assert_eq!((night.sun, night.ambient, night.night_ambient), (0.01, 0.02, Some(0.05)));
    }

    #[test]
    fn test_cycle_refreshes_on_interval() {
        let t0 = Instant::now();
        let mut cycle = DayNightCycle::new(LightingMode::Auto, 1.0, Duration::from_secs(60), t0, equinox_noon());
        assert!(cycle.levels().daylight);

        let midnight = Utc.with_ymd_and_hms(2023, 3, 22, 0, 0, 0).unwrap();
        assert!(!cycle.tick(t0 + Duration::from_secs(30), midnight));
        assert!(cycle.levels().daylight);
        assert!(cycle.tick(t0 + Duration::from_secs(60), midnight));
        assert!(!cycle.levels().daylight);
    }

    #[test]
    fn test_controls_reapply_immediately() {
        let t0 = Instant::now();
        let mut cycle = DayNightCycle::new(LightingMode::Auto, 1.0, Duration::from_secs(60), t0, equinox_noon());
        cycle.cycle_mode();
        assert_eq!(cycle.mode(), LightingMode::Day);
        cycle.adjust_intensity(-0.5);
        assert!((cycle.levels().sun - 1.25).abs() < 1e-12);
        cycle.adjust_intensity(5.0);
        assert_eq!(cycle.intensity(), 1.0);
    }

    #[test]
    fn test_daylight_phases() {
        let noon = compute_sun_state(equinox_noon());
        assert_eq!(DaylightPhase::of(&noon), DaylightPhase::BrightDaylight);
        let midnight = compute_sun_state(Utc.with_ymd_and_hms(2023, 3, 21, 0, 0, 0).unwrap());
        assert_eq!(DaylightPhase::of(&midnight), DaylightPhase::Nighttime);

        let mid = SunState { sun_height: 0.5, ..noon };
        assert_eq!(DaylightPhase::of(&mid), DaylightPhase::Daylight);
        let low = SunState { sun_height: 0.2, ..noon };
        assert_eq!(DaylightPhase::of(&low), DaylightPhase::GoldenHour);
        // Boundaries are exclusive
        let edge = SunState { sun_height: 0.7, ..noon };
        assert_eq!(DaylightPhase::of(&edge), DaylightPhase::Daylight);
    }

    #[test]
    fn test_season_boundaries() {
        assert_eq!(Season::from_day_of_year(1), Season::Winter);
        assert_eq!(Season::from_day_of_year(79), Season::Winter);
        assert_eq!(Season::from_day_of_year(80), Season::Spring);
        assert_eq!(Season::from_day_of_year(171), Season::Spring);
        assert_eq!(Season::from_day_of_year(172), Season::Summer);
        assert_eq!(Season::from_day_of_year(266), Season::Autumn);
        assert_eq!(Season::from_day_of_year(355), Season::Winter);
    }

    #[test]
    fn test_status_text() {
        let t0 = Instant::now();
        let mut cycle = DayNightCycle::new(LightingMode::Auto, 1.0, Duration::from_secs(60), t0, equinox_noon());
        let clock = Utc.with_ymd_and_hms(2023, 3, 21, 12, 7, 59).unwrap();
        assert_eq!(cycle.status_text(clock), "Bright Daylight (GMT 12:07) • Spring");
        cycle.set_mode(LightingMode::Day);
        assert_eq!(cycle.status_text(clock), "Always Day Mode (GMT 12:07)");
        cycle.set_mode(LightingMode::Night);
        assert_eq!(cycle.phase(), DaylightPhase::Nighttime);
        assert_eq!(cycle.status_text(clock), "Always Night Mode (GMT 12:07)");
    }
}
