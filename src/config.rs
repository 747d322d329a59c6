//! Runtime configuration: RON file with defaults, overridden from the command line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::camera::CameraSettings;
use crate::error::ConfigError;
use crate::geo::EARTH_RADIUS;
use crate::lighting::LightingMode;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "tui-globe.ron";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub camera: CameraConfig,
    pub labels: LabelConfig,
    pub lighting: LightingConfig,
    pub timeline: TimelineConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    /// Location document (JSON). The embedded dataset is used if it cannot be loaded.
    pub locations: PathBuf,
    /// Directory searched for coastline GeoJSON.
    pub data_dir: PathBuf,
    /// Per-source timeout for the background outline loader.
    pub outline_timeout_secs: u64,
}

/// Camera distances are multiples of the globe radius.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub fly_to_distance: f64,
    pub fly_to_ms: u64,
    pub idle_delay_ms: u64,
    pub auto_rotate: bool,
    pub auto_rotate_speed: f64,
    pub damping: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LabelConfig {
    pub enabled: bool,
    pub overlap_threshold_px: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LightingConfig {
    pub mode: LightingMode,
    /// 0.0 - 1.0
    pub intensity: f64,
    pub refresh_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimelineConfig {
    /// Time taken to play the whole timeline.
    pub play_duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when RUST_LOG is unset.
    pub level: String,
    pub file: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            locations: PathBuf::from("data/locations.json"),
            data_dir: PathBuf::from("data"),
            outline_timeout_secs: 8,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            min_zoom: 1.1,
            max_zoom: 10.0,
            fly_to_distance: 2.5,
            fly_to_ms: 1000,
            idle_delay_ms: 3000,
            auto_rotate: true,
            auto_rotate_speed: 0.5,
            damping: 0.05,
        }
    }
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            overlap_threshold_px: 50.0,
        }
    }
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            mode: LightingMode::Auto,
            intensity: 1.0,
            refresh_secs: 60,
        }
    }
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self { play_duration_ms: 10_000 }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: PathBuf::from("tui-globe.log"),
        }
    }
}

impl Config {
    /// Parse and validate a RON config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = ron::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else `tui-globe.ron` when present, else defaults.
    /// An explicitly named file that cannot be read is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let cam = &self.camera;
        if !(cam.min_zoom > 1.0) {
            return Err(invalid("camera.min_zoom", "must be greater than 1 (outside the globe)"));
        }
        if !(cam.max_zoom > cam.min_zoom) {
            return Err(invalid("camera.max_zoom", "must be greater than camera.min_zoom"));
        }
        if !(cam.damping > 0.0 && cam.damping <= 1.0) {
            return Err(invalid("camera.damping", "must be in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.lighting.intensity) {
            return Err(invalid("lighting.intensity", "must be in [0, 1]"));
        }
        if !(self.labels.overlap_threshold_px > 0.0) {
            return Err(invalid("labels.overlap_threshold_px", "must be positive"));
        }
        if self.timeline.play_duration_ms == 0 {
            return Err(invalid("timeline.play_duration_ms", "must be positive"));
        }
        Ok(())
    }

    pub fn camera_settings(&self) -> CameraSettings {
        let cam = &self.camera;
        CameraSettings {
            min_distance: cam.min_zoom * EARTH_RADIUS,
            max_distance: cam.max_zoom * EARTH_RADIUS,
            idle_delay: Duration::from_millis(cam.idle_delay_ms),
            fly_duration: Duration::from_millis(cam.fly_to_ms),
            fly_distance: cam.fly_to_distance * EARTH_RADIUS,
            auto_rotate_speed: cam.auto_rotate_speed,
            damping: cam.damping,
            auto_rotate: cam.auto_rotate,
        }
    }

    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref path) = args.locations {
            self.data.locations = path.clone();
        }
        if let Some(ref dir) = args.data_dir {
            self.data.data_dir = dir.clone();
        }
        if let Some(ref file) = args.log_file {
            self.log.file = file.clone();
        }
        if let Some(ref level) = args.log_level {
            self.log.level = level.clone();
        }
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

/// Command-line arguments. Values override the config file.
#[derive(Parser, Debug, Default)]
#[command(name = "tui-globe", about = "Interactive terminal globe of office locations and achievements")]
pub struct CliArgs {
    /// Path to a RON config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Location document (JSON).
    #[arg(long)]
    pub locations: Option<PathBuf>,

    /// Directory containing coastline GeoJSON.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Log file path.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,
}
