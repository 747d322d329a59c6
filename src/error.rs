use std::path::PathBuf;
use thiserror::Error;

/// Rejections raised while validating location data at the load boundary.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("latitude {0} outside [-90, 90]")]
    Latitude(f64),

    #[error("longitude {0} outside [-180, 180]")]
    Longitude(f64),

    #[error("altitude {0} must be finite and non-negative")]
    Altitude(f64),

    #[error("location '{id}': missing required field '{field}'")]
    MissingField { id: String, field: &'static str },

    #[error("location entry {index} is malformed: {message}")]
    Malformed { index: usize, message: String },

    #[error("location '{id}': unknown achievement category '{category}'")]
    UnknownCategory { id: String, category: String },

    #[error("location '{id}': invalid coordinates: {source}")]
    Coordinates {
        id: String,
        #[source]
        source: Box<DataError>,
    },

    #[error("location document {path} could not be parsed: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors surfaced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
