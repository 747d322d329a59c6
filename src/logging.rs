//! Structured logging via `tracing`. The terminal belongs to the UI, so output
//! goes to a log file.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

/// Filter used when neither RUST_LOG nor the config provides one.
pub const DEFAULT_FILTER: &str = "info";

/// Build the filter: RUST_LOG wins, then the configured level.
pub fn env_filter(level: &str) -> EnvFilter {
    let directive = if level.trim().is_empty() { DEFAULT_FILTER } else { level };
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber, appending to `config.file`.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    if let Some(parent) = config.file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.file)
        .with_context(|| format!("opening log file {}", config.file.display()))?;

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .with_timer(fmt::time::uptime());

    tracing_subscriber::registry()
        .with(env_filter(&config.level))
        .with(file_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives_parse() {
        for directive in ["info", "debug,tui_globe::camera=trace", "warn"] {
            assert!(EnvFilter::try_new(directive).is_ok(), "{directive}");
        }
    }

    #[test]
    fn test_empty_level_uses_default() {
        // RUST_LOG may be set in CI, so only check that a filter is produced
        let filter = env_filter("");
        assert!(!format!("{filter}").is_empty());
    }
}
