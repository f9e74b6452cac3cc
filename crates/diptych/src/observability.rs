//! Tracing subscriber setup.

use crate::LoggingSettings;
use diptych_error::{ConfigError, DiptychResult};
use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG`, or `level` when it is unset or invalid.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global tracing subscriber.
///
/// `verbose` raises the fallback level to `debug`; an explicit `RUST_LOG`
/// still wins.
///
/// # Errors
///
/// Returns a configuration error if a global subscriber is already set.
pub fn init_tracing(settings: &LoggingSettings, verbose: bool) -> DiptychResult<()> {
    let level = if verbose { "debug" } else { settings.level.as_str() };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(false);

    let result = if settings.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| ConfigError::new(format!("Failed to initialize tracing: {}", e)).into())
}
