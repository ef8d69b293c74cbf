//! # Logging
//!
//! Library code logs through the `log` facade with per-feature targets (see
//! [`features`]). Binaries call [`init`] once to install an `env_logger`
//! backend; `RUST_LOG` overrides the configured level.

#[macro_use]
pub mod features;

pub use features::{LogFeature, PerformanceTimer};

/// Logging initialisation errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Logging system already initialized")]
    AlreadyInitialized,
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),
}

/// Map a configured level name onto a `log` filter.
pub fn parse_level(level: &str) -> Result<log::LevelFilter, LoggingError> {
    match level.to_ascii_uppercase().as_str() {
        "TRACE" => Ok(log::LevelFilter::Trace),
        "DEBUG" => Ok(log::LevelFilter::Debug),
        "INFO" => Ok(log::LevelFilter::Info),
        "WARN" => Ok(log::LevelFilter::Warn),
        "ERROR" => Ok(log::LevelFilter::Error),
        "OFF" => Ok(log::LevelFilter::Off),
        _ => Err(LoggingError::InvalidLevel(level.to_string())),
    }
}

/// Install the process-wide logger at the given default level.
pub fn init(level: &str) -> Result<(), LoggingError> {
    let filter = parse_level(level)?;
    env_logger::Builder::new()
        .filter_level(filter)
        .parse_env("RUST_LOG")
        .format_timestamp_millis()
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)
}
