//! # Configuration Errors
//!
//! Failures raised while resolving connection settings. None of these are
//! retried: they describe a broken local setup, not a transient condition.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for settings resolution.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors surfaced while building [`crate::ConnectionSettings`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file does not exist.
    #[error(
        ".env file not found at {}. Please copy .env.example to .env and set your configuration",
        .path.display()
    )]
    NotFound { path: PathBuf },

    /// The settings file exists but could not be read or parsed.
    #[error("failed to read settings file {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    /// A port variable did not hold a valid TCP port.
    #[error("invalid value {value:?} for {key}: expected a TCP port")]
    InvalidPort { key: &'static str, value: String },
}
