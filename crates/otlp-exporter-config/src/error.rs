//! Error types for exporter configuration.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while resolving exporter configuration at startup.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A timeout variable was set but is not a whole number of seconds.
    #[error("invalid timeout in {var}: {value:?}")]
    InvalidTimeout {
        /// Environment variable name.
        var: String,
        /// Offending value.
        value: String,
        /// Underlying parse failure.
        #[source]
        source: std::num::ParseIntError,
    },

    /// A compression variable names an unsupported algorithm.
    #[error("invalid compression in {var}: {value:?} (expected gzip, deflate or none)")]
    InvalidCompression {
        /// Environment variable name.
        var: String,
        /// Offending value.
        value: String,
    },

    /// A certificate file could not be read.
    #[error("failed to read certificate {}", path.display())]
    Certificate {
        /// Certificate path.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The settings file given on the command line does not exist.
    #[error("settings file not found: {}", .0.display())]
    SettingsFileNotFound(PathBuf),

    /// The layered settings could not be extracted.
    #[error("invalid replay settings")]
    Settings(#[source] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Settings(Box::new(err))
    }
}

/// A specialised Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
