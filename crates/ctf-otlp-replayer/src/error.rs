//! Error types for the replayer.

use crate::source::SourceError;
use crate::transport::TransportError;
use otlp_exporter_config::ConfigError;
use thiserror::Error;

/// A specialised Result type for replayer setup.
pub type Result<T> = std::result::Result<T, ReplayError>;

/// Errors that stop a replay before it starts.
///
/// Failures while replaying individual events are logged and counted in
/// the run summary instead.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Exporter configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Trace source error.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Transport setup error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
