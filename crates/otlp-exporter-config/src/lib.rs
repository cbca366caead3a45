//! Exporter configuration for replaying recorded OTLP telemetry.
//!
//! This crate resolves, once at startup, everything the span, metric and
//! log exporters need: endpoint, channel security, headers, timeout,
//! compression and, for metrics, the aggregation temporality table.
//!
//! # Sources
//!
//! - **Explicit arguments** - layered with [figment](https://docs.rs/figment)
//!   from an optional TOML file and command-line overrides ([`ReplaySettings`])
//! - **Environment** - the standard `OTEL_EXPORTER_OTLP_<SIGNAL>_*`
//!   variables, captured once into an [`EnvSnapshot`]
//!
//! Explicit arguments always win over the environment. Anything set in
//! neither place is left unset for the transport to decide.
//!
//! # Example
//!
//! ```no_run
//! use otlp_exporter_config::{ConfigError, EnvSnapshot, ExportConfig, ReplaySettings, SignalKind};
//!
//! fn main() -> Result<(), ConfigError> {
//!     let env = EnvSnapshot::capture();
//!     let settings = ReplaySettings::load(None, Some("http://localhost:4317"))?;
//!
//!     let traces = ExportConfig::resolve(
//!         settings.traces.to_args()?,
//!         &SignalKind::Traces.namespace(),
//!         &env,
//!     )?;
//!     assert_eq!(traces.insecure, Some(true));
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod env;
mod error;
mod exporter;
mod settings;
mod temporality;

pub use env::{EnvNamespace, EnvSnapshot, SignalKind};
pub use error::{ConfigError, Result};
pub use exporter::{Compression, ExportConfig, ExporterArgs, TlsCredentials, parse_headers};
pub use settings::{ReplaySettings, SignalSettings};
pub use temporality::{InstrumentKind, Temporality, TemporalityOverrides, TemporalityTable};

// Re-export figment for callers that layer their own providers
pub use figment;
