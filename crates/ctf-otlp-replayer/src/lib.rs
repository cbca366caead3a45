//! Replays OpenTelemetry data recorded in CTF traces to an OTLP collector.
//!
//! Instrumented programs can emit their spans, metrics and logs as LTTng
//! tracepoints (`opentelemetry:resource_spans`, `opentelemetry:resource_metrics`
//! and `opentelemetry:resource_logs`), each carrying one serialized OTLP
//! resource message. This crate reads those events back and forwards the
//! decoded records over OTLP/gRPC, one event at a time and in source order.
//!
//! # Architecture
//!
//! - [`source`] and [`babeltrace`] - locating ust folders and reading their events
//! - [`signal`] - the three signals and payload decoding
//! - [`transport`] - gRPC delivery with retry
//! - [`exporter`] - per-signal exporters reporting success or failure
//! - [`replayer`] - the driver routing events to exporters and counting outcomes
//!
//! Exporter configuration is resolved by [`otlp_exporter_config`].
//!
//! # Example
//!
//! ```no_run
//! use ctf_otlp_replayer::{
//!     BabeltraceSource, LogExporter, MetricExporter, Replayer, SpanExporter,
//!     discover_ust_folders,
//! };
//! use otlp_exporter_config::{EnvSnapshot, ReplaySettings};
//! use std::path::Path;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let env = EnvSnapshot::capture();
//! let settings = ReplaySettings::load(None, Some("http://localhost:4317"))?;
//!
//! let mut replayer = Replayer::new(
//!     SpanExporter::from_settings(&settings.traces, &env)?,
//!     MetricExporter::from_settings(&settings.metrics, &env)?,
//!     LogExporter::from_settings(&settings.logs, &env)?,
//! );
//!
//! let folders = discover_ust_folders(Path::new("/tmp/traces"))?;
//! let source = BabeltraceSource::new("babeltrace2", folders);
//! let summary = replayer.replay_source(&source).await?;
//! replayer.shutdown();
//!
//! println!("{}/{}", summary.signal_events_exported, summary.signal_events_seen);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod babeltrace;
pub mod error;
pub mod exporter;
pub mod replayer;
pub mod signal;
pub mod source;
pub mod transport;

pub use babeltrace::{BabeltraceSource, DEFAULT_BABELTRACE2};
pub use error::{ReplayError, Result};
pub use exporter::{
    ExportResult, LogExporter, MetricExporter, OtlpExporter, SignalExporter, SpanExporter,
};
pub use replayer::{Replayer, RunSummary};
pub use signal::{DecodeError, Logs, Metrics, Signal, Traces};
pub use source::{
    SignalTag, SourceError, TraceEvent, TraceSource, count_events, discover_ust_folders,
};
pub use transport::{GrpcTransport, Transport, TransportError};
