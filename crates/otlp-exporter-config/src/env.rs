//! Environment capture and per-signal variable namespaces.
//!
//! The process environment is read once into an [`EnvSnapshot`]. Everything
//! downstream resolves against the snapshot, so configuration can be tested
//! by building a snapshot from pairs instead of mutating the real
//! environment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const OTLP_PREFIX: &str = "OTEL_EXPORTER_OTLP_";

/// One of the three telemetry record families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    /// Spans.
    Traces,
    /// Metric data points.
    Metrics,
    /// Log records.
    Logs,
}

impl SignalKind {
    /// All signal kinds, in replay routing order.
    pub const ALL: [SignalKind; 3] = [SignalKind::Traces, SignalKind::Metrics, SignalKind::Logs];

    /// Lowercase name used in logs and settings tables.
    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::Traces => "traces",
            SignalKind::Metrics => "metrics",
            SignalKind::Logs => "logs",
        }
    }

    /// Segment used in the `OTEL_EXPORTER_OTLP_<SEGMENT>_*` variable names.
    fn env_segment(self) -> &'static str {
        match self {
            SignalKind::Traces => "TRACES",
            SignalKind::Metrics => "METRICS",
            SignalKind::Logs => "LOGS",
        }
    }

    /// Returns the environment variable namespace for this signal.
    pub fn namespace(self) -> EnvNamespace {
        EnvNamespace::for_signal(self)
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names of the environment variables consulted for one signal kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvNamespace {
    /// Signal these names belong to.
    pub signal: SignalKind,
    /// Path of a PEM CA certificate.
    pub certificate: String,
    /// Compression algorithm name.
    pub compression: String,
    /// Collector endpoint.
    pub endpoint: String,
    /// Comma separated `key=value` headers.
    pub headers: String,
    /// `"true"` for a plaintext channel.
    pub insecure: String,
    /// Request timeout in whole seconds.
    pub timeout: String,
    /// Metrics temporality preference. Only read for metrics.
    pub temporality_preference: String,
}

impl EnvNamespace {
    /// Builds the standard `OTEL_EXPORTER_OTLP_<SIGNAL>_*` namespace.
    pub fn for_signal(signal: SignalKind) -> Self {
        let base = format!("{OTLP_PREFIX}{}_", signal.env_segment());
        Self {
            signal,
            certificate: format!("{base}CERTIFICATE"),
            compression: format!("{base}COMPRESSION"),
            endpoint: format!("{base}ENDPOINT"),
            headers: format!("{base}HEADERS"),
            insecure: format!("{base}INSECURE"),
            timeout: format!("{base}TIMEOUT"),
            temporality_preference: format!("{base}TEMPORALITY_PREFERENCE"),
        }
    }

    /// Builds the signal-agnostic `OTEL_EXPORTER_OTLP_*` namespace.
    ///
    /// The temporality preference has no generic form, so it keeps the
    /// metrics variable name.
    pub fn generic(signal: SignalKind) -> Self {
        Self {
            signal,
            certificate: format!("{OTLP_PREFIX}CERTIFICATE"),
            compression: format!("{OTLP_PREFIX}COMPRESSION"),
            endpoint: format!("{OTLP_PREFIX}ENDPOINT"),
            headers: format!("{OTLP_PREFIX}HEADERS"),
            insecure: format!("{OTLP_PREFIX}INSECURE"),
            timeout: format!("{OTLP_PREFIX}TIMEOUT"),
            temporality_preference: format!("{OTLP_PREFIX}METRICS_TEMPORALITY_PREFERENCE"),
        }
    }
}

/// Immutable copy of the `OTEL_EXPORTER_OTLP_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Captures the OTLP exporter variables of the current process.
    ///
    /// Variables whose value is not valid unicode are ignored.
    pub fn capture() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .filter(|(k, _)| k.starts_with(OTLP_PREFIX))
            .collect();
        Self { vars }
    }

    /// Creates an empty snapshot.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the raw value of `name`, if set.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Returns true if `name` is set, even to an empty string.
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Number of captured variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Returns true if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for EnvSnapshot
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
