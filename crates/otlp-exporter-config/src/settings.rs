//! Layered explicit arguments for the three exporters.
//!
//! Explicit arguments come from (later sources override earlier):
//! 1. Built-in defaults (nothing set)
//! 2. An optional TOML file with `[traces]`, `[metrics]` and `[logs]` tables
//! 3. Command-line overrides
//!
//! The result is turned into one [`ExporterArgs`] per signal, which the
//! resolver then layers over the environment.
//!
//! ```toml
//! [traces]
//! endpoint = "https://collector:4317"
//! certificate_file = "/etc/ssl/collector-ca.pem"
//! headers = [["authorization", "Bearer token"], ["tenant", "a"]]
//!
//! [metrics]
//! timeout_secs = 5
//! compression = "gzip"
//! max_export_batch_size = 512
//! temporality = { counter = "delta" }
//! ```

use crate::env::SignalKind;
use crate::error::{ConfigError, Result};
use crate::exporter::{Compression, ExporterArgs, TlsCredentials};
use crate::temporality::TemporalityOverrides;
use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Explicit arguments for one signal exporter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalSettings {
    /// Collector endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Plaintext channel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,
    /// PEM CA certificate used as explicit credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_file: Option<PathBuf>,
    /// Request headers as `[name, value]` pairs, sent in file order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<(String, String)>>,
    /// Per-request timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Request compression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<Compression>,
    /// Maximum data points per request. Metrics only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_export_batch_size: Option<usize>,
    /// Per-instrument temporality overrides. Metrics only.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub temporality: TemporalityOverrides,
}

impl SignalSettings {
    /// Converts the settings into resolver arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if `certificate_file` is set but cannot be read.
    pub fn to_args(&self) -> Result<ExporterArgs> {
        let credentials = self
            .certificate_file
            .as_deref()
            .map(TlsCredentials::from_file)
            .transpose()?;

        Ok(ExporterArgs {
            endpoint: self.endpoint.clone(),
            insecure: self.insecure,
            credentials,
            headers: self.headers.clone(),
            timeout: self.timeout_secs.map(Duration::from_secs),
            compression: self.compression,
        })
    }
}

/// Explicit arguments for all three exporters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaySettings {
    /// Span exporter arguments.
    pub traces: SignalSettings,
    /// Metric exporter arguments.
    pub metrics: SignalSettings,
    /// Log exporter arguments.
    pub logs: SignalSettings,
}

impl ReplaySettings {
    /// Loads settings from an optional TOML file and command-line overrides.
    ///
    /// An endpoint given on the command line applies to every signal and
    /// implies a plaintext channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be parsed.
    pub fn load(config_file: Option<&Path>, endpoint: Option<&str>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(path) = config_file {
            if !path.is_file() {
                return Err(ConfigError::SettingsFileNotFound(path.to_path_buf()));
            }
            figment = figment.merge(Toml::file(path));
        }

        if let Some(endpoint) = endpoint {
            figment = figment.merge(Serialized::defaults(Self::insecure_endpoint(endpoint)));
        }

        Ok(figment.extract()?)
    }

    /// Settings that send every signal to `endpoint` over a plaintext channel.
    pub fn insecure_endpoint(endpoint: &str) -> Self {
        let signal = SignalSettings {
            endpoint: Some(endpoint.to_string()),
            insecure: Some(true),
            ..Default::default()
        };

        Self {
            traces: signal.clone(),
            metrics: signal.clone(),
            logs: signal,
        }
    }

    /// Returns the settings of one signal.
    pub fn signal(&self, kind: SignalKind) -> &SignalSettings {
        match kind {
            SignalKind::Traces => &self.traces,
            SignalKind::Metrics => &self.metrics,
            SignalKind::Logs => &self.logs,
        }
    }
}
