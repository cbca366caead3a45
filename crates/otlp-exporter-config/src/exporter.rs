//! Per-signal exporter configuration resolution.
//!
//! One resolver serves all three signal kinds; only the [`EnvNamespace`]
//! differs. For every field the first present source wins: the explicit
//! argument, then the signal variable (`OTEL_EXPORTER_OTLP_<SIGNAL>_*`),
//! then the generic variable (`OTEL_EXPORTER_OTLP_*`).
//!
//! | Field | Explicit argument | Environment |
//! |-------|-------------------|-------------|
//! | `insecure` | [`ExporterArgs::insecure`] | `..._INSECURE` equal to `true`, case-insensitive |
//! | `credentials` | [`ExporterArgs::credentials`] | PEM read from `..._CERTIFICATE`, skipped when insecure |
//! | `timeout` | [`ExporterArgs::timeout`] | `..._TIMEOUT` in whole seconds |
//! | `compression` | [`ExporterArgs::compression`] | `..._COMPRESSION` |
//! | `endpoint` | [`ExporterArgs::endpoint`] | `..._ENDPOINT` |
//! | `headers` | [`ExporterArgs::headers`] | `..._HEADERS` as `k=v,k2=v2` |
//!
//! Fields absent from every source stay unset so the transport can apply
//! its own defaults.

use crate::env::{EnvNamespace, EnvSnapshot, SignalKind};
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Compression requested for export requests.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Explicitly uncompressed.
    None,
    /// Gzip compression.
    Gzip,
    /// Deflate compression.
    Deflate,
}

impl Compression {
    /// Parses an algorithm name, ignoring case and surrounding whitespace.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Compression::None),
            "gzip" => Some(Compression::Gzip),
            "deflate" => Some(Compression::Deflate),
            _ => None,
        }
    }
}

/// CA material used to verify the collector on a secure channel.
#[derive(Clone, PartialEq, Eq)]
pub struct TlsCredentials {
    ca_certificate: Vec<u8>,
}

impl TlsCredentials {
    /// Wraps a PEM encoded CA certificate bundle.
    pub fn from_pem(pem: impl Into<Vec<u8>>) -> Self {
        Self {
            ca_certificate: pem.into(),
        }
    }

    /// Reads a PEM encoded CA certificate bundle from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Certificate`] if the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let pem = std::fs::read(path).map_err(|source| ConfigError::Certificate {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_pem(pem))
    }

    /// Returns the PEM bytes.
    pub fn ca_certificate(&self) -> &[u8] {
        &self.ca_certificate
    }
}

impl fmt::Debug for TlsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsCredentials")
            .field("ca_certificate_len", &self.ca_certificate.len())
            .finish()
    }
}

/// Values supplied explicitly by the caller. `None` means "not given".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExporterArgs {
    /// Collector endpoint.
    pub endpoint: Option<String>,
    /// Plaintext channel.
    pub insecure: Option<bool>,
    /// TLS credentials.
    pub credentials: Option<TlsCredentials>,
    /// Request headers, in order.
    pub headers: Option<Vec<(String, String)>>,
    /// Per-request timeout.
    pub timeout: Option<Duration>,
    /// Request compression.
    pub compression: Option<Compression>,
}

/// Fully resolved configuration for one signal exporter.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    /// Signal this configuration was resolved for.
    pub signal: SignalKind,
    /// Collector endpoint, or `None` for the transport default.
    pub endpoint: Option<String>,
    /// Plaintext channel, or `None` to let the transport infer it.
    pub insecure: Option<bool>,
    /// TLS credentials for a secure channel.
    pub credentials: Option<TlsCredentials>,
    /// Request headers, in order.
    pub headers: Vec<(String, String)>,
    /// Per-request timeout, or `None` for the transport default.
    pub timeout: Option<Duration>,
    /// Request compression, or `None` for the transport default.
    pub compression: Option<Compression>,
}

impl ExportConfig {
    /// Configuration with nothing set, for `signal`.
    pub fn unset(signal: SignalKind) -> Self {
        Self {
            signal,
            endpoint: None,
            insecure: None,
            credentials: None,
            headers: Vec::new(),
            timeout: None,
            compression: None,
        }
    }

    /// Resolves explicit arguments over the environment namespace of one
    /// signal, falling back to the generic namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the timeout or compression variable is malformed,
    /// or if the certificate file cannot be read.
    pub fn resolve(args: ExporterArgs, ns: &EnvNamespace, env: &EnvSnapshot) -> Result<Self> {
        let lookup = Lookup {
            env,
            signal: ns,
            generic: EnvNamespace::generic(ns.signal),
        };

        let insecure = args.insecure.or_else(|| {
            lookup
                .get(|n| &n.insecure)
                .map(|(_, v)| v.eq_ignore_ascii_case("true"))
        });

        let credentials = match args.credentials {
            Some(credentials) => Some(credentials),
            None if insecure == Some(true) => None,
            None => match lookup.get(|n| &n.certificate).filter(|(_, p)| !p.is_empty()) {
                Some((_, path)) => Some(TlsCredentials::from_file(path)?),
                None => None,
            },
        };

        let timeout = match args.timeout {
            Some(timeout) => Some(timeout),
            None => env_timeout(&lookup)?,
        };

        let compression = match args.compression {
            Some(compression) => Some(compression),
            None => env_compression(&lookup)?,
        };

        let endpoint = args
            .endpoint
            .filter(|e| !e.is_empty())
            .or_else(|| lookup.get(|n| &n.endpoint).map(|(_, v)| v.to_owned()));

        let headers = match args.headers.filter(|h| !h.is_empty()) {
            Some(headers) => headers,
            None => lookup
                .get(|n| &n.headers)
                .map(|(_, v)| parse_headers(v))
                .unwrap_or_default(),
        };

        Ok(Self {
            signal: ns.signal,
            endpoint,
            insecure,
            credentials,
            headers,
            timeout,
            compression,
        })
    }
}

/// Signal namespace first, generic namespace second.
struct Lookup<'a> {
    env: &'a EnvSnapshot,
    signal: &'a EnvNamespace,
    generic: EnvNamespace,
}

impl Lookup<'_> {
    /// Returns the name and value of the first variable set for `field`.
    fn get(&self, field: fn(&EnvNamespace) -> &String) -> Option<(&str, &str)> {
        [self.signal, &self.generic].into_iter().find_map(|ns| {
            let name = field(ns);
            self.env.get(name).map(|value| (name.as_str(), value))
        })
    }
}

fn env_timeout(lookup: &Lookup<'_>) -> Result<Option<Duration>> {
    let Some((var, raw)) = lookup.get(|n| &n.timeout) else {
        return Ok(None);
    };

    let secs = raw
        .trim()
        .parse::<u64>()
        .map_err(|source| ConfigError::InvalidTimeout {
            var: var.to_owned(),
            value: raw.to_owned(),
            source,
        })?;

    Ok(Some(Duration::from_secs(secs)))
}

fn env_compression(lookup: &Lookup<'_>) -> Result<Option<Compression>> {
    let Some((var, raw)) = lookup.get(|n| &n.compression) else {
        return Ok(None);
    };

    Compression::parse(raw)
        .map(Some)
        .ok_or_else(|| ConfigError::InvalidCompression {
            var: var.to_owned(),
            value: raw.to_owned(),
        })
}

/// Parses `key=value` pairs separated by commas, keeping their order.
pub fn parse_headers(raw: &str) -> Vec<(String, String)> {
    let mut headers = Vec::new();

    for pair in raw.split(',').filter(|p| !p.trim().is_empty()) {
        match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                headers.push((key.trim().to_string(), value.trim().to_string()));
            }
            _ => tracing::warn!(header = pair, "Skipping malformed header"),
        }
    }

    headers
}
