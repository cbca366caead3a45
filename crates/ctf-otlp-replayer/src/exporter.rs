//! Signal exporters.
//!
//! An exporter wraps one resolved configuration and one transport. It
//! turns a batch of decoded records into the request envelope for its
//! signal and reports a two-valued [`ExportResult`]; transport errors are
//! logged here and never escape.

use crate::error::ReplayError;
use crate::signal::{Logs, Metrics, Signal, Traces};
use crate::transport::{GrpcTransport, Transport};
use otlp_exporter_config::{EnvSnapshot, ExportConfig, SignalSettings, TemporalityTable};
use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

/// Outcome of one export call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportResult {
    /// The transport delivered the batch.
    Success,
    /// The batch was not delivered.
    Failure,
}

impl ExportResult {
    /// Returns true for [`ExportResult::Success`].
    pub fn is_success(self) -> bool {
        matches!(self, ExportResult::Success)
    }
}

/// Exports batches of one signal's records.
pub trait SignalExporter<S: Signal> {
    /// Exports a batch as a single request.
    fn export(&mut self, batch: Vec<S::Record>) -> impl Future<Output = ExportResult>;

    /// Nothing is buffered, so this always succeeds at once.
    fn force_flush(&mut self, _timeout: Duration) -> bool {
        true
    }

    /// Releases the transport.
    fn shutdown(&mut self);
}

/// OTLP exporter for signal `S` over transport `T`.
#[derive(Debug)]
pub struct OtlpExporter<S, T = GrpcTransport> {
    transport: T,
    _signal: PhantomData<S>,
}

/// Span exporter.
pub type SpanExporter<T = GrpcTransport> = OtlpExporter<Traces, T>;

/// Log exporter.
pub type LogExporter<T = GrpcTransport> = OtlpExporter<Logs, T>;

impl<S: Signal, T: Transport<S>> OtlpExporter<S, T> {
    /// Creates an exporter over an existing transport.
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            _signal: PhantomData,
        }
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<S: Signal> OtlpExporter<S, GrpcTransport>
where
    GrpcTransport: Transport<S>,
{
    /// Creates a gRPC exporter from a resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be configured.
    pub fn new(config: &ExportConfig) -> Result<Self, ReplayError> {
        Ok(Self::with_transport(GrpcTransport::connect(config)?))
    }

    /// Resolves the configuration of `S` and creates a gRPC exporter.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the transport
    /// cannot be configured.
    pub fn from_settings(
        settings: &SignalSettings,
        env: &EnvSnapshot,
    ) -> Result<Self, ReplayError> {
        let config = resolve_config::<S>(settings, env)?;
        Self::new(&config)
    }
}

impl<S: Signal, T: Transport<S>> SignalExporter<S> for OtlpExporter<S, T> {
    async fn export(&mut self, batch: Vec<S::Record>) -> ExportResult {
        let request = S::envelope(batch);

        match self.transport.send(request).await {
            Ok(()) => ExportResult::Success,
            Err(e) => {
                tracing::warn!(signal = %S::KIND, error = %e, "Transport failed to deliver batch");
                ExportResult::Failure
            }
        }
    }

    fn shutdown(&mut self) {
        self.transport.shutdown();
    }
}

/// Metric exporter.
///
/// Carries the temporality table and the maximum batch size alongside the
/// transport. Batches are exported exactly as given; the batch size is
/// kept for callers that export more than one record at a time.
#[derive(Debug)]
pub struct MetricExporter<T = GrpcTransport> {
    inner: OtlpExporter<Metrics, T>,
    temporality: TemporalityTable,
    max_export_batch_size: Option<usize>,
}

impl<T: Transport<Metrics>> MetricExporter<T> {
    /// Creates a metric exporter over an existing transport.
    pub fn with_transport(
        transport: T,
        temporality: TemporalityTable,
        max_export_batch_size: Option<usize>,
    ) -> Self {
        Self {
            inner: OtlpExporter::with_transport(transport),
            temporality,
            max_export_batch_size,
        }
    }

    /// Temporality reported for each instrument kind.
    pub fn temporality(&self) -> &TemporalityTable {
        &self.temporality
    }

    /// Maximum number of data points per request, if limited.
    pub fn max_export_batch_size(&self) -> Option<usize> {
        self.max_export_batch_size
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        self.inner.transport()
    }
}

impl MetricExporter<GrpcTransport> {
    /// Resolves the metrics configuration and temporality and creates a
    /// gRPC exporter.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the transport
    /// cannot be configured.
    pub fn from_settings(
        settings: &SignalSettings,
        env: &EnvSnapshot,
    ) -> Result<Self, ReplayError> {
        let config = resolve_config::<Metrics>(settings, env)?;
        let temporality = TemporalityTable::from_env(
            &Metrics::KIND.namespace(),
            env,
            &settings.temporality,
        );

        tracing::debug!(?temporality, "Resolved metric temporality");

        Ok(Self::with_transport(
            GrpcTransport::connect(&config)?,
            temporality,
            settings.max_export_batch_size,
        ))
    }
}

impl<T: Transport<Metrics>> SignalExporter<Metrics> for MetricExporter<T> {
    async fn export(&mut self, batch: Vec<<Metrics as Signal>::Record>) -> ExportResult {
        self.inner.export(batch).await
    }

    fn shutdown(&mut self) {
        self.inner.shutdown();
    }
}

fn resolve_config<S: Signal>(
    settings: &SignalSettings,
    env: &EnvSnapshot,
) -> Result<ExportConfig, ReplayError> {
    let config = ExportConfig::resolve(settings.to_args()?, &S::KIND.namespace(), env)?;

    tracing::debug!(
        signal = %S::KIND,
        endpoint = config.endpoint.as_deref().unwrap_or("<default>"),
        insecure = ?config.insecure,
        headers = config.headers.len(),
        "Resolved exporter configuration"
    );

    Ok(config)
}
