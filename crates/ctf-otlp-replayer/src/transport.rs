//! gRPC delivery of export requests.
//!
//! A [`Transport`] takes one serialized request envelope per call and
//! owns everything about getting it to the collector: the channel, TLS,
//! metadata, compression and retry with exponential backoff.

use crate::signal::{Logs, Metrics, Signal, Traces};
use opentelemetry_proto::tonic::collector::logs::v1::logs_service_client::LogsServiceClient;
use opentelemetry_proto::tonic::collector::metrics::v1::metrics_service_client::MetricsServiceClient;
use opentelemetry_proto::tonic::collector::trace::v1::trace_service_client::TraceServiceClient;
use otlp_exporter_config::{Compression, ExportConfig};
use std::future::Future;
use std::time::Duration;
use tonic::codec::CompressionEncoding;
use tonic::metadata::{MetadataKey, MetadataMap, MetadataValue};
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};

/// Collector endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:4317";

/// Per-request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(50);

/// Error during delivery of an export request.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The endpoint is not a valid URI.
    #[error("invalid collector endpoint {endpoint}")]
    InvalidEndpoint {
        /// Endpoint as configured.
        endpoint: String,
        /// Parse failure.
        #[source]
        source: tonic::transport::Error,
    },

    /// TLS could not be configured for the channel.
    #[error("failed to configure TLS")]
    Tls(#[source] tonic::transport::Error),

    /// The collector or the channel returned an error status.
    #[error("export failed with {}: {}", .0.code(), .0.message())]
    Status(#[source] Box<tonic::Status>),

    /// The transport was shut down.
    #[error("transport is shut down")]
    Closed,
}

impl From<tonic::Status> for TransportError {
    fn from(status: tonic::Status) -> Self {
        Self::Status(Box::new(status))
    }
}

/// Delivers export requests of signal `S`.
pub trait Transport<S: Signal> {
    /// Sends one request and waits for the collector's answer.
    fn send(&mut self, request: S::Request) -> impl Future<Output = Result<(), TransportError>>;

    /// Releases the connection. Later sends fail with [`TransportError::Closed`].
    fn shutdown(&mut self);
}

/// OTLP/gRPC transport over one lazily connected channel.
#[derive(Debug, Clone)]
pub struct GrpcTransport {
    endpoint: String,
    channel: Option<Channel>,
    metadata: MetadataMap,
    compression: Option<CompressionEncoding>,
    timeout: Duration,
}

impl GrpcTransport {
    /// Builds a transport from a resolved configuration.
    ///
    /// The channel connects on first use, so this never blocks, but it must
    /// be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a valid URI or TLS cannot be
    /// configured.
    pub fn connect(config: &ExportConfig) -> Result<Self, TransportError> {
        let (uri, insecure) = normalize_endpoint(config.endpoint.as_deref(), config.insecure);
        let timeout = config.timeout.unwrap_or(DEFAULT_TIMEOUT);

        let mut endpoint = Endpoint::from_shared(uri.clone())
            .map_err(|source| TransportError::InvalidEndpoint {
                endpoint: uri.clone(),
                source,
            })?
            .timeout(timeout)
            .connect_timeout(timeout);

        if !insecure {
            let tls = match &config.credentials {
                Some(credentials) => ClientTlsConfig::new()
                    .ca_certificate(Certificate::from_pem(credentials.ca_certificate())),
                None => ClientTlsConfig::new().with_native_roots(),
            };
            endpoint = endpoint.tls_config(tls).map_err(TransportError::Tls)?;
        }

        tracing::debug!(
            signal = %config.signal,
            endpoint = %uri,
            insecure,
            timeout_ms = timeout.as_millis() as u64,
            "Configured OTLP transport"
        );

        Ok(Self {
            endpoint: uri,
            channel: Some(endpoint.connect_lazy()),
            metadata: metadata_from_headers(&config.headers),
            compression: compression_encoding(config.compression),
            timeout,
        })
    }

    /// Normalised collector URI.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns true once [`Transport::shutdown`] has been called.
    pub fn is_closed(&self) -> bool {
        self.channel.is_none()
    }

    fn close(&mut self) {
        if self.channel.take().is_some() {
            tracing::debug!(endpoint = %self.endpoint, "Closed OTLP transport");
        }
    }

    async fn send_with_retry<R, F, Fut>(&self, request: R, mut call: F) -> Result<(), TransportError>
    where
        R: Clone,
        F: FnMut(Channel, tonic::Request<R>) -> Fut,
        Fut: Future<Output = Result<(), tonic::Status>>,
    {
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let channel = self.channel.clone().ok_or(TransportError::Closed)?;

            let mut grpc_request = tonic::Request::new(request.clone());
            *grpc_request.metadata_mut() = self.metadata.clone();
            grpc_request.set_timeout(self.timeout);

            match call(channel, grpc_request).await {
                Ok(()) => return Ok(()),
                Err(status) if attempt < MAX_ATTEMPTS && is_retryable(status.code()) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = MAX_ATTEMPTS,
                        code = ?status.code(),
                        message = status.message(),
                        "Export attempt failed"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(status) => return Err(status.into()),
            }
        }
    }
}

impl Transport<Traces> for GrpcTransport {
    async fn send(
        &mut self,
        request: <Traces as Signal>::Request,
    ) -> Result<(), TransportError> {
        let compression = self.compression;
        self.send_with_retry(request, |channel, request| async move {
            let mut client = TraceServiceClient::new(channel);
            if let Some(encoding) = compression {
                client = client.send_compressed(encoding);
            }

            let response = client.export(request).await?.into_inner();
            if let Some(partial) = response.partial_success
                && partial.rejected_spans > 0
            {
                tracing::warn!(
                    rejected = partial.rejected_spans,
                    message = %partial.error_message,
                    "Collector rejected spans"
                );
            }
            Ok::<(), tonic::Status>(())
        })
        .await
    }

    fn shutdown(&mut self) {
        self.close();
    }
}

impl Transport<Metrics> for GrpcTransport {
    async fn send(
        &mut self,
        request: <Metrics as Signal>::Request,
    ) -> Result<(), TransportError> {
        let compression = self.compression;
        self.send_with_retry(request, |channel, request| async move {
            let mut client = MetricsServiceClient::new(channel);
            if let Some(encoding) = compression {
                client = client.send_compressed(encoding);
            }

            let response = client.export(request).await?.into_inner();
            if let Some(partial) = response.partial_success
                && partial.rejected_data_points > 0
            {
                tracing::warn!(
                    rejected = partial.rejected_data_points,
                    message = %partial.error_message,
                    "Collector rejected data points"
                );
            }
            Ok::<(), tonic::Status>(())
        })
        .await
    }

    fn shutdown(&mut self) {
        self.close();
    }
}

impl Transport<Logs> for GrpcTransport {
    async fn send(&mut self, request: <Logs as Signal>::Request) -> Result<(), TransportError> {
        let compression = self.compression;
        self.send_with_retry(request, |channel, request| async move {
            let mut client = LogsServiceClient::new(channel);
            if let Some(encoding) = compression {
                client = client.send_compressed(encoding);
            }

            let response = client.export(request).await?.into_inner();
            if let Some(partial) = response.partial_success
                && partial.rejected_log_records > 0
            {
                tracing::warn!(
                    rejected = partial.rejected_log_records,
                    message = %partial.error_message,
                    "Collector rejected log records"
                );
            }
            Ok::<(), tonic::Status>(())
        })
        .await
    }

    fn shutdown(&mut self) {
        self.close();
    }
}

/// Returns the full URI to dial and whether the channel is plaintext.
///
/// Without an explicit `insecure` flag, plaintext is inferred from an
/// `http` scheme. A scheme-less endpoint gets one matching the flag.
fn normalize_endpoint(endpoint: Option<&str>, insecure: Option<bool>) -> (String, bool) {
    let raw = endpoint
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .unwrap_or(DEFAULT_ENDPOINT);

    match raw.split_once("://") {
        Some((scheme, _)) => {
            let insecure = insecure.unwrap_or_else(|| scheme.eq_ignore_ascii_case("http"));
            (raw.to_string(), insecure)
        }
        None => {
            let insecure = insecure.unwrap_or(false);
            let scheme = if insecure { "http" } else { "https" };
            (format!("{scheme}://{raw}"), insecure)
        }
    }
}

fn metadata_from_headers(headers: &[(String, String)]) -> MetadataMap {
    let mut metadata = MetadataMap::new();

    for (key, value) in headers {
        match (key.parse::<MetadataKey<_>>(), value.parse::<MetadataValue<_>>()) {
            (Ok(k), Ok(v)) => {
                metadata.append(k, v);
            }
            _ => tracing::warn!(header = %key, "Skipping header that is not valid gRPC metadata"),
        }
    }

    metadata
}

fn compression_encoding(compression: Option<Compression>) -> Option<CompressionEncoding> {
    match compression {
        Some(Compression::Gzip) => Some(CompressionEncoding::Gzip),
        Some(Compression::Deflate) => Some(CompressionEncoding::Deflate),
        _ => None,
    }
}

/// Codes worth another attempt, as listed by the OTLP/gRPC retry rules.
fn is_retryable(code: tonic::Code) -> bool {
    matches!(
        code,
        tonic::Code::Cancelled
            | tonic::Code::DeadlineExceeded
            | tonic::Code::ResourceExhausted
            | tonic::Code::Aborted
            | tonic::Code::OutOfRange
            | tonic::Code::Unavailable
            | tonic::Code::DataLoss
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use otlp_exporter_config::SignalKind;

    #[test]
    fn test_default_endpoint_is_plaintext() {
        let (uri, insecure) = normalize_endpoint(None, None);
        assert_eq!(uri, DEFAULT_ENDPOINT);
        assert!(insecure);

        let (uri, _) = normalize_endpoint(Some("  "), None);
        assert_eq!(uri, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_scheme_infers_security() {
        assert_eq!(
            normalize_endpoint(Some("https://collector:4317"), None),
            ("https://collector:4317".to_string(), false)
        );
        assert_eq!(
            normalize_endpoint(Some("HTTP://collector:4317"), None),
            ("HTTP://collector:4317".to_string(), true)
        );
    }

    #[test]
    fn test_explicit_flag_beats_scheme() {
        let (_, insecure) = normalize_endpoint(Some("https://collector:4317"), Some(true));
        assert!(insecure);
    }

    #[test]
    fn test_scheme_less_endpoint() {
        assert_eq!(
            normalize_endpoint(Some("collector:4317"), Some(true)),
            ("http://collector:4317".to_string(), true)
        );
        assert_eq!(
            normalize_endpoint(Some("collector:4317"), None),
            ("https://collector:4317".to_string(), false)
        );
    }

    #[test]
    fn test_metadata_skips_invalid_headers() {
        let headers = vec![
            ("authorization".to_string(), "Bearer token".to_string()),
            ("bad header".to_string(), "value".to_string()),
            ("x-tenant".to_string(), "bad\nvalue".to_string()),
            ("x-tenant".to_string(), "acme".to_string()),
        ];

        let metadata = metadata_from_headers(&headers);

        assert_eq!(metadata.len(), 2);
        assert_eq!(
            metadata.get("authorization").unwrap().to_str().unwrap(),
            "Bearer token"
        );
        assert_eq!(metadata.get("x-tenant").unwrap().to_str().unwrap(), "acme");
    }

    #[test]
    fn test_compression_mapping() {
        assert_eq!(
            compression_encoding(Some(Compression::Gzip)),
            Some(CompressionEncoding::Gzip)
        );
        assert_eq!(
            compression_encoding(Some(Compression::Deflate)),
            Some(CompressionEncoding::Deflate)
        );
        assert_eq!(compression_encoding(Some(Compression::None)), None);
        assert_eq!(compression_encoding(None), None);
    }

    #[test]
    fn test_retryable_codes() {
        assert!(is_retryable(tonic::Code::Unavailable));
        assert!(is_retryable(tonic::Code::ResourceExhausted));
        assert!(!is_retryable(tonic::Code::InvalidArgument));
        assert!(!is_retryable(tonic::Code::Unauthenticated));
        assert!(!is_retryable(tonic::Code::PermissionDenied));
    }

    #[tokio::test]
    async fn test_connect_applies_defaults() {
        let transport = GrpcTransport::connect(&ExportConfig::unset(SignalKind::Traces)).unwrap();

        assert_eq!(transport.endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(transport.timeout, DEFAULT_TIMEOUT);
        assert!(transport.metadata.is_empty());
        assert!(!transport.is_closed());
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_endpoint() {
        let config = ExportConfig {
            endpoint: Some("http://exa mple:4317".to_string()),
            ..ExportConfig::unset(SignalKind::Logs)
        };

        let err = GrpcTransport::connect(&config).unwrap_err();
        assert!(matches!(err, TransportError::InvalidEndpoint { .. }));
    }

    #[tokio::test]
    async fn test_connect_uses_configured_values() {
        let config = ExportConfig {
            endpoint: Some("collector:4317".to_string()),
            insecure: Some(true),
            headers: vec![("x-tenant".to_string(), "acme".to_string())],
            timeout: Some(Duration::from_secs(3)),
            compression: Some(Compression::Gzip),
            ..ExportConfig::unset(SignalKind::Metrics)
        };

        let transport = GrpcTransport::connect(&config).unwrap();
        assert_eq!(transport.endpoint(), "http://collector:4317");
        assert_eq!(transport.timeout, Duration::from_secs(3));
        assert_eq!(transport.compression, Some(CompressionEncoding::Gzip));
        assert_eq!(transport.metadata.len(), 1);
    }

    #[tokio::test]
    async fn test_send_after_shutdown_is_closed() {
        let mut transport =
            GrpcTransport::connect(&ExportConfig::unset(SignalKind::Traces)).unwrap();

        Transport::<Traces>::shutdown(&mut transport);
        assert!(transport.is_closed());

        let err = Transport::<Traces>::send(&mut transport, Default::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }
}
