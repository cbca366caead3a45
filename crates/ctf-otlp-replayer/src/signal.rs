//! The three telemetry signals and how their payloads are decoded.
//!
//! Each recorded event carries one serialized `ResourceSpans`,
//! `ResourceMetrics` or `ResourceLogs` message. A [`Signal`] ties that
//! record type to its export request and to the identifier logged when an
//! export fails.

use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::logs::v1::ResourceLogs;
use opentelemetry_proto::tonic::metrics::v1::ResourceMetrics;
use opentelemetry_proto::tonic::trace::v1::ResourceSpans;
use otlp_exporter_config::SignalKind;
use prost::Message;

/// A telemetry signal replayed from recorded events.
pub trait Signal: Send + Sync + 'static {
    /// Resource-level record carried by one event.
    type Record: Message + Default + Clone + Send + 'static;
    /// Collector request wrapping a batch of records.
    type Request: Message + Default + Clone + Send + 'static;

    /// Signal kind, used for configuration and logging.
    const KIND: SignalKind;
    /// Full name of the tracepoint carrying this signal.
    const EVENT_NAME: &'static str;

    /// Wraps a batch of records into an export request.
    fn envelope(batch: Vec<Self::Record>) -> Self::Request;

    /// Identifier logged when exporting `batch` fails.
    fn identify(batch: &[Self::Record]) -> Option<String>;
}

/// Spans.
#[derive(Debug, Clone, Copy, Default)]
pub struct Traces;

/// Metric data points.
#[derive(Debug, Clone, Copy, Default)]
pub struct Metrics;

/// Log records.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logs;

impl Signal for Traces {
    type Record = ResourceSpans;
    type Request = ExportTraceServiceRequest;

    const KIND: SignalKind = SignalKind::Traces;
    const EVENT_NAME: &'static str = "opentelemetry:resource_spans";

    fn envelope(batch: Vec<Self::Record>) -> Self::Request {
        ExportTraceServiceRequest {
            resource_spans: batch,
        }
    }

    /// Trace id of the first span, in lowercase hex.
    fn identify(batch: &[Self::Record]) -> Option<String> {
        batch
            .iter()
            .flat_map(|rs| &rs.scope_spans)
            .flat_map(|ss| &ss.spans)
            .next()
            .map(|span| hex::encode(&span.trace_id))
    }
}

impl Signal for Metrics {
    type Record = ResourceMetrics;
    type Request = ExportMetricsServiceRequest;

    const KIND: SignalKind = SignalKind::Metrics;
    const EVENT_NAME: &'static str = "opentelemetry:resource_metrics";

    fn envelope(batch: Vec<Self::Record>) -> Self::Request {
        ExportMetricsServiceRequest {
            resource_metrics: batch,
        }
    }

    /// Name of the first metric.
    fn identify(batch: &[Self::Record]) -> Option<String> {
        batch
            .iter()
            .flat_map(|rm| &rm.scope_metrics)
            .flat_map(|sm| &sm.metrics)
            .next()
            .map(|metric| metric.name.clone())
    }
}

impl Signal for Logs {
    type Record = ResourceLogs;
    type Request = ExportLogsServiceRequest;

    const KIND: SignalKind = SignalKind::Logs;
    const EVENT_NAME: &'static str = "opentelemetry:resource_logs";

    fn envelope(batch: Vec<Self::Record>) -> Self::Request {
        ExportLogsServiceRequest {
            resource_logs: batch,
        }
    }

    /// Trace id of the first log record, in lowercase hex.
    fn identify(batch: &[Self::Record]) -> Option<String> {
        batch
            .iter()
            .flat_map(|rl| &rl.scope_logs)
            .flat_map(|sl| &sl.log_records)
            .next()
            .map(|record| hex::encode(&record.trace_id))
    }
}

/// Errors raised while decoding an event payload.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The event carried no payload field.
    #[error("event has no payload")]
    MissingPayload,

    /// The payload is not a valid message.
    #[error("malformed payload")]
    Malformed(#[from] prost::DecodeError),
}

/// Decodes an event payload into the record type of `S`.
///
/// An empty payload decodes to an empty record.
///
/// # Errors
///
/// Returns an error if the payload is absent or not a valid message.
pub fn decode<S: Signal>(payload: Option<&[u8]>) -> Result<S::Record, DecodeError> {
    let bytes = payload.ok_or(DecodeError::MissingPayload)?;
    Ok(S::Record::decode(bytes)?)
}
