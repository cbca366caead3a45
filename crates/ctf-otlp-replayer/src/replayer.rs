//! Trace replay driver.
//!
//! The [`Replayer`] walks recorded events in source order. Every event
//! whose name starts with `opentelemetry:` is counted as seen. Spans,
//! metrics and logs are decoded and exported one event at a time to the
//! matching exporter; every other telemetry event is only counted.
//!
//! Nothing that goes wrong with a single event stops the run: decode and
//! export failures are logged and counted in the [`RunSummary`].

use crate::exporter::{ExportResult, SignalExporter};
use crate::signal::{self, Logs, Metrics, Signal, Traces};
use crate::source::{SignalTag, SourceError, TraceEvent, TraceSource};

/// Counters accumulated over one replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Events read from the source, telemetry or not.
    pub events_read: u64,
    /// Events carrying any kind of telemetry.
    pub signal_events_seen: u64,
    /// Telemetry events delivered to the collector.
    pub signal_events_exported: u64,
    /// Telemetry events whose payload could not be decoded.
    pub decode_failures: u64,
    /// Decoded telemetry events the exporter failed to deliver.
    pub export_failures: u64,
    /// Errors reported by the trace source.
    pub source_errors: u64,
}

enum Outcome {
    Exported,
    DecodeFailed,
    ExportFailed,
}

/// Replays trace events into one exporter per signal.
#[derive(Debug)]
pub struct Replayer<TE, ME, LE> {
    spans: TE,
    metrics: ME,
    logs: LE,
    summary: RunSummary,
}

impl<TE, ME, LE> Replayer<TE, ME, LE>
where
    TE: SignalExporter<Traces>,
    ME: SignalExporter<Metrics>,
    LE: SignalExporter<Logs>,
{
    /// Creates a replayer over the three exporters.
    pub fn new(spans: TE, metrics: ME, logs: LE) -> Self {
        Self {
            spans,
            metrics,
            logs,
            summary: RunSummary::default(),
        }
    }

    /// Counters accumulated so far.
    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Opens a fresh pass over `source` and replays it.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass cannot be started. Errors while reading
    /// individual events are counted, not returned.
    pub async fn replay_source<S>(&mut self, source: &S) -> Result<RunSummary, SourceError>
    where
        S: TraceSource + ?Sized,
    {
        let events = source.open()?;
        Ok(self.replay(events).await)
    }

    /// Replays every event of `events`, in order.
    pub async fn replay<I>(&mut self, events: I) -> RunSummary
    where
        I: IntoIterator<Item = Result<TraceEvent, SourceError>>,
    {
        for event in events {
            match event {
                Ok(event) => self.process(&event).await,
                Err(e) => {
                    self.summary.source_errors += 1;
                    tracing::error!(error = %e, "Failed to read trace event");
                }
            }
        }

        self.summary
    }

    /// Classifies, decodes and exports one event.
    pub async fn process(&mut self, event: &TraceEvent) {
        self.summary.events_read += 1;

        let tag = event.tag();
        if !tag.is_telemetry() {
            return;
        }
        self.summary.signal_events_seen += 1;

        let outcome = match tag {
            SignalTag::ResourceSpans => forward::<Traces, _>(&mut self.spans, event).await,
            SignalTag::ResourceMetrics => forward::<Metrics, _>(&mut self.metrics, event).await,
            SignalTag::ResourceLogs => forward::<Logs, _>(&mut self.logs, event).await,
            SignalTag::OtherTelemetry | SignalTag::Foreign => {
                tracing::debug!(event = event.name(), "Skipping unsupported telemetry event");
                return;
            }
        };

        match outcome {
            Outcome::Exported => self.summary.signal_events_exported += 1,
            Outcome::DecodeFailed => self.summary.decode_failures += 1,
            Outcome::ExportFailed => self.summary.export_failures += 1,
        }
    }

    /// Shuts every exporter down and returns the final counters.
    pub fn shutdown(&mut self) -> RunSummary {
        self.spans.shutdown();
        self.metrics.shutdown();
        self.logs.shutdown();
        self.summary
    }
}

async fn forward<S, E>(exporter: &mut E, event: &TraceEvent) -> Outcome
where
    S: Signal,
    E: SignalExporter<S>,
{
    let record = match signal::decode::<S>(event.payload()) {
        Ok(record) => record,
        Err(e) => {
            tracing::error!(event = event.name(), error = %e, "Failed to decode telemetry payload");
            return Outcome::DecodeFailed;
        }
    };

    let batch = vec![record];
    let id = S::identify(&batch);

    match exporter.export(batch).await {
        ExportResult::Success => Outcome::Exported,
        ExportResult::Failure => {
            tracing::error!(signal = %S::KIND, id = id.as_deref(), "Failed to export telemetry");
            Outcome::ExportFailed
        }
    }
}
