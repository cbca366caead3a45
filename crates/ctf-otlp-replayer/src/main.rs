//! CTF to OTLP replayer binary.
//!
//! Finds every `ust` folder below the given trace directory, reads the
//! recorded `opentelemetry:*` events through `babeltrace2` and exports
//! them to an OTLP/gRPC collector.
//!
//! # Configuration
//!
//! Exporter settings are taken from (later sources override earlier):
//! 1. `OTEL_EXPORTER_OTLP_*` environment variables, shadowed by the
//!    `OTEL_EXPORTER_OTLP_{TRACES,METRICS,LOGS}_*` ones
//! 2. An optional TOML file given with `--config`
//! 3. `--otel-exporter-otlp-endpoint`, which sends every signal to one
//!    plaintext endpoint
//!
//! Per-event failures are logged and do not change the exit status.

use anyhow::{Context, Result};
use clap::Parser;
use ctf_otlp_replayer::{
    BabeltraceSource, DEFAULT_BABELTRACE2, LogExporter, MetricExporter, Replayer, SpanExporter,
    count_events, discover_ust_folders,
};
use otlp_exporter_config::{EnvSnapshot, ReplaySettings};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Replay OpenTelemetry data recorded in CTF traces to an OTLP collector.
#[derive(Debug, Parser)]
#[command(name = "ctf-otlp-replayer", version)]
struct Cli {
    /// Folder containing the CTF traces.
    #[arg(short = 'i', long = "ctf-traces-folder-path", value_name = "DIR")]
    traces: PathBuf,

    /// OTLP/gRPC collector endpoint for every signal. Implies a plaintext channel.
    #[arg(short = 'e', long = "otel-exporter-otlp-endpoint", value_name = "URL")]
    endpoint: Option<String>,

    /// TOML file with per-signal exporter settings.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Path to the babeltrace2 converter.
    #[arg(long, value_name = "BIN", default_value = DEFAULT_BABELTRACE2)]
    babeltrace2: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing().context("failed to initialise tracing subscriber")?;

    let folders = discover_ust_folders(&cli.traces).with_context(|| {
        format!(
            "the path of the CTF traces must be an existing directory: {}",
            cli.traces.display()
        )
    })?;

    let env = EnvSnapshot::capture();
    let settings = ReplaySettings::load(cli.config.as_deref(), cli.endpoint.as_deref())
        .context("failed to load exporter settings")?;
    tracing::debug!(?settings, variables = env.len(), "Configuration loaded");

    let mut replayer = Replayer::new(
        SpanExporter::from_settings(&settings.traces, &env)
            .context("failed to create span exporter")?,
        MetricExporter::from_settings(&settings.metrics, &env)
            .context("failed to create metric exporter")?,
        LogExporter::from_settings(&settings.logs, &env)
            .context("failed to create log exporter")?,
    );

    for folder in &folders {
        tracing::info!(folder = %folder.display(), "Found trace folder");
    }

    let source = BabeltraceSource::new(cli.babeltrace2, folders);
    source
        .check_converter()
        .context("cannot run the trace converter")?;
    let events = count_events(&source).context("failed to count trace events")?;
    tracing::info!(
        folders = source.folders().len(),
        events,
        "Replaying recorded telemetry"
    );

    replayer
        .replay_source(&source)
        .await
        .context("failed to read trace events")?;
    let summary = replayer.shutdown();

    tracing::info!(
        exported = summary.signal_events_exported,
        seen = summary.signal_events_seen,
        decode_failures = summary.decode_failures,
        export_failures = summary.export_failures,
        source_errors = summary.source_errors,
        "Exporting done"
    );
    println!(
        "Exporting done. {}/{} telemetry data exported.",
        summary.signal_events_exported, summary.signal_events_seen
    );

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ctf_otlp_replayer=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).without_time())
        .with(filter)
        .try_init()
        .context("failed to initialise tracing registry")?;

    Ok(())
}
