//! Recorded trace events and the sources that produce them.
//!
//! A [`TraceSource`] yields a lazy, forward-only stream of [`TraceEvent`]s.
//! Each call to [`TraceSource::open`] starts a fresh pass, which is how the
//! event count is obtained before the replay pass.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Provider prefix shared by all telemetry tracepoints.
pub const TELEMETRY_PREFIX: &str = "opentelemetry:";

/// Directory name under which LTTng stores user-space traces.
const UST_FOLDER: &str = "ust";

/// Classification of a trace event by its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalTag {
    /// `opentelemetry:resource_spans`.
    ResourceSpans,
    /// `opentelemetry:resource_metrics`.
    ResourceMetrics,
    /// `opentelemetry:resource_logs`.
    ResourceLogs,
    /// Another `opentelemetry:` event this replayer does not decode.
    OtherTelemetry,
    /// Not a telemetry event.
    Foreign,
}

impl SignalTag {
    /// Classifies an event name.
    pub fn classify(name: &str) -> Self {
        match name.strip_prefix(TELEMETRY_PREFIX) {
            Some("resource_spans") => SignalTag::ResourceSpans,
            Some("resource_metrics") => SignalTag::ResourceMetrics,
            Some("resource_logs") => SignalTag::ResourceLogs,
            Some(_) => SignalTag::OtherTelemetry,
            None => SignalTag::Foreign,
        }
    }

    /// Returns true for every `opentelemetry:` event, recognised or not.
    pub fn is_telemetry(self) -> bool {
        !matches!(self, SignalTag::Foreign)
    }
}

/// One event read from a recorded trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    name: String,
    payload: Option<Vec<u8>>,
}

impl TraceEvent {
    /// Creates an event.
    pub fn new(name: impl Into<String>, payload: Option<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// Full event name, e.g. `opentelemetry:resource_spans`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw serialized payload, if the event carried one.
    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Signal classification of this event.
    pub fn tag(&self) -> SignalTag {
        SignalTag::classify(&self.name)
    }
}

/// Errors raised while locating or reading recorded traces.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The trace folder does not exist.
    #[error("trace folder not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The trace path is not a directory.
    #[error("trace path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Walking the trace folder failed.
    #[error("failed to walk trace folder")]
    Walk(#[from] walkdir::Error),

    /// The trace converter could not be started.
    #[error("failed to run {}", binary.display())]
    Spawn {
        /// Converter binary.
        binary: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Reading converter output failed.
    #[error("failed to read events of {}", folder.display())]
    Io {
        /// Trace folder being read.
        folder: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The trace converter exited unsuccessfully.
    #[error("trace converter failed on {} with {status}", folder.display())]
    Exit {
        /// Trace folder being read.
        folder: PathBuf,
        /// Exit status of the converter.
        status: std::process::ExitStatus,
    },
}

/// A restartable producer of recorded trace events.
pub trait TraceSource {
    /// Iterator over one pass of events.
    type Events: Iterator<Item = Result<TraceEvent, SourceError>>;

    /// Starts a new pass over the recorded events.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass cannot be started.
    fn open(&self) -> Result<Self::Events, SourceError>;
}

/// Events held in memory, mostly useful for tests and tooling.
impl TraceSource for Vec<TraceEvent> {
    type Events = std::vec::IntoIter<Result<TraceEvent, SourceError>>;

    fn open(&self) -> Result<Self::Events, SourceError> {
        let events: Vec<_> = self.iter().cloned().map(Ok).collect();
        Ok(events.into_iter())
    }
}

/// Counts the events of a source with a full separate pass.
///
/// Read errors are counted as events; they are reported during replay.
///
/// # Errors
///
/// Returns an error if the pass cannot be started.
pub fn count_events<S: TraceSource + ?Sized>(source: &S) -> Result<u64, SourceError> {
    Ok(source.open()?.count() as u64)
}

/// Finds every directory named `ust` below `root`, sorted by path.
///
/// # Errors
///
/// Returns an error if `root` is missing, is not a directory, or cannot be walked.
pub fn discover_ust_folders(root: &Path) -> Result<Vec<PathBuf>, SourceError> {
    if !root.exists() {
        return Err(SourceError::NotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(SourceError::NotADirectory(root.to_path_buf()));
    }

    let mut folders = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).follow_links(true) {
        let entry = entry?;
        if entry.file_type().is_dir() && entry.file_name() == UST_FOLDER {
            folders.push(entry.into_path());
        }
    }

    folders.sort();
    Ok(folders)
}
