//! Trace source backed by the `babeltrace2` converter.
//!
//! Each ust folder is converted with `babeltrace2 --no-delta <folder>` and
//! the pretty-printed text is parsed line by line. A telemetry event looks
//! like:
//!
//! ```text
//! [10:14:03.216584151] host opentelemetry:resource_spans: { cpu_id = 2 }, { _resource_spans_length = 3, resource_spans = [ [0] = 10, [1] = 1, [2] = 0 ] }
//! ```
//!
//! The event name is the last token before the first `: {`. The payload is
//! the integer array whose field name is the part of the event name after
//! the provider, so `resource_spans` above.

use crate::source::{SourceError, TraceEvent, TraceSource};
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

/// Default converter binary, looked up on `PATH`.
pub const DEFAULT_BABELTRACE2: &str = "babeltrace2";

/// Reads events from ust folders through the `babeltrace2` converter.
#[derive(Debug, Clone)]
pub struct BabeltraceSource {
    binary: PathBuf,
    folders: Vec<PathBuf>,
}

impl BabeltraceSource {
    /// Creates a source over `folders`, converted by `binary`.
    pub fn new(binary: impl Into<PathBuf>, folders: Vec<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            folders,
        }
    }

    /// Folders read by this source, in replay order.
    pub fn folders(&self) -> &[PathBuf] {
        &self.folders
    }

    /// Checks that the converter can be started, by running it with
    /// `--version`. Its exit status is not inspected.
    ///
    /// Does nothing when there are no folders to read.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Spawn`] if the converter cannot be executed.
    pub fn check_converter(&self) -> Result<(), SourceError> {
        if self.folders.is_empty() {
            return Ok(());
        }

        Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| SourceError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        Ok(())
    }
}

impl TraceSource for BabeltraceSource {
    type Events = BabeltraceEvents;

    fn open(&self) -> Result<Self::Events, SourceError> {
        Ok(BabeltraceEvents {
            binary: self.binary.clone(),
            pending: self.folders.clone().into_iter(),
            current: None,
        })
    }
}

/// One pass over the events of a [`BabeltraceSource`].
///
/// Folders are converted one after the other; a converter process is only
/// started once the previous folder is exhausted.
pub struct BabeltraceEvents {
    binary: PathBuf,
    pending: std::vec::IntoIter<PathBuf>,
    current: Option<Conversion>,
}

struct Conversion {
    folder: PathBuf,
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
}

impl Conversion {
    fn start(binary: &Path, folder: PathBuf) -> Result<Self, SourceError> {
        let mut child = Command::new(binary)
            .arg("--no-delta")
            .arg(&folder)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| SourceError::Spawn {
                binary: binary.to_path_buf(),
                source,
            })?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SourceError::Io {
                folder,
                source: std::io::Error::other("converter stdout was not captured"),
            });
        };

        tracing::debug!(folder = %folder.display(), "Converting trace folder");

        Ok(Self {
            folder,
            child,
            lines: BufReader::new(stdout).lines(),
        })
    }

    fn finish(mut self) -> Result<(), SourceError> {
        let status = self.child.wait().map_err(|source| SourceError::Io {
            folder: self.folder.clone(),
            source,
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(SourceError::Exit {
                folder: self.folder.clone(),
                status,
            })
        }
    }
}

impl Drop for Conversion {
    fn drop(&mut self) {
        // No-op when the child already exited and was waited for.
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

impl Iterator for BabeltraceEvents {
    type Item = Result<TraceEvent, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                let folder = self.pending.next()?;
                match Conversion::start(&self.binary, folder) {
                    Ok(conversion) => self.current = Some(conversion),
                    Err(e) => return Some(Err(e)),
                }
            }
            let conversion = self.current.as_mut()?;

            match conversion.lines.next() {
                Some(Ok(line)) => {
                    if let Some(event) = parse_event_line(&line) {
                        return Some(Ok(event));
                    }
                }
                Some(Err(source)) => {
                    let folder = conversion.folder.clone();
                    self.current = None;
                    return Some(Err(SourceError::Io { folder, source }));
                }
                None => {
                    let finished = self.current.take()?;
                    if let Err(e) = finished.finish() {
                        return Some(Err(e));
                    }
                }
            }
        }
    }
}

/// Parses one line of `babeltrace2` pretty text output.
///
/// Returns `None` for lines that do not describe an event. The payload is
/// absent when the event has no byte array named after it.
pub fn parse_event_line(line: &str) -> Option<TraceEvent> {
    let line = line.trim_end();
    let (head, fields) = match line.find(": {") {
        Some(idx) => (&line[..idx], Some(&line[idx + 2..])),
        None => (line.strip_suffix(':')?, None),
    };

    let name = head.split_whitespace().last()?;
    if !name.contains(':') {
        return None;
    }

    let payload = match (fields, payload_field(name)) {
        (Some(fields), Some(field)) => find_byte_array(fields, field),
        _ => None,
    };

    Some(TraceEvent::new(name, payload))
}

fn payload_field(name: &str) -> Option<&str> {
    name.split_once(':')
        .map(|(_, field)| field)
        .filter(|f| !f.is_empty())
}

/// Locates `<field> = [ ... ]` in the field section and decodes its items.
fn find_byte_array(fields: &str, field: &str) -> Option<Vec<u8>> {
    let pattern = format!("{field} = [");
    let mut search = fields;

    while let Some(idx) = search.find(&pattern) {
        let preceded_by_separator = search[..idx]
            .chars()
            .next_back()
            .is_none_or(|c| c == ' ' || c == '{' || c == ',');
        let rest = &search[idx + pattern.len()..];
        if preceded_by_separator {
            return parse_byte_items(rest);
        }
        search = rest;
    }

    None
}

/// Parses `[0] = 10, [1] = 0x2a ]` up to and including the closing bracket.
fn parse_byte_items(mut rest: &str) -> Option<Vec<u8>> {
    let mut bytes = Vec::new();

    loop {
        rest = rest.trim_start_matches(|c: char| c == ',' || c.is_whitespace());

        if rest.starts_with(']') {
            return Some(bytes);
        }

        let (_, after_index) = rest.strip_prefix('[')?.split_once(']')?;
        let value = after_index.trim_start().strip_prefix('=')?.trim_start();
        let end = value
            .find(|c: char| c == ',' || c == ']' || c.is_whitespace())
            .unwrap_or(value.len());

        bytes.push(parse_byte(&value[..end])?);
        rest = &value[end..];
    }
}

fn parse_byte(token: &str) -> Option<u8> {
    if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        return u8::from_str_radix(hex, 16).ok();
    }

    // Signed byte arrays print negative values.
    let value: i16 = token.parse().ok()?;
    (-128..=255).contains(&value).then_some(value as u8)
}
