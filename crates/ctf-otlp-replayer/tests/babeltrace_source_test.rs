//! Integration tests for reading ust folders through a converter process.
//!
//! A shell script stands in for `babeltrace2`: it prints the `events.txt`
//! file found in the folder passed as its last argument.

#![cfg(unix)]

use ctf_otlp_replayer::{
    BabeltraceSource, SignalTag, SourceError, TraceSource, count_events, discover_ust_folders,
};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const FAKE_CONVERTER: &str = "#!/bin/sh\nfor last; do :; done\ncat \"$last/events.txt\"\n";
const FAILING_CONVERTER: &str = "#!/bin/sh\necho 'cannot open trace' >&2\nexit 3\n";

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn write_session(root: &Path, session: &str, lines: &[&str]) {
    let ust = root.join(session).join("ust");
    std::fs::create_dir_all(&ust).unwrap();
    std::fs::write(ust.join("events.txt"), lines.join("\n")).unwrap();
}

#[test]
fn test_reads_every_folder_in_order() {
    let tools = TempDir::new().unwrap();
    let traces = TempDir::new().unwrap();
    let converter = write_script(tools.path(), "babeltrace2", FAKE_CONVERTER);

    write_session(
        traces.path(),
        "a-session",
        &[
            "[00:00:01.000000000] host opentelemetry:resource_spans: { cpu_id = 0 }, { resource_spans = [ [0] = 10, [1] = 0 ] }",
            "[00:00:02.000000000] host lttng_ust_statedump:start: { cpu_id = 0 }, { }",
        ],
    );
    write_session(
        traces.path(),
        "b-session",
        &["[00:00:03.000000000] host opentelemetry:resource_logs: { cpu_id = 1 }, { resource_logs = [ ] }"],
    );

    let folders = discover_ust_folders(traces.path()).unwrap();
    assert_eq!(folders.len(), 2);

    let source = BabeltraceSource::new(&converter, folders);
    source.check_converter().unwrap();
    assert_eq!(count_events(&source).unwrap(), 3);

    let events: Vec<_> = source.open().unwrap().map(Result::unwrap).collect();
    let tags: Vec<_> = events.iter().map(|e| e.tag()).collect();
    assert_eq!(
        tags,
        vec![
            SignalTag::ResourceSpans,
            SignalTag::Foreign,
            SignalTag::ResourceLogs
        ]
    );
    assert_eq!(events[0].payload(), Some(&[10u8, 0][..]));
    assert_eq!(events[2].payload(), Some(&[][..]));
}

#[test]
fn test_failing_converter_reports_exit_status() {
    let tools = TempDir::new().unwrap();
    let traces = TempDir::new().unwrap();
    let converter = write_script(tools.path(), "babeltrace2", FAILING_CONVERTER);
    write_session(traces.path(), "session", &[]);

    let folders = discover_ust_folders(traces.path()).unwrap();
    let mut events = BabeltraceSource::new(&converter, folders).open().unwrap();

    match events.next() {
        Some(Err(SourceError::Exit { status, .. })) => assert_eq!(status.code(), Some(3)),
        other => panic!("expected converter exit error, got {other:?}"),
    }
    assert!(events.next().is_none());
}
