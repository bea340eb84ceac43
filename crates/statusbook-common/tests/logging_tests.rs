//! File logging integration test
//!
//! Runs in its own test binary because it installs the global subscriber.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use statusbook_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use tracing::info;

#[test]
fn test_file_logs_are_flushed_when_guard_drops() {
    let dir = tempfile::tempdir().unwrap();
    let config = LogConfig::builder()
        .level(LogLevel::Info)
        .output(LogOutput::File)
        .log_dir(dir.path())
        .log_file_prefix("statusbook-test")
        .build();

    let guard = init_logging(&config).unwrap();
    info!(batches_failed = 1, "Last line before exit");
    drop(guard);

    let contents: String = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| std::fs::read_to_string(entry.unwrap().path()).unwrap())
        .collect();
    assert!(contents.contains("Last line before exit"));
    assert!(contents.contains("batches_failed=1"));
}
