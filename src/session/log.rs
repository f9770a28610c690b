//! Structured execution log — JSON lines per run.
//!
//! Every orchestration session writes a `.jsonl` log capturing phase
//! transitions, iterations, artifacts, checkpoints, and errors. Each line
//! is a self-contained JSON object with a timestamp, modeled directly on
//! `log::ExecutionLog` (`Mutex<BufWriter<File>>`, append +
//! flush per entry); the event enum is rebuilt for orchestration events
//! instead of PTY/tmux events.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::session::Phase;

/// A structured event in the session's execution log.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: LogEvent,
}

/// All orchestration event types that can appear in the execution log.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum LogEvent {
    SessionCreated { session_id: String, mission_id: String },
    PhaseTransition { from: Phase, to: Phase },
    IterationCompleted { iteration: u64, criterion_advanced: Option<String> },
    ArtifactRecorded { path: String, version: u32 },
    ManagerCallRetried { operation: String, attempt: u32, kind: String },
    ErrorRecorded { error_id: String, kind: String, message: String },
    RecoveryDecision { can_recover: bool, recovery_action: Option<String> },
    CheckpointWritten { path: String },
    RunCompleted { success: bool, iterations: u64 },
}

/// Writer for JSON-lines execution logs.
pub struct ExecutionLog {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl ExecutionLog {
    /// Create (or append to) the execution log at `path`.
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory: {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file: {}", path.display()))?;

        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    pub fn log(&self, event: LogEvent) -> Result<()> {
        let entry = LogEntry { timestamp: Utc::now(), event };
        let json = serde_json::to_string(&entry).context("failed to serialize log entry")?;
        debug!(event = %json, "execution log");

        let mut writer = self.writer.lock().unwrap();
        writeln!(writer, "{json}").context("failed to write log entry")?;
        writer.flush().context("failed to flush log")?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_entry_serializes_with_event_tag() {
        let entry = LogEntry {
            timestamp: Utc::now(),
            event: LogEvent::IterationCompleted { iteration: 1, criterion_advanced: Some("a".into()) },
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"event\":\"iteration_completed\""));
        assert!(json.contains("\"iteration\":1"));
    }

    #[test]
    fn log_writes_one_json_line_per_event() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("session.jsonl");
        let log = ExecutionLog::new(&path).unwrap();

        log.log(LogEvent::SessionCreated { session_id: "s1".into(), mission_id: "m1".into() }).unwrap();
        log.log(LogEvent::RunCompleted { success: true, iterations: 3 }).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in &lines {
            let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(parsed.get("timestamp").is_some());
        }
    }

    #[test]
    fn log_appends_to_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("session.jsonl");
        {
            let log = ExecutionLog::new(&path).unwrap();
            log.log(LogEvent::RunCompleted { success: false, iterations: 1 }).unwrap();
        }
        {
            let log = ExecutionLog::new(&path).unwrap();
            log.log(LogEvent::RunCompleted { success: true, iterations: 2 }).unwrap();
        }
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
