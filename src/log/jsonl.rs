//! JSONL (JSON Lines) journal of committed selections
//!
//! Provides append-only logging of committed selections to
//! `.carousel/log.jsonl`. Only selections that survived a session's exit
//! action are journaled; candidates visited while cycling never appear.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};

/// One committed selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectionRecord {
    /// ISO 8601 timestamp of when the selection was committed.
    pub timestamp: DateTime<Utc>,
    /// The command that produced the selection.
    pub command: String,
    /// Display name of the selected resource.
    pub target: String,
    /// Resource kind: "document" or "console".
    pub kind: String,
    /// Whether a cycling session preceded the commit.
    pub cycled: bool,
    /// Net ring movement over the session (zero without cycling).
    pub net_moves: i64,
    /// Repeat accumulator at invocation time (1 for a plain invocation).
    #[serde(default = "default_escalation")]
    pub escalation: u32,
}

const fn default_escalation() -> u32 {
    1
}

/// JSONL journal writer/reader.
///
/// Each line is a JSON object representing a single committed selection.
pub struct SelectionLogger {
    log_path: PathBuf,
}

impl SelectionLogger {
    /// Create a journal under `log_dir` (typically `.carousel`).
    ///
    /// # Errors
    /// Returns an error if the log directory cannot be created.
    pub fn new<P: AsRef<Path>>(log_dir: P) -> Result<Self> {
        let log_dir = log_dir.as_ref();

        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

        Ok(Self {
            log_path: log_dir.join("log.jsonl"),
        })
    }

    /// Append a record to the journal.
    ///
    /// # Errors
    /// Returns an error if the log file cannot be opened, the record cannot
    /// be serialized, or the write fails.
    pub fn append(&self, record: &SelectionRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("Failed to open log file: {}", self.log_path.display()))?;

        let json =
            serde_json::to_string(record).context("Failed to serialize selection record")?;
        writeln!(file, "{json}").context("Failed to write to log file")?;

        Ok(())
    }

    /// Read all records, in chronological order.
    ///
    /// A missing journal reads as empty.
    pub fn read_all(&self) -> Result<Vec<SelectionRecord>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.log_path)
            .with_context(|| format!("Failed to read log file: {}", self.log_path.display()))?;

        let mut records = Vec::new();
        for (line_num, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: SelectionRecord = serde_json::from_str(line)
                .with_context(|| format!("Failed to parse line {} as JSON", line_num + 1))?;
            records.push(record);
        }

        Ok(records)
    }
}
