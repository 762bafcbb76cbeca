//! Per-combination run log
//!
//! Appends one line per finished combination to a log file in the output
//! directory, either as JSON lines or as plain text. Lines are handed to a
//! `tracing_appender` non-blocking writer, so workers never touch the file
//! themselves; [`RunLogger::close`] flushes whatever is still queued.

use crate::core::export::report::{CombinationOutcome, ExportReport};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};

/// Run log line
#[derive(Debug, Serialize)]
struct RunLogEntry<'a> {
    timestamp: String,
    run_id: &'a str,
    index: usize,
    combination: &'a str,
    status: &'static str,
    record_count: usize,
    file: Option<String>,
    elapsed_ms: u64,
    error: Option<&'a str>,
}

/// Run summary line
#[derive(Debug, Serialize)]
struct RunSummaryEntry<'a> {
    timestamp: String,
    run_id: &'a str,
    total: usize,
    succeeded: usize,
    failed: usize,
    skipped: usize,
    cancelled: usize,
    total_records: usize,
    duration_ms: u64,
    interrupted: bool,
}

/// Appends combination outcomes to the run log
#[derive(Debug)]
pub struct RunLogger {
    log_path: PathBuf,
    json_format: bool,
    run_id: String,
    writer: NonBlocking,
    guard: Mutex<Option<WorkerGuard>>,
    closed: AtomicBool,
}

impl RunLogger {
    /// Create a run logger writing to `log_path`
    pub fn new(log_path: PathBuf, json_format: bool, run_id: impl Into<String>) -> Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create run log directory: {}", parent.display())
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open run log: {}", log_path.display()))?;

        // Blocks on a full queue instead of dropping entries
        let (writer, guard) = NonBlockingBuilder::default()
            .lossy(false)
            .thread_name("tradex-run-log")
            .finish(file);

        Ok(Self {
            log_path,
            json_format,
            run_id: run_id.into(),
            writer,
            guard: Mutex::new(Some(guard)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Record one finished combination
    pub fn log_outcome(&self, outcome: &CombinationOutcome) -> Result<()> {
        let entry = RunLogEntry {
            timestamp: Utc::now().to_rfc3339(),
            run_id: &self.run_id,
            index: outcome.index,
            combination: &outcome.label,
            status: outcome.status.as_str(),
            record_count: outcome.record_count,
            file: outcome
                .output_path
                .as_ref()
                .map(|p| p.display().to_string()),
            elapsed_ms: outcome.elapsed.as_millis() as u64,
            error: outcome.error.as_deref(),
        };

        let line = if self.json_format {
            serde_json::to_string(&entry).context("Failed to serialize run log entry")?
        } else {
            let mut line = format!(
                "[{}] #{} {} | {} | records: {} | {}ms",
                entry.timestamp,
                entry.index,
                entry.combination,
                entry.status,
                entry.record_count,
                entry.elapsed_ms
            );
            if let Some(file) = &entry.file {
                line.push_str(&format!(" | file: {file}"));
            }
            if let Some(error) = entry.error {
                line.push_str(&format!(" | error: {error}"));
            }
            line
        };

        self.append(&line)
    }

    /// Record the closing summary of a run
    pub fn log_summary(&self, report: &ExportReport) -> Result<()> {
        let entry = RunSummaryEntry {
            timestamp: Utc::now().to_rfc3339(),
            run_id: &self.run_id,
            total: report.total,
            succeeded: report.succeeded,
            failed: report.failed,
            skipped: report.skipped,
            cancelled: report.cancelled,
            total_records: report.total_records,
            duration_ms: report.duration.as_millis() as u64,
            interrupted: report.interrupted,
        };

        let line = if self.json_format {
            serde_json::to_string(&entry).context("Failed to serialize run summary")?
        } else {
            format!(
                "[{}] Run {} finished | total: {} | succeeded: {} | failed: {} | no data: {} | cancelled: {} | records: {} | {}ms",
                entry.timestamp,
                entry.run_id,
                entry.total,
                entry.succeeded,
                entry.failed,
                entry.skipped,
                entry.cancelled,
                entry.total_records,
                entry.duration_ms
            )
        };

        self.append(&line)
    }

    /// Flushes queued lines and stops the writer thread
    ///
    /// Blocks until the queue is drained. Lines appended afterwards are
    /// rejected with an error.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let guard = self
            .guard
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        drop(guard);
    }

    fn append(&self, line: &str) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            anyhow::bail!("Run log {} is closed", self.log_path.display());
        }
        let mut writer = self.writer.clone();
        writer
            .write_all(format!("{line}\n").as_bytes())
            .with_context(|| format!("Failed to queue run log entry: {}", self.log_path.display()))
    }
}
