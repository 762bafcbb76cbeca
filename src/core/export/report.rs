//! Per-combination outcomes and the final export report
//!
//! Worker jobs produce one [`CombinationOutcome`] each. Once the pool has
//! drained, [`ResultAggregator`] folds them into an [`ExportReport`].

use crate::domain::CombinationKey;
use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Terminal state of one combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Rows were fetched and a non-empty file was written
    Success,
    /// The query matched zero rows; not an error
    DataUnavailable,
    /// Query or write raised an error, or the written file was missing/empty
    Failed,
    /// Cancellation was observed at a checkpoint
    Cancelled,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Success => "success",
            OutcomeStatus::DataUnavailable => "data_unavailable",
            OutcomeStatus::Failed => "failed",
            OutcomeStatus::Cancelled => "cancelled",
        }
    }
}

/// Result of processing one combination
#[derive(Debug, Clone, Serialize)]
pub struct CombinationOutcome {
    /// Position in enumeration order
    pub index: usize,

    /// The combination processed
    pub key: CombinationKey,

    /// Human-readable label of the key
    pub label: String,

    /// Terminal state
    pub status: OutcomeStatus,

    /// Rows fetched (zero unless the query completed)
    pub record_count: usize,

    /// File written, when the export phase completed
    pub output_path: Option<PathBuf>,

    /// Time spent in this job after admission
    #[serde(serialize_with = "serialize_duration_ms", rename = "elapsed_ms")]
    pub elapsed: Duration,

    /// Error description for failed combinations
    pub error: Option<String>,
}

impl CombinationOutcome {
    fn base(index: usize, key: CombinationKey, status: OutcomeStatus, elapsed: Duration) -> Self {
        let label = key.label();
        Self {
            index,
            key,
            label,
            status,
            record_count: 0,
            output_path: None,
            elapsed,
            error: None,
        }
    }

    /// A combination whose file was written
    pub fn success(
        index: usize,
        key: CombinationKey,
        record_count: usize,
        output_path: PathBuf,
        elapsed: Duration,
    ) -> Self {
        let mut outcome = Self::base(index, key, OutcomeStatus::Success, elapsed);
        outcome.record_count = record_count;
        outcome.output_path = Some(output_path);
        outcome
    }

    /// A combination whose query matched no rows
    pub fn data_unavailable(index: usize, key: CombinationKey, elapsed: Duration) -> Self {
        Self::base(index, key, OutcomeStatus::DataUnavailable, elapsed)
    }

    /// A combination that failed
    pub fn failed(
        index: usize,
        key: CombinationKey,
        error: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        let mut outcome = Self::base(index, key, OutcomeStatus::Failed, elapsed);
        outcome.error = Some(error.into());
        outcome
    }

    /// A combination that observed cancellation
    pub fn cancelled(index: usize, key: CombinationKey, elapsed: Duration) -> Self {
        Self::base(index, key, OutcomeStatus::Cancelled, elapsed)
    }

    /// Keeps the fetched row count on a non-success outcome
    pub fn with_record_count(mut self, record_count: usize) -> Self {
        self.record_count = record_count;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    pub fn is_data_unavailable(&self) -> bool {
        self.status == OutcomeStatus::DataUnavailable
    }

    pub fn is_failed(&self) -> bool {
        self.status == OutcomeStatus::Failed
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == OutcomeStatus::Cancelled
    }
}

/// Final aggregate of a batch run
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    /// Combinations in the run
    pub total: usize,

    /// Combinations that wrote a file
    pub succeeded: usize,

    /// Combinations that failed
    pub failed: usize,

    /// Combinations with no matching data
    pub skipped: usize,

    /// Combinations that observed cancellation
    pub cancelled: usize,

    /// Rows written across successful combinations
    pub total_records: usize,

    /// Wall-clock duration of the run
    #[serde(serialize_with = "serialize_duration_ms", rename = "duration_ms")]
    pub duration: Duration,

    /// Directory the files were written to
    pub output_directory: PathBuf,

    /// Worker pool size used
    pub worker_count: usize,

    /// Whether cancellation was requested during the run
    pub interrupted: bool,

    /// Outcomes in enumeration order
    pub outcomes: Vec<CombinationOutcome>,
}

impl ExportReport {
    /// True when no combination failed
    pub fn overall_success(&self) -> bool {
        self.failed == 0
    }

    /// Percentage of combinations that wrote a file
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.succeeded as f64 / self.total as f64) * 100.0
    }

    /// Outcomes that failed, for retry
    pub fn failures(&self) -> impl Iterator<Item = &CombinationOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }

    /// Log the report
    pub fn log_summary(&self) {
        tracing::info!(
            total = self.total,
            succeeded = self.succeeded,
            failed = self.failed,
            skipped = self.skipped,
            cancelled = self.cancelled,
            total_records = self.total_records,
            worker_count = self.worker_count,
            duration_secs = self.duration.as_secs(),
            success_rate = format!("{:.2}%", self.success_rate()),
            output_directory = %self.output_directory.display(),
            "Export run completed"
        );

        for outcome in self.failures() {
            tracing::warn!(
                combination = %outcome.label,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "Combination failed"
            );
        }
    }
}

/// Folds outcomes into a report
///
/// Runs strictly after every job has joined; the order of the supplied
/// outcomes is irrelevant.
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    started_at: Instant,
    output_directory: PathBuf,
    worker_count: usize,
}

impl ResultAggregator {
    pub fn new(started_at: Instant, output_directory: &Path, worker_count: usize) -> Self {
        Self {
            started_at,
            output_directory: output_directory.to_path_buf(),
            worker_count,
        }
    }

    /// Builds the report; wall time is measured from `started_at` to now
    pub fn aggregate(
        &self,
        mut outcomes: Vec<CombinationOutcome>,
        interrupted: bool,
    ) -> ExportReport {
        outcomes.sort_by_key(|o| o.index);

        let mut report = ExportReport {
            total: outcomes.len(),
            succeeded: 0,
            failed: 0,
            skipped: 0,
            cancelled: 0,
            total_records: 0,
            duration: self.started_at.elapsed(),
            output_directory: self.output_directory.clone(),
            worker_count: self.worker_count,
            interrupted,
            outcomes: Vec::new(),
        };

        for outcome in &outcomes {
            match outcome.status {
                OutcomeStatus::Success => {
                    report.succeeded += 1;
                    report.total_records += outcome.record_count;
                }
                OutcomeStatus::DataUnavailable => report.skipped += 1,
                OutcomeStatus::Failed => report.failed += 1,
                OutcomeStatus::Cancelled => report.cancelled += 1,
            }
        }

        report.outcomes = outcomes;
        report
    }
}

fn serialize_duration_ms<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}
