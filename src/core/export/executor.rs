//! Batch executor
//!
//! Drives the combinations of a request through a bounded worker pool. Keys
//! are dispatched in enumeration order; a key is admitted only once a
//! semaphore permit is free, so at most `worker_count` pipelines query or
//! write at the same time. Each admitted job runs
//!
//! ```text
//! refresh -> fetch -> (no rows: DataUnavailable) -> write -> verify file -> Success
//! ```
//!
//! and turns every error into a `Failed` outcome for its own key. The
//! cancellation signal is checked before admission and before each phase;
//! a job never aborts mid-call. The optional time limit bounds refresh and
//! fetch only: once a write has started it runs to completion while the job
//! still holds its permit. `run_batch` returns only after every dispatched
//! job has finished.
//!
//! File names are reserved in enumeration order, so two keys whose values
//! sanitize to the same stem never share a destination.

use crate::adapters::database::TradeDataSource;
use crate::adapters::spreadsheet::SpreadsheetWriter;
use crate::core::export::expander::ParameterExpander;
use crate::core::export::planner::{self, ConcurrencyPolicy};
use crate::core::export::progress::{JobPhase, ProgressSink, ProgressTracker};
use crate::core::export::report::{CombinationOutcome, ExportReport, ResultAggregator};
use crate::core::export::run_log::RunLogger;
use crate::domain::{CombinationKey, FilterListRequest, QueryFilter, Result, Row, TradexError};
use futures::FutureExt;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::{Id, JoinError, JoinSet};

/// Tuning knobs for [`BatchExecutor`]
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Tiered pool sizing
    pub policy: ConcurrencyPolicy,
    /// Optional cap on the pool size
    pub worker_override: Option<usize>,
    /// Time limit on the query phase of each combination; `None` waits
    /// indefinitely
    pub combination_timeout: Option<Duration>,
    /// Host parallelism fed to the planner
    pub available_parallelism: usize,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            policy: ConcurrencyPolicy::default(),
            worker_override: None,
            combination_timeout: None,
            available_parallelism: planner::available_parallelism(),
        }
    }
}

impl ExecutorSettings {
    /// Worker count for a run of `total` combinations
    pub fn plan_workers(&self, total: usize) -> usize {
        self.policy
            .plan(total, self.available_parallelism, self.worker_override)
    }
}

/// Counts of admission permits taken and given back
///
/// Balanced whenever no job is in flight.
#[derive(Debug, Default)]
pub struct PermitLedger {
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl PermitLedger {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Permits currently held
    pub fn outstanding(&self) -> usize {
        self.acquired().saturating_sub(self.released())
    }

    pub fn is_balanced(&self) -> bool {
        self.acquired() == self.released()
    }
}

/// A held pool slot; dropping it returns the permit and records the release
struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
    ledger: Arc<PermitLedger>,
    tracker: Arc<ProgressTracker>,
}

impl AdmissionPermit {
    fn new(
        permit: OwnedSemaphorePermit,
        ledger: Arc<PermitLedger>,
        tracker: Arc<ProgressTracker>,
    ) -> Self {
        ledger.acquired.fetch_add(1, Ordering::SeqCst);
        Self {
            _permit: permit,
            ledger,
            tracker,
        }
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.ledger.released.fetch_add(1, Ordering::SeqCst);
        self.tracker.release();
    }
}

/// Output file names handed out during one run
///
/// The first key to produce a name keeps it; a later key with the same name
/// gets `_<index>` appended to its stem. Names are compared ignoring ASCII
/// case.
#[derive(Debug, Default)]
struct DestinationNames {
    taken: HashSet<String>,
}

impl DestinationNames {
    fn assign(&mut self, index: usize, key: &CombinationKey, extension: &str) -> String {
        let name = key.file_name(extension);
        if self.taken.insert(name.to_ascii_lowercase()) {
            return name;
        }

        let extension = extension.trim_start_matches('.');
        let unique = if extension.is_empty() {
            format!("{}_{index}", key.file_stem())
        } else {
            format!("{}_{index}.{extension}", key.file_stem())
        };
        tracing::warn!(
            combination = %key.label(),
            file = %name,
            renamed = %unique,
            "File name already used by an earlier combination"
        );
        self.taken.insert(unique.to_ascii_lowercase());
        unique
    }
}

/// Why the query phase produced no rows
enum QueryHalt {
    Cancelled,
    Failed(String),
}

/// Shared, read-only state of one run, handed to every job
struct JobContext {
    data_source: Arc<dyn TradeDataSource>,
    writer: Arc<dyn SpreadsheetWriter>,
    run_log: Option<Arc<RunLogger>>,
    output_dir: PathBuf,
    tracker: Arc<ProgressTracker>,
    sink: Option<Arc<dyn ProgressSink>>,
    cancel: watch::Receiver<bool>,
    combination_timeout: Option<Duration>,
}

impl JobContext {
    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Records a phase change and hands the snapshot to the caller's sink
    ///
    /// A panicking sink loses that snapshot; the job carries on.
    fn emit(&self, label: &str, phase: JobPhase) {
        let snapshot = self.tracker.record(label, phase);
        if let Some(sink) = &self.sink {
            let delivered =
                std::panic::catch_unwind(AssertUnwindSafe(|| sink.on_progress(snapshot)));
            if let Err(panic) = delivered {
                tracing::warn!(
                    combination = %label,
                    panic = %panic_message(panic.as_ref()),
                    "Progress sink panicked; snapshot dropped"
                );
            }
        }
    }

    /// Records a terminal outcome in the tracker, the log and the run log
    fn finish(&self, outcome: &CombinationOutcome) {
        self.emit(&outcome.label, JobPhase::Completed(outcome.status));

        crate::log_combination_complete!(
            outcome.label,
            outcome.status.as_str(),
            outcome.record_count,
            outcome.elapsed
        );
        if let Some(error) = &outcome.error {
            tracing::warn!(combination = %outcome.label, error = %error, "Combination failed");
        }

        if let Some(run_log) = &self.run_log {
            if let Err(e) = run_log.log_outcome(outcome) {
                tracing::warn!(error = %e, path = %run_log.path().display(), "Failed to write run log entry");
            }
        }
    }

    /// Runs one admitted combination; never fails
    async fn run_job(
        self: Arc<Self>,
        index: usize,
        key: CombinationKey,
        file_name: String,
        admission: AdmissionPermit,
    ) -> CombinationOutcome {
        let started = Instant::now();
        crate::log_combination_start!(index, key.label());
        self.emit(&key.label(), JobPhase::Admitted);

        let outcome = AssertUnwindSafe(self.pipeline(index, key.clone(), file_name, started))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                CombinationOutcome::failed(
                    index,
                    key,
                    format!("Pipeline panicked: {}", panic_message(panic.as_ref())),
                    started.elapsed(),
                )
            });

        drop(admission);
        self.finish(&outcome);
        outcome
    }

    async fn pipeline(
        &self,
        index: usize,
        key: CombinationKey,
        file_name: String,
        started: Instant,
    ) -> CombinationOutcome {
        let label = key.label();

        if self.is_cancelled() {
            return CombinationOutcome::cancelled(index, key, started.elapsed());
        }
        self.emit(&label, JobPhase::RunningQuery);

        let rows = match self.query(&key.to_query_filter()).await {
            Ok(rows) => rows,
            Err(QueryHalt::Cancelled) => {
                return CombinationOutcome::cancelled(index, key, started.elapsed())
            }
            Err(QueryHalt::Failed(reason)) => {
                return CombinationOutcome::failed(index, key, reason, started.elapsed())
            }
        };

        if rows.is_empty() {
            return CombinationOutcome::data_unavailable(index, key, started.elapsed());
        }
        let record_count = rows.len();

        if self.is_cancelled() {
            return CombinationOutcome::cancelled(index, key, started.elapsed())
                .with_record_count(record_count);
        }
        self.emit(&label, JobPhase::RunningExport);

        let destination = self.output_dir.join(file_name);
        let written = match self.writer.write(rows, &destination).await {
            Ok(path) => path,
            Err(e) => {
                return CombinationOutcome::failed(index, key, e.to_string(), started.elapsed())
                    .with_record_count(record_count)
            }
        };

        match verify_output(&written).await {
            Ok(()) => {
                CombinationOutcome::success(index, key, record_count, written, started.elapsed())
            }
            Err(reason) => CombinationOutcome::failed(index, key, reason, started.elapsed())
                .with_record_count(record_count),
        }
    }

    /// Refresh then fetch, bounded by the combination time limit
    async fn query(&self, filter: &QueryFilter) -> std::result::Result<Vec<Row>, QueryHalt> {
        match self.combination_timeout {
            Some(limit) => tokio::time::timeout(limit, self.refresh_and_fetch(filter))
                .await
                .unwrap_or_else(|_| {
                    Err(QueryHalt::Failed(format!(
                        "Timed out after {}s",
                        limit.as_secs_f64()
                    )))
                }),
            None => self.refresh_and_fetch(filter).await,
        }
    }

    async fn refresh_and_fetch(
        &self,
        filter: &QueryFilter,
    ) -> std::result::Result<Vec<Row>, QueryHalt> {
        self.data_source
            .trigger_refresh(filter)
            .await
            .map_err(|e| QueryHalt::Failed(e.to_string()))?;

        if self.is_cancelled() {
            return Err(QueryHalt::Cancelled);
        }

        self.data_source
            .fetch_rows(filter)
            .await
            .map_err(|e| QueryHalt::Failed(e.to_string()))
    }
}

/// The written file must exist and be non-empty
async fn verify_output(path: &Path) -> std::result::Result<(), String> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if !meta.is_file() => Err(format!("Output {} is not a file", path.display())),
        Ok(meta) if meta.len() == 0 => Err(format!("Output file {} is empty", path.display())),
        Ok(_) => Ok(()),
        Err(e) => Err(format!(
            "Output file {} was not created: {e}",
            path.display()
        )),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Resolves once cancellation is requested; never resolves if the sender
/// is gone without having requested it
async fn cancellation_requested(mut cancel: watch::Receiver<bool>) {
    if cancel.wait_for(|requested| *requested).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Combinations whose jobs are still in the join set, by task id
type RunningJobs = HashMap<Id, (usize, CombinationKey)>;

/// Outcome of a joined job
///
/// A job that died outside its pipeline guard still yields a `Failed`
/// outcome for its own key; the rest of the batch is unaffected.
fn settle(
    running: &mut RunningJobs,
    joined: std::result::Result<(Id, CombinationOutcome), JoinError>,
) -> Result<CombinationOutcome> {
    match joined {
        Ok((id, outcome)) => {
            running.remove(&id);
            Ok(outcome)
        }
        Err(e) => {
            let (index, key) = running.remove(&e.id()).ok_or_else(|| {
                TradexError::Export(format!("Unknown combination job ended: {e}"))
            })?;
            tracing::error!(combination = %key.label(), error = %e, "Combination job aborted");
            Ok(CombinationOutcome::failed(
                index,
                key,
                format!("Combination job aborted: {e}"),
                Duration::ZERO,
            ))
        }
    }
}

/// Bounded-concurrency scheduler over the combinations of a request
///
/// Collaborators are injected; the executor holds no global state.
pub struct BatchExecutor {
    data_source: Arc<dyn TradeDataSource>,
    writer: Arc<dyn SpreadsheetWriter>,
    run_log: Option<Arc<RunLogger>>,
    settings: ExecutorSettings,
    ledger: Arc<PermitLedger>,
}

impl BatchExecutor {
    pub fn new(
        data_source: Arc<dyn TradeDataSource>,
        writer: Arc<dyn SpreadsheetWriter>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            data_source,
            writer,
            run_log: None,
            settings,
            ledger: Arc::new(PermitLedger::default()),
        }
    }

    /// Attach a run log that receives every terminal outcome
    ///
    /// The log is closed at the end of the next run.
    pub fn with_run_log(mut self, run_log: Arc<RunLogger>) -> Self {
        self.run_log = Some(run_log);
        self
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Permit bookkeeping across every run of this executor
    pub fn permit_ledger(&self) -> Arc<PermitLedger> {
        self.ledger.clone()
    }

    /// Runs every combination of `request`, writing files under `output_dir`
    ///
    /// Setting `cancel` to `true` stops admission; already admitted jobs
    /// finish at their next checkpoint. The report always covers every
    /// combination.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed request, before anything
    /// is dispatched. Returns an export error if the output directory cannot
    /// be created or the pool bookkeeping is violated.
    pub async fn run_batch(
        &self,
        request: &FilterListRequest,
        output_dir: &Path,
        progress: Option<Arc<dyn ProgressSink>>,
        cancel: watch::Receiver<bool>,
    ) -> Result<ExportReport> {
        request.validate()?;

        tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
            TradexError::Export(format!(
                "Failed to create output directory {}: {e}",
                output_dir.display()
            ))
        })?;

        let started_at = Instant::now();
        let expander = ParameterExpander::new(request);
        let total = expander.total_combinations();
        let worker_count = self.settings.plan_workers(total);
        let semaphore = Arc::new(Semaphore::new(worker_count));

        let context = Arc::new(JobContext {
            data_source: self.data_source.clone(),
            writer: self.writer.clone(),
            run_log: self.run_log.clone(),
            output_dir: output_dir.to_path_buf(),
            tracker: Arc::new(ProgressTracker::with_start(total, started_at)),
            sink: progress,
            cancel: cancel.clone(),
            combination_timeout: self.settings.combination_timeout,
        });

        tracing::info!(
            total_combinations = total,
            worker_count,
            output_directory = %output_dir.display(),
            timeout_secs = self.settings.combination_timeout.map(|d| d.as_secs()),
            "Starting batch export"
        );

        let mut jobs: JoinSet<CombinationOutcome> = JoinSet::new();
        let mut running = RunningJobs::new();
        let mut names = DestinationNames::default();
        let mut outcomes = Vec::with_capacity(total.min(4096));
        let mut interrupted = false;

        for (index, key) in expander.iter().enumerate() {
            while let Some(result) = jobs.try_join_next_with_id() {
                outcomes.push(settle(&mut running, result)?);
            }

            let file_name = names.assign(index, &key, self.writer.extension());

            if *cancel.borrow() {
                interrupted = true;
                let outcome = CombinationOutcome::cancelled(index, key, Duration::ZERO);
                context.finish(&outcome);
                outcomes.push(outcome);
                continue;
            }

            let permit = tokio::select! {
                biased;
                _ = cancellation_requested(cancel.clone()) => None,
                permit = semaphore.clone().acquire_owned() => Some(permit.map_err(|e| {
                    TradexError::Export(format!("Worker pool closed: {e}"))
                })?),
            };

            let Some(permit) = permit else {
                interrupted = true;
                let outcome = CombinationOutcome::cancelled(index, key, Duration::ZERO);
                context.finish(&outcome);
                outcomes.push(outcome);
                continue;
            };

            let admission = AdmissionPermit::new(permit, self.ledger.clone(), context.tracker.clone());
            let handle = jobs.spawn(context.clone().run_job(index, key.clone(), file_name, admission));
            running.insert(handle.id(), (index, key));
        }

        while let Some(result) = jobs.join_next_with_id().await {
            outcomes.push(settle(&mut running, result)?);
        }

        if semaphore.available_permits() != worker_count {
            return Err(TradexError::Export(format!(
                "Permit leak: {} of {} permits returned",
                semaphore.available_permits(),
                worker_count
            )));
        }

        interrupted |= *cancel.borrow();
        if interrupted {
            tracing::warn!("Batch export interrupted by cancellation");
        }

        let report = ResultAggregator::new(started_at, output_dir, worker_count)
            .aggregate(outcomes, interrupted);

        if let Some(run_log) = &self.run_log {
            if let Err(e) = run_log.log_summary(&report) {
                tracing::warn!(error = %e, "Failed to write run log summary");
            }
            let run_log = run_log.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || run_log.close()).await {
                tracing::warn!(error = %e, "Failed to flush run log");
            }
        }

        Ok(report)
    }
}
