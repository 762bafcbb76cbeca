//! Integration tests for the batch executor
//!
//! These tests drive [`BatchExecutor`] with in-memory collaborators and
//! verify that:
//! - The worker bound holds and every permit is returned
//! - Failures, empty results, panics and timeouts stay isolated
//! - Cancellation stops admission and drains in-flight combinations
//! - Outcomes and file names follow enumeration order
//! - A started write finishes inside its worker slot, even under a time limit
//! - Colliding file names are disambiguated
//! - A panicking progress sink does not abort the run

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::watch;
use tradex::adapters::database::TradeDataSource;
use tradex::adapters::spreadsheet::{CsvSheetWriter, SpreadsheetWriter};
use tradex::core::export::{
    BatchExecutor, ConcurrencyPolicy, ExecutorSettings, OutcomeStatus, ProgressSink,
    ProgressSnapshot,
};
use tradex::domain::{
    CellValue, FilterField, FilterListRequestBuilder, QueryFilter, Result, Row, RowSchema,
    TradexError,
};

#[derive(Clone, Copy)]
enum Behavior {
    Rows(usize),
    Empty,
    Fail,
    Panic,
    Hang,
}

/// Data source keyed by HS code, tracking how many fetches overlap
struct MockSource {
    behaviors: HashMap<String, Behavior>,
    fetch_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    refreshes: AtomicUsize,
    cancel_on_fetch: Option<(String, watch::Sender<bool>)>,
}

impl MockSource {
    fn new(behaviors: &[(&str, Behavior)]) -> Self {
        Self {
            behaviors: behaviors
                .iter()
                .map(|(code, behavior)| (code.to_string(), *behavior))
                .collect(),
            fetch_delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
            cancel_on_fetch: None,
        }
    }

    fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    fn cancelling_at(mut self, hs_code: &str, sender: watch::Sender<bool>) -> Self {
        self.cancel_on_fetch = Some((hs_code.to_string(), sender));
        self
    }
}

fn rows_for(filter: &QueryFilter, count: usize) -> Vec<Row> {
    let schema = Arc::new(RowSchema::new(vec![
        "hs_code".to_string(),
        "country".to_string(),
        "quantity".to_string(),
    ]));
    (0..count)
        .map(|i| {
            Row::new(
                schema.clone(),
                vec![
                    CellValue::from(filter.hs_code.as_str()),
                    CellValue::from(filter.country.as_str()),
                    CellValue::Integer(i as i64),
                ],
            )
            .unwrap()
        })
        .collect()
}

#[async_trait]
impl TradeDataSource for MockSource {
    async fn trigger_refresh(&self, _filter: &QueryFilter) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_rows(&self, filter: &QueryFilter) -> Result<Vec<Row>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some((code, sender)) = &self.cancel_on_fetch {
            if *code == filter.hs_code {
                sender.send_replace(true);
            }
        }

        let behavior = self
            .behaviors
            .get(&filter.hs_code)
            .copied()
            .unwrap_or(Behavior::Rows(1));

        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match behavior {
            Behavior::Rows(count) => Ok(rows_for(filter, count)),
            Behavior::Empty => Ok(Vec::new()),
            Behavior::Fail => Err(TradexError::Other(format!(
                "procedure failed for {}",
                filter.hs_code
            ))),
            Behavior::Panic => panic!("driver crashed"),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(rows_for(filter, 1))
            }
        }
    }
}

/// Collects every snapshot it receives
#[derive(Default)]
struct RecordingSink {
    snapshots: Mutex<Vec<ProgressSnapshot>>,
}

impl ProgressSink for RecordingSink {
    fn on_progress(&self, snapshot: ProgressSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot);
    }
}

fn settings(worker_override: Option<usize>) -> ExecutorSettings {
    ExecutorSettings {
        policy: ConcurrencyPolicy::default(),
        worker_override,
        combination_timeout: None,
        available_parallelism: 8,
    }
}

fn executor(source: Arc<MockSource>, settings: ExecutorSettings) -> BatchExecutor {
    BatchExecutor::new(source, Arc::new(CsvSheetWriter::new()), settings)
}

fn hs_codes(count: usize) -> String {
    (1..=count)
        .map(|i| format!("{i:02}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[tokio::test]
async fn test_worker_bound_holds_and_permits_balance() {
    let dir = tempdir().unwrap();
    let source = Arc::new(MockSource::new(&[]).with_fetch_delay(Duration::from_millis(30)));
    let executor = executor(source.clone(), settings(Some(3)));
    let request = FilterListRequestBuilder::new()
        .field(FilterField::HsCode, &hs_codes(12))
        .months("202401", "202401")
        .build()
        .unwrap();
    let sink = Arc::new(RecordingSink::default());
    let progress: Arc<dyn ProgressSink> = sink.clone();
    let (_tx, rx) = watch::channel(false);

    let report = executor
        .run_batch(&request, dir.path(), Some(progress), rx)
        .await
        .unwrap();

    assert_eq!(report.worker_count, 3);
    assert_eq!(report.total, 12);
    assert_eq!(report.succeeded, 12);
    assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 3);

    let ledger = executor.permit_ledger();
    assert_eq!(ledger.acquired(), 12);
    assert!(ledger.is_balanced());
    assert_eq!(ledger.outstanding(), 0);

    let snapshots = sink.snapshots.lock().unwrap();
    assert!(snapshots.iter().all(|s| s.in_flight <= 3));
    assert_eq!(snapshots.iter().map(|s| s.processed).max(), Some(12));
}

#[tokio::test]
async fn test_outcomes_follow_enumeration_order() {
    let dir = tempdir().unwrap();
    let source = Arc::new(MockSource::new(&[("01", Behavior::Rows(3))]));
    let executor = executor(source, settings(None));
    let request = FilterListRequestBuilder::new()
        .field(FilterField::HsCode, "01,02")
        .field(FilterField::Country, "US,UK")
        .months("202401", "202403")
        .build()
        .unwrap();
    let (_tx, rx) = watch::channel(false);

    let report = executor
        .run_batch(&request, dir.path(), None, rx)
        .await
        .unwrap();

    let names: Vec<String> = report
        .outcomes
        .iter()
        .map(|o| {
            o.output_path
                .as_ref()
                .unwrap()
                .file_name()
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    assert_eq!(
        names,
        vec![
            "01_US_JAN24-MAR24EXP.csv",
            "01_UK_JAN24-MAR24EXP.csv",
            "02_US_JAN24-MAR24EXP.csv",
            "02_UK_JAN24-MAR24EXP.csv",
        ]
    );
    assert_eq!(report.total_records, 3 + 3 + 1 + 1);
    assert!(report.outcomes.iter().enumerate().all(|(i, o)| o.index == i));

    let content = std::fs::read_to_string(dir.path().join("01_UK_JAN24-MAR24EXP.csv")).unwrap();
    assert_eq!(content.lines().count(), 4);
    assert!(content.starts_with("hs_code,country,quantity"));
}

#[tokio::test]
async fn test_failures_are_isolated() {
    let dir = tempdir().unwrap();
    let source = Arc::new(MockSource::new(&[
        ("02", Behavior::Empty),
        ("03", Behavior::Fail),
        ("04", Behavior::Panic),
    ]));
    let executor = executor(source.clone(), settings(Some(2)));
    let request = FilterListRequestBuilder::new()
        .field(FilterField::HsCode, "01,02,03,04,05")
        .months("202401", "202401")
        .build()
        .unwrap();
    let (_tx, rx) = watch::channel(false);

    let report = executor
        .run_batch(&request, dir.path(), None, rx)
        .await
        .unwrap();

    let statuses: Vec<OutcomeStatus> = report.outcomes.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![
            OutcomeStatus::Success,
            OutcomeStatus::DataUnavailable,
            OutcomeStatus::Failed,
            OutcomeStatus::Failed,
            OutcomeStatus::Success,
        ]
    );
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 2);
    assert!(!report.overall_success());

    assert!(report.outcomes[2]
        .error
        .as_deref()
        .unwrap()
        .contains("procedure failed for 03"));
    assert!(report.outcomes[3]
        .error
        .as_deref()
        .unwrap()
        .contains("driver crashed"));

    assert!(!dir.path().join("02_JAN24EXP.csv").exists());
    assert!(dir.path().join("05_JAN24EXP.csv").exists());
    assert_eq!(source.refreshes.load(Ordering::SeqCst), 5);
    assert!(executor.permit_ledger().is_balanced());
}

#[tokio::test]
async fn test_timeout_fails_only_the_slow_combination() {
    let dir = tempdir().unwrap();
    let source = Arc::new(MockSource::new(&[("02", Behavior::Hang)]));
    let executor = executor(
        source,
        ExecutorSettings {
            combination_timeout: Some(Duration::from_millis(100)),
            ..settings(None)
        },
    );
    let request = FilterListRequestBuilder::new()
        .field(FilterField::HsCode, "01,02,03")
        .months("202401", "202401")
        .build()
        .unwrap();
    let (_tx, rx) = watch::channel(false);

    let report = executor
        .run_batch(&request, dir.path(), None, rx)
        .await
        .unwrap();

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.outcomes[1].status, OutcomeStatus::Failed);
    assert!(report.outcomes[1]
        .error
        .as_deref()
        .unwrap()
        .contains("Timed out"));
    assert!(executor.permit_ledger().is_balanced());
}

#[tokio::test]
async fn test_cancellation_drains_and_reports_every_combination() {
    let dir = tempdir().unwrap();
    let (tx, rx) = watch::channel(false);
    let source = Arc::new(MockSource::new(&[]).cancelling_at("02", tx));
    let executor = executor(source.clone(), settings(Some(1)));
    let request = FilterListRequestBuilder::new()
        .field(FilterField::HsCode, "01,02,03,04")
        .months("202401", "202401")
        .build()
        .unwrap();

    let report = executor
        .run_batch(&request, dir.path(), None, rx)
        .await
        .unwrap();

    assert!(report.interrupted);
    assert_eq!(report.total, 4);
    assert_eq!(report.outcomes.len(), 4);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.cancelled, 3);
    assert_eq!(report.outcomes[0].status, OutcomeStatus::Success);
    assert!(report.outcomes[1..].iter().all(|o| o.is_cancelled()));

    // Only the first two combinations were ever admitted
    assert_eq!(source.refreshes.load(Ordering::SeqCst), 2);
    assert_eq!(executor.permit_ledger().acquired(), 2);
    assert!(executor.permit_ledger().is_balanced());
    assert!(!dir.path().join("02_JAN24EXP.csv").exists());
}

#[tokio::test]
async fn test_snapshots_name_each_phase() {
    let dir = tempdir().unwrap();
    let source = Arc::new(MockSource::new(&[]));
    let executor = executor(source, settings(None));
    let request = FilterListRequestBuilder::new()
        .field(FilterField::HsCode, "01")
        .months("202401", "202401")
        .build()
        .unwrap();
    let sink = Arc::new(RecordingSink::default());
    let progress: Arc<dyn ProgressSink> = sink.clone();
    let (_tx, rx) = watch::channel(false);

    executor
        .run_batch(&request, dir.path(), Some(progress), rx)
        .await
        .unwrap();

    let statuses: Vec<String> = sink
        .snapshots
        .lock()
        .unwrap()
        .iter()
        .map(|s| s.status.clone())
        .collect();
    let query = statuses
        .iter()
        .position(|s| s == "HS:01 | JAN24: running query")
        .unwrap();
    let export = statuses
        .iter()
        .position(|s| s == "HS:01 | JAN24: running export")
        .unwrap();
    assert!(query < export);
    assert_eq!(statuses.last().unwrap(), "HS:01 | JAN24: success");
}

#[tokio::test]
async fn test_cancellation_after_fetch_skips_the_write() {
    let dir = tempdir().unwrap();
    let (tx, rx) = watch::channel(false);
    let source = Arc::new(MockSource::new(&[("01", Behavior::Rows(3))]).cancelling_at("01", tx));
    let executor = executor(source.clone(), settings(None));
    let request = FilterListRequestBuilder::new()
        .field(FilterField::HsCode, "01")
        .months("202401", "202401")
        .build()
        .unwrap();

    let report = executor
        .run_batch(&request, dir.path(), None, rx)
        .await
        .unwrap();

    assert!(report.interrupted);
    assert_eq!(report.cancelled, 1);
    let outcome = &report.outcomes[0];
    assert!(outcome.is_cancelled());
    assert_eq!(outcome.record_count, 3);
    assert!(outcome.output_path.is_none());
    assert_eq!(report.total_records, 0);
    assert_eq!(source.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

/// CSV writer that blocks its thread and counts overlapping writes
#[derive(Default)]
struct SlowWriter {
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

#[async_trait]
impl SpreadsheetWriter for SlowWriter {
    fn extension(&self) -> &'static str {
        "csv"
    }

    async fn write(&self, rows: Vec<Row>, destination: &Path) -> Result<PathBuf> {
        let active = self.active.clone();
        let max_active = self.max_active.clone();
        let path = destination.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<PathBuf> {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            max_active.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(250));
            let written = std::fs::write(&path, format!("{} rows\n", rows.len()));
            active.fetch_sub(1, Ordering::SeqCst);
            written?;
            Ok(path)
        })
        .await
        .map_err(|e| TradexError::Spreadsheet(e.to_string()))?
    }
}

#[tokio::test]
async fn test_time_limit_never_cuts_a_write_short() {
    let dir = tempdir().unwrap();
    let writer = Arc::new(SlowWriter::default());
    let executor = BatchExecutor::new(
        Arc::new(MockSource::new(&[])),
        writer.clone(),
        ExecutorSettings {
            combination_timeout: Some(Duration::from_millis(50)),
            ..settings(Some(1))
        },
    );
    let request = FilterListRequestBuilder::new()
        .field(FilterField::HsCode, "a,b,c")
        .months("202401", "202401")
        .build()
        .unwrap();
    let (_tx, rx) = watch::channel(false);

    let report = executor
        .run_batch(&request, dir.path(), None, rx)
        .await
        .unwrap();

    assert_eq!(report.worker_count, 1);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(writer.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(writer.active.load(Ordering::SeqCst), 0);
    for name in ["a_JAN24EXP.csv", "b_JAN24EXP.csv", "c_JAN24EXP.csv"] {
        assert!(dir.path().join(name).exists(), "{name} missing");
    }
}

#[tokio::test]
async fn test_colliding_file_names_are_disambiguated() {
    let dir = tempdir().unwrap();
    let executor = executor(Arc::new(MockSource::new(&[])), settings(None));
    let request = FilterListRequestBuilder::new()
        .field(FilterField::Product, "A/B,A B")
        .field(FilterField::HsCode, "84%,84")
        .months("202401", "202401")
        .build()
        .unwrap();
    let (_tx, rx) = watch::channel(false);

    let report = executor
        .run_batch(&request, dir.path(), None, rx)
        .await
        .unwrap();

    let names: Vec<String> = report
        .outcomes
        .iter()
        .map(|o| {
            o.output_path
                .as_ref()
                .unwrap()
                .file_name()
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    assert_eq!(
        names,
        vec![
            "84_A-B_JAN24EXP.csv",
            "84_A-B_JAN24EXP_1.csv",
            "84_A-B_JAN24EXP_2.csv",
            "84_A-B_JAN24EXP_3.csv",
        ]
    );
    assert_eq!(report.succeeded, 4);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 4);
}

/// Sink that panics on the first finished combination
struct PanickingSink;

impl ProgressSink for PanickingSink {
    fn on_progress(&self, snapshot: ProgressSnapshot) {
        if snapshot.processed == 1 {
            panic!("progress display went away");
        }
    }
}

#[tokio::test]
async fn test_panicking_sink_does_not_abort_the_run() {
    let dir = tempdir().unwrap();
    let executor = executor(Arc::new(MockSource::new(&[])), settings(Some(2)));
    let request = FilterListRequestBuilder::new()
        .field(FilterField::HsCode, &hs_codes(6))
        .months("202401", "202401")
        .build()
        .unwrap();
    let (_tx, rx) = watch::channel(false);

    let sink: Arc<dyn ProgressSink> = Arc::new(PanickingSink);

    let report = executor
        .run_batch(&request, dir.path(), Some(sink), rx)
        .await
        .unwrap();

    assert_eq!(report.total, 6);
    assert_eq!(report.succeeded, 6);
    assert!(executor.permit_ledger().is_balanced());
}

/// Writer that reports success without creating anything
struct PhantomWriter;

#[async_trait]
impl SpreadsheetWriter for PhantomWriter {
    fn extension(&self) -> &'static str {
        "csv"
    }

    async fn write(&self, _rows: Vec<Row>, destination: &Path) -> Result<PathBuf> {
        Ok(destination.to_path_buf())
    }
}

#[tokio::test]
async fn test_missing_output_file_is_failure() {
    let dir = tempdir().unwrap();
    let executor = BatchExecutor::new(
        Arc::new(MockSource::new(&[])),
        Arc::new(PhantomWriter),
        settings(None),
    );
    let request = FilterListRequestBuilder::new()
        .months("202401", "202401")
        .build()
        .unwrap();
    let (_tx, rx) = watch::channel(false);

    let report = executor
        .run_batch(&request, dir.path(), None, rx)
        .await
        .unwrap();

    assert_eq!(report.total, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.outcomes[0].record_count, 1);
    assert_eq!(report.total_records, 0);
}
