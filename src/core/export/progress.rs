//! Progress tracking for a batch run
//!
//! Workers report phase transitions to a shared [`ProgressTracker`]; every
//! transition produces a [`ProgressSnapshot`] which is handed to an optional
//! [`ProgressSink`]. Counter updates happen under one lock so a snapshot is
//! always internally consistent.

use crate::core::export::report::OutcomeStatus;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Lifecycle phase of one combination job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Queued,
    Admitted,
    RunningQuery,
    RunningExport,
    Completed(OutcomeStatus),
}

impl JobPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Queued => "queued",
            JobPhase::Admitted => "admitted",
            JobPhase::RunningQuery => "running query",
            JobPhase::RunningExport => "running export",
            JobPhase::Completed(_) => "completed",
        }
    }
}

/// Point-in-time view of the run
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: usize,
    pub in_flight: usize,
    pub elapsed: Duration,
    /// Successful combinations per minute
    pub throughput_per_minute: f64,
    /// Estimated time remaining; `None` until something has finished
    pub eta: Option<Duration>,
    /// Short status text, e.g. "HS:01 | JAN24: running query"
    pub status: String,
    pub current_label: Option<String>,
}

impl ProgressSnapshot {
    /// Completion percentage in `[0, 100]`
    pub fn percent_complete(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.processed as f64 / self.total as f64) * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }
}

/// Receives progress snapshots
///
/// Implementations must be cheap; they are called from worker tasks.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, snapshot: ProgressSnapshot);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressSnapshot) + Send + Sync,
{
    fn on_progress(&self, snapshot: ProgressSnapshot) {
        self(snapshot)
    }
}

/// Sink that writes snapshots to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingProgressSink;

impl ProgressSink for LoggingProgressSink {
    fn on_progress(&self, snapshot: ProgressSnapshot) {
        tracing::info!(
            processed = snapshot.processed,
            total = snapshot.total,
            succeeded = snapshot.succeeded,
            failed = snapshot.failed,
            skipped = snapshot.skipped,
            in_flight = snapshot.in_flight,
            percent = format!("{:.1}", snapshot.percent_complete()),
            throughput_per_minute = format!("{:.1}", snapshot.throughput_per_minute),
            eta_secs = snapshot.eta.map(|d| d.as_secs()),
            "{}",
            snapshot.status
        );
    }
}

#[derive(Debug, Default)]
struct Counters {
    processed: usize,
    succeeded: usize,
    failed: usize,
    skipped: usize,
    cancelled: usize,
    in_flight: usize,
    status: String,
    current_label: Option<String>,
}

/// Shared progress state for one run
#[derive(Debug)]
pub struct ProgressTracker {
    total: usize,
    started_at: Instant,
    counters: Mutex<Counters>,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self::with_start(total, Instant::now())
    }

    pub fn with_start(total: usize, started_at: Instant) -> Self {
        Self {
            total,
            started_at,
            counters: Mutex::new(Counters {
                status: "queued".to_string(),
                ..Counters::default()
            }),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Records a phase transition for the combination `label` and returns
    /// the snapshot taken under the same lock
    pub fn record(&self, label: &str, phase: JobPhase) -> ProgressSnapshot {
        let mut counters = self.lock();

        match phase {
            JobPhase::Queued => {}
            JobPhase::Admitted => counters.in_flight += 1,
            JobPhase::RunningQuery | JobPhase::RunningExport => {}
            JobPhase::Completed(status) => {
                counters.processed += 1;
                match status {
                    OutcomeStatus::Success => counters.succeeded += 1,
                    OutcomeStatus::DataUnavailable => counters.skipped += 1,
                    OutcomeStatus::Failed => counters.failed += 1,
                    OutcomeStatus::Cancelled => counters.cancelled += 1,
                }
            }
        }

        counters.status = match phase {
            JobPhase::Completed(status) => format!("{label}: {}", status.as_str()),
            other => format!("{label}: {}", other.as_str()),
        };
        counters.current_label = Some(label.to_string());

        self.snapshot_locked(&counters)
    }

    /// Releases an in-flight slot recorded by [`JobPhase::Admitted`]
    pub fn release(&self) {
        let mut counters = self.lock();
        counters.in_flight = counters.in_flight.saturating_sub(1);
    }

    /// Current snapshot
    pub fn snapshot(&self) -> ProgressSnapshot {
        let counters = self.lock();
        self.snapshot_locked(&counters)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Counters> {
        // A poisoned lock only means a sink panicked mid-update; counters stay usable.
        self.counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn snapshot_locked(&self, counters: &Counters) -> ProgressSnapshot {
        let elapsed = self.started_at.elapsed();
        let minutes = elapsed.as_secs_f64() / 60.0;
        let throughput_per_minute = if minutes > 0.0 {
            counters.succeeded as f64 / minutes
        } else {
            0.0
        };

        ProgressSnapshot {
            total: self.total,
            processed: counters.processed,
            succeeded: counters.succeeded,
            failed: counters.failed,
            skipped: counters.skipped,
            cancelled: counters.cancelled,
            in_flight: counters.in_flight,
            elapsed,
            throughput_per_minute,
            eta: estimate_remaining(elapsed, counters.processed, self.total),
            status: counters.status.clone(),
            current_label: counters.current_label.clone(),
        }
    }
}

/// Average time per processed combination times the combinations left
fn estimate_remaining(elapsed: Duration, processed: usize, total: usize) -> Option<Duration> {
    if processed == 0 || processed >= total {
        return None;
    }
    let per_item = elapsed.as_secs_f64() / processed as f64;
    Some(Duration::from_secs_f64(per_item * (total - processed) as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters_follow_completions() {
        let tracker = ProgressTracker::new(4);
        tracker.record("a", JobPhase::Admitted);
        tracker.record("a", JobPhase::RunningQuery);
        tracker.record("a", JobPhase::Completed(OutcomeStatus::Success));
        tracker.release();
        tracker.record("b", JobPhase::Completed(OutcomeStatus::DataUnavailable));
        let snapshot = tracker.record("c", JobPhase::Completed(OutcomeStatus::Failed));

        assert_eq!(snapshot.total, 4);
        assert_eq!(snapshot.processed, 3);
        assert_eq!(snapshot.succeeded, 1);
        assert_eq!(snapshot.skipped, 1);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.in_flight, 0);
        assert_eq!(snapshot.status, "c: failed");
        assert!(!snapshot.is_complete());
        assert_eq!(snapshot.percent_complete(), 75.0);
    }

    #[test]
    fn test_status_text_names_phase() {
        let tracker = ProgressTracker::new(1);
        let snapshot = tracker.record("HS:01 | JAN24", JobPhase::RunningExport);
        assert_eq!(snapshot.status, "HS:01 | JAN24: running export");
        assert_eq!(snapshot.current_label.as_deref(), Some("HS:01 | JAN24"));
    }

    #[test]
    fn test_eta_absent_before_first_completion() {
        let tracker = ProgressTracker::new(10);
        assert!(tracker.snapshot().eta.is_none());
    }

    #[test]
    fn test_eta_estimate() {
        let eta = estimate_remaining(Duration::from_secs(10), 2, 6).unwrap();
        assert_eq!(eta, Duration::from_secs(20));
        assert!(estimate_remaining(Duration::from_secs(10), 6, 6).is_none());
    }

    #[test]
    fn test_closure_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let sink = move |snapshot: ProgressSnapshot| {
            seen_clone.lock().unwrap().push(snapshot.processed);
        };

        let tracker = ProgressTracker::new(2);
        sink.on_progress(tracker.record("a", JobPhase::Completed(OutcomeStatus::Success)));
        sink.on_progress(tracker.record("b", JobPhase::Completed(OutcomeStatus::Success)));

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_concurrent_updates_are_consistent() {
        let tracker = Arc::new(ProgressTracker::new(400));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        tracker.record("x", JobPhase::Completed(OutcomeStatus::Success));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.processed, 400);
        assert_eq!(snapshot.succeeded, 400);
        assert!(snapshot.is_complete());
        assert!(snapshot.eta.is_none());
    }
}
