//! Export orchestration
//!
//! - [`expander`] - enumerates filter combinations lazily
//! - [`planner`] - sizes the worker pool
//! - [`executor`] - runs combinations under the worker bound
//! - [`progress`] - progress snapshots and sinks
//! - [`report`] - per-combination outcomes and the run report
//! - [`run_log`] - per-run log file
//! - [`coordinator`] - builds collaborators from configuration

pub mod coordinator;
pub mod executor;
pub mod expander;
pub mod planner;
pub mod progress;
pub mod report;
pub mod run_log;

pub use coordinator::{ExportCoordinator, ExportPlan, REPORT_FILE_NAME};
pub use executor::{BatchExecutor, ExecutorSettings, PermitLedger};
pub use expander::{CombinationIter, ParameterExpander};
pub use planner::ConcurrencyPolicy;
pub use progress::{JobPhase, LoggingProgressSink, ProgressSink, ProgressSnapshot, ProgressTracker};
pub use report::{CombinationOutcome, ExportReport, OutcomeStatus, ResultAggregator};
pub use run_log::RunLogger;
