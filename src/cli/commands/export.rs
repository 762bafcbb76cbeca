//! Export command implementation
//!
//! Builds a filter-list request from the command line, confirms it, and runs
//! one file export per filter combination.

use crate::config::load_config;
use crate::core::export::{
    ExportCoordinator, ExportPlan, ExportReport, ProgressSink, ProgressSnapshot,
};
use crate::domain::{FilterField, FilterListRequest, FilterListRequestBuilder};
use clap::Args;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Failed combinations listed after a run
const MAX_LISTED_FAILURES: usize = 10;

/// Arguments for the export command
///
/// Filter values are comma-separated `LIKE` patterns; an omitted filter
/// matches every record.
#[derive(Args, Debug, Default)]
pub struct ExportArgs {
    /// HS codes (comma-separated)
    #[arg(long)]
    pub hs_code: Option<String>,

    /// Product descriptions (comma-separated)
    #[arg(long)]
    pub product: Option<String>,

    /// Exporter names (comma-separated)
    #[arg(long)]
    pub exporter: Option<String>,

    /// Ports (comma-separated)
    #[arg(long)]
    pub port: Option<String>,

    /// IEC numbers (comma-separated)
    #[arg(long)]
    pub iec: Option<String>,

    /// Destination countries (comma-separated)
    #[arg(long)]
    pub country: Option<String>,

    /// Foreign parties (comma-separated)
    #[arg(long)]
    pub party: Option<String>,

    /// First month of the range (YYYYMM)
    #[arg(long = "from", value_name = "YYYYMM")]
    pub from_month: String,

    /// Last month of the range (YYYYMM)
    #[arg(long = "to", value_name = "YYYYMM")]
    pub to_month: String,

    /// Override the output directory
    #[arg(short, long)]
    pub output_dir: Option<String>,

    /// Cap the worker pool size
    #[arg(long)]
    pub workers: Option<usize>,

    /// Per-combination time limit in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Dry run mode - list the files that would be written
    #[arg(long)]
    pub dry_run: bool,
}

impl ExportArgs {
    /// Build the export request from the filter arguments
    pub fn to_request(&self) -> crate::domain::Result<FilterListRequest> {
        FilterListRequestBuilder::new()
            .field_opt(FilterField::HsCode, self.hs_code.as_deref())
            .field_opt(FilterField::Product, self.product.as_deref())
            .field_opt(FilterField::Exporter, self.exporter.as_deref())
            .field_opt(FilterField::Port, self.port.as_deref())
            .field_opt(FilterField::Iec, self.iec.as_deref())
            .field_opt(FilterField::Country, self.country.as_deref())
            .field_opt(FilterField::ForeignParty, self.party.as_deref())
            .months(self.from_month.as_str(), self.to_month.as_str())
            .build()
    }

    /// Execute the export command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting export command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };

        if let Some(dir) = &self.output_dir {
            tracing::info!(output_directory = %dir, "Overriding output directory from CLI");
            config.export.output_directory = dir.clone();
        }
        if let Some(workers) = self.workers {
            config.export.worker_override = Some(workers);
        }
        if let Some(secs) = self.timeout_secs {
            config.export.combination_timeout_secs = Some(secs);
        }
        if self.dry_run {
            config.application.dry_run = true;
        }

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        let request = match self.to_request() {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "Invalid export request");
                eprintln!("Invalid export request: {e}");
                return Ok(2);
            }
        };

        let dry_run = config.application.dry_run;
        let shutdown_timeout = Duration::from_secs(config.export.shutdown_timeout_secs);

        let coordinator = match ExportCoordinator::new(config) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create export coordinator");
                eprintln!("Failed to initialize export: {e}");
                return Ok(4);
            }
        };

        let plan = coordinator.plan(&request)?;
        print_plan(&plan);

        if dry_run {
            println!("DRY RUN MODE - nothing was queried or written");
            return Ok(0);
        }

        if plan.total_combinations == 0 {
            println!("Nothing to export.");
            return Ok(0);
        }

        if !self.yes {
            print!("Proceed with export? [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Export cancelled.");
                return Ok(0);
            }
        }

        if let Err(e) = coordinator.test_connection().await {
            tracing::error!(error = %e, "Data source unreachable");
            eprintln!("Failed to connect to the database: {e}");
            return Ok(4);
        }

        println!("Starting export (run {})...", coordinator.run_id());
        println!();

        let progress: Arc<dyn ProgressSink> = Arc::new(console_progress());
        let export =
            coordinator.execute_export(&request, Some(progress), shutdown_signal.clone());
        tokio::pin!(export);

        let report = tokio::select! {
            result = &mut export => match result {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!(error = %e, "Export failed");
                    eprintln!("Export failed: {e}");
                    return Ok(if e.is_validation() { 2 } else { 5 });
                }
            },
            _ = shutdown_deadline(shutdown_signal, shutdown_timeout) => {
                tracing::warn!(
                    timeout_secs = shutdown_timeout.as_secs(),
                    "In-flight combinations did not finish before the shutdown timeout"
                );
                eprintln!("Shutdown timeout reached; abandoning in-flight combinations.");
                return Ok(130);
            }
        };

        print_report(&report);
        Ok(exit_code(&report))
    }
}

/// Exit code for a finished run
pub fn exit_code(report: &ExportReport) -> i32 {
    if report.interrupted {
        130
    } else if report.failed > 0 {
        1
    } else {
        0
    }
}

/// Resolves `timeout` after shutdown was requested
async fn shutdown_deadline(mut shutdown: watch::Receiver<bool>, timeout: Duration) {
    if shutdown.wait_for(|requested| *requested).await.is_err() {
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(timeout).await;
}

/// Prints one line per finished combination
fn console_progress() -> impl Fn(ProgressSnapshot) + Send + Sync {
    let last_processed = AtomicUsize::new(0);
    move |snapshot: ProgressSnapshot| {
        if last_processed.swap(snapshot.processed, Ordering::SeqCst) == snapshot.processed {
            return;
        }
        let eta = snapshot
            .eta
            .map(|d| format!(", ETA {}s", d.as_secs()))
            .unwrap_or_default();
        println!(
            "  [{}/{}] {:.1}% {}{}",
            snapshot.processed,
            snapshot.total,
            snapshot.percent_complete(),
            snapshot.status,
            eta
        );
    }
}

fn print_plan(plan: &ExportPlan) {
    println!("Export Plan:");
    println!("  Combinations: {}", plan.total_combinations);
    println!("  Workers: {}", plan.worker_count);
    println!("  Output directory: {}", plan.output_directory.display());
    for name in &plan.preview {
        println!("    {name}");
    }
    if plan.remaining() > 0 {
        println!("    ... and {} more", plan.remaining());
    }
    println!();
}

fn print_report(report: &ExportReport) {
    println!();
    println!("Export Summary:");
    println!("  Total Combinations: {}", report.total);
    println!("  Successful: {}", report.succeeded);
    println!("  No Data: {}", report.skipped);
    println!("  Failed: {}", report.failed);
    println!("  Cancelled: {}", report.cancelled);
    println!("  Records Exported: {}", report.total_records);
    println!("  Workers: {}", report.worker_count);
    println!("  Duration: {:.2}s", report.duration.as_secs_f64());
    println!("  Success Rate: {:.2}%", report.success_rate());
    println!("  Output: {}", report.output_directory.display());
    println!();

    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        println!("Failed combinations:");
        for outcome in failures.iter().take(MAX_LISTED_FAILURES) {
            println!(
                "  - {}: {}",
                outcome.label,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
        if failures.len() > MAX_LISTED_FAILURES {
            println!("  ... and {} more failures", failures.len() - MAX_LISTED_FAILURES);
        }
        println!();
    }

    if report.interrupted {
        println!("Export interrupted. Remaining combinations were cancelled.");
    } else if report.failed > 0 {
        println!("Export completed with failures");
    } else {
        println!("Export completed successfully!");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ExportArgs {
        ExportArgs {
            from_month: "202401".to_string(),
            to_month: "202403".to_string(),
            ..ExportArgs::default()
        }
    }

    #[test]
    fn test_to_request_defaults_to_wildcards() {
        let request = args().to_request().unwrap();
        assert_eq!(request.hs_codes, vec!["%"]);
        assert_eq!(request.foreign_parties, vec!["%"]);
        assert_eq!(request.from_month.value(), 202401);
        assert_eq!(request.to_month.value(), 202403);
    }

    #[test]
    fn test_to_request_splits_values() {
        let request = ExportArgs {
            hs_code: Some("01, 02".to_string()),
            party: Some("ACME%".to_string()),
            ..args()
        }
        .to_request()
        .unwrap();
        assert_eq!(request.hs_codes, vec!["01", "02"]);
        assert_eq!(request.foreign_parties, vec!["ACME%"]);
    }

    #[test]
    fn test_to_request_rejects_inverted_range() {
        let err = ExportArgs {
            from_month: "202405".to_string(),
            to_month: "202401".to_string(),
            ..args()
        }
        .to_request()
        .unwrap_err();
        assert!(err.is_validation());
    }
}
