// Tradex - Combinatorial trade-record export tool
// Copyright (c) 2025 Tradex Contributors
// Licensed under the MIT License

//! # Tradex - combinatorial trade-record export
//!
//! Tradex takes a set of filter value-lists (HS codes, products, exporters,
//! ports, IEC numbers, countries, foreign parties) plus a month range,
//! expands them into every combination, and for each combination refreshes
//! a PostgreSQL summary, fetches the matching rows and writes them to a
//! spreadsheet file. Combinations run on a bounded worker pool; one failing
//! combination never affects another.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Expansion, pool planning, batch execution, progress and reporting
//! - [`adapters`] - PostgreSQL data source and CSV writer
//! - [`domain`] - Requests, combination keys, rows and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tradex::config::load_config;
//! use tradex::core::export::ExportCoordinator;
//! use tradex::domain::{FilterField, FilterListRequestBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("tradex.toml")?;
//!     let request = FilterListRequestBuilder::new()
//!         .field(FilterField::HsCode, "01,02")
//!         .field(FilterField::Exporter, "ACME%")
//!         .months("202401", "202403")
//!         .build()?;
//!
//!     let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!     let coordinator = ExportCoordinator::new(config)?;
//!     let report = coordinator.execute_export(&request, None, shutdown_rx).await?;
//!
//!     println!("Exported {} records", report.total_records);
//!     Ok(())
//! }
//! ```
//!
//! ## Custom collaborators
//!
//! The executor only depends on [`adapters::database::TradeDataSource`] and
//! [`adapters::spreadsheet::SpreadsheetWriter`]:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tradex::adapters::database::TradeDataSource;
//! use tradex::adapters::spreadsheet::CsvSheetWriter;
//! use tradex::core::export::{BatchExecutor, ExecutorSettings};
//! use tradex::domain::FilterListRequest;
//!
//! # async fn example(source: Arc<dyn TradeDataSource>, request: FilterListRequest) -> tradex::domain::Result<()> {
//! let executor = BatchExecutor::new(source, Arc::new(CsvSheetWriter::new()), ExecutorSettings::default());
//! let (_tx, rx) = tokio::sync::watch::channel(false);
//! let report = executor.run_batch(&request, std::path::Path::new("exports"), None, rx).await?;
//! assert_eq!(report.total, report.outcomes.len());
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
