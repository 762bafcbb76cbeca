//! Core business logic for Tradex.
//!
//! # Export Workflow
//!
//! 1. **Expand**: enumerate the Cartesian product of the requested filter values
//! 2. **Plan**: size the worker pool from the number of combinations
//! 3. **Execute**: refresh, fetch and write each combination under the worker bound
//! 4. **Report**: aggregate outcomes in enumeration order
//!
//! # Example
//!
//! ```rust,no_run
//! use tradex::config::load_config;
//! use tradex::core::export::ExportCoordinator;
//! use tradex::domain::{FilterField, FilterListRequestBuilder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("tradex.toml")?;
//! let request = FilterListRequestBuilder::new()
//!     .field(FilterField::HsCode, "01,02")
//!     .months("202401", "202401")
//!     .build()?;
//!
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let coordinator = ExportCoordinator::new(config)?;
//! let report = coordinator.execute_export(&request, None, shutdown_rx).await?;
//!
//! println!("Succeeded: {}", report.succeeded);
//! println!("Failed: {}", report.failed);
//! # Ok(())
//! # }
//! ```

pub mod export;
