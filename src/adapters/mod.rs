//! External system integrations for Tradex.
//!
//! - [`database`] - Data source abstraction (trait-based)
//! - [`postgresql`] - PostgreSQL implementation of the data source
//! - [`spreadsheet`] - Spreadsheet writer abstraction and CSV implementation
//!
//! The batch executor only sees the traits, so tests swap in in-memory
//! implementations.
//!
//! ```rust,no_run
//! use tradex::adapters::postgresql::{PostgreSQLAdapter, PostgreSQLClient};
//! use tradex::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("tradex.toml")?;
//! let client = PostgreSQLClient::new(&config.database)?;
//! let source = PostgreSQLAdapter::new(client, &config.database);
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod postgresql;
pub mod spreadsheet;
