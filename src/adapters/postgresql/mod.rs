//! PostgreSQL data source
//!
//! Runs the refresh procedure and the filtered select for each combination.

pub mod adapter;
pub mod client;

pub use adapter::PostgreSQLAdapter;
pub use client::PostgreSQLClient;
