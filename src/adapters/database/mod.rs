//! Data source abstraction layer
//!
//! Trait-based seam between the batch executor and the query backend.

pub mod traits;

pub use traits::TradeDataSource;
