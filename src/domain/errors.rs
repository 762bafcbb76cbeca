//! Domain error types
//!
//! This module defines the error hierarchy for Tradex. Errors raised by
//! third-party crates are converted at the adapter boundary so that callers
//! only ever see domain types.
//!
//! Per-combination problems (a failed query, an empty output file, a
//! cancelled job) are deliberately *not* represented here: they are recorded
//! as [`crate::core::export::OutcomeStatus`] values and never propagate out
//! of a batch run.

use thiserror::Error;

/// Main Tradex error type
#[derive(Debug, Error)]
pub enum TradexError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed export request (bad month serials, inverted range)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Query/execution collaborator errors
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Database errors (pool, connection setup)
    #[error("Database error: {0}")]
    Database(String),

    /// Batch execution errors
    #[error("Export error: {0}")]
    Export(String),

    /// Spreadsheet writer errors
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Errors raised by the query/execution collaborator
///
/// These errors don't expose driver types.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Failed to obtain a connection
    #[error("Failed to connect to data source: {0}")]
    ConnectionFailed(String),

    /// The refresh procedure raised an error
    #[error("Refresh procedure failed: {0}")]
    RefreshFailed(String),

    /// The filtered select raised an error
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// A result column could not be mapped to a cell value
    #[error("Unsupported column '{column}' of type {type_name}")]
    UnsupportedColumn { column: String, type_name: String },

    /// Statement exceeded its timeout
    #[error("Query timeout: {0}")]
    Timeout(String),
}

impl TradexError {
    /// Whether this error came from request validation
    pub fn is_validation(&self) -> bool {
        matches!(self, TradexError::Validation(_))
    }
}

impl From<std::io::Error> for TradexError {
    fn from(err: std::io::Error) -> Self {
        TradexError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TradexError {
    fn from(err: serde_json::Error) -> Self {
        TradexError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for TradexError {
    fn from(err: toml::de::Error) -> Self {
        TradexError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<csv::Error> for TradexError {
    fn from(err: csv::Error) -> Self {
        TradexError::Spreadsheet(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tradex_error_display() {
        let err = TradexError::Validation("fromMonth after toMonth".to_string());
        assert_eq!(err.to_string(), "Validation error: fromMonth after toMonth");
        assert!(err.is_validation());
    }

    #[test]
    fn test_query_error_conversion() {
        let query_err = QueryError::FetchFailed("relation does not exist".to_string());
        let err: TradexError = query_err.into();
        assert!(matches!(err, TradexError::Query(_)));
        assert!(!err.is_validation());
    }

    #[test]
    fn test_unsupported_column_display() {
        let err = QueryError::UnsupportedColumn {
            column: "shape".to_string(),
            type_name: "geometry".to_string(),
        };
        assert_eq!(err.to_string(), "Unsupported column 'shape' of type geometry");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: TradexError = io_err.into();
        assert!(matches!(err, TradexError::Io(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: TradexError = toml_err.into();
        assert!(matches!(err, TradexError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }
}
