//! Logging and observability
//!
//! Structured logging via `tracing`:
//! - Console output
//! - JSON-formatted log files with rotation
//! - Configurable log levels
//!
//! # Example
//!
//! ```no_run
//! use tradex::logging::init_logging;
//! use tradex::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log that a combination was admitted to the worker pool
///
/// # Example
///
/// ```no_run
/// use tradex::log_combination_start;
///
/// log_combination_start!(3, "HS:01 | JAN24");
/// ```
#[macro_export]
macro_rules! log_combination_start {
    ($index:expr, $label:expr) => {
        tracing::debug!(
            index = $index,
            combination = %$label,
            "Combination admitted"
        );
    };
}

/// Log the terminal state of a combination
///
/// # Example
///
/// ```no_run
/// use tradex::log_combination_complete;
/// use std::time::Duration;
///
/// log_combination_complete!("HS:01 | JAN24", "success", 42, Duration::from_millis(250));
/// ```
#[macro_export]
macro_rules! log_combination_complete {
    ($label:expr, $status:expr, $records:expr, $duration:expr) => {
        tracing::info!(
            combination = %$label,
            status = $status,
            record_count = $records,
            duration_ms = $duration.as_millis() as u64,
            "Combination finished"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use tradex::log_error_with_context;
/// use tradex::domain::TradexError;
///
/// let error = TradexError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}
