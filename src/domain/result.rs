//! Result type alias for Tradex

use super::errors::TradexError;

/// Result type alias for Tradex operations
///
/// # Examples
///
/// ```
/// use tradex::domain::result::Result;
/// use tradex::domain::errors::TradexError;
///
/// fn failing_function() -> Result<()> {
///     Err(TradexError::Validation("Invalid input".to_string()))
/// }
/// assert!(failing_function().is_err());
/// ```
pub type Result<T> = std::result::Result<T, TradexError>;
