//! Domain models and types for Tradex.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Export requests** ([`FilterListRequest`], [`MonthSerial`])
//! - **Combination keys** ([`CombinationKey`], [`QueryFilter`])
//! - **Result rows** ([`Row`], [`CellValue`])
//! - **Error types** ([`TradexError`], [`QueryError`])
//! - **Result type alias** ([`Result`])
//!
//! # Building a request
//!
//! ```rust
//! use tradex::domain::{FilterField, FilterListRequestBuilder};
//!
//! # fn example() -> tradex::domain::Result<()> {
//! let request = FilterListRequestBuilder::new()
//!     .field(FilterField::HsCode, "01,02")
//!     .field(FilterField::Country, "US")
//!     .months("202401", "202403")
//!     .build()?;
//!
//! assert_eq!(request.hs_codes.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod combination;
pub mod errors;
pub mod request;
pub mod result;
pub mod row;

pub use combination::{CombinationKey, QueryFilter};
pub use errors::{QueryError, TradexError};
pub use request::{
    parse_value_list, FilterField, FilterListRequest, FilterListRequestBuilder, MonthSerial,
    WILDCARD,
};
pub use result::Result;
pub use row::{CellValue, Row, RowSchema};
