//! Spreadsheet output
//!
//! [`SpreadsheetWriter`] is the seam between the batch executor and the file
//! format. [`CsvSheetWriter`] is the bundled implementation.

pub mod csv_writer;

pub use csv_writer::CsvSheetWriter;

use crate::domain::{Result, Row};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Writes one combination's rows to a file
#[async_trait]
pub trait SpreadsheetWriter: Send + Sync {
    /// File extension without the dot, e.g. `csv`
    fn extension(&self) -> &'static str;

    /// Write `rows` to `destination` and return the path actually written
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    async fn write(&self, rows: Vec<Row>, destination: &Path) -> Result<PathBuf>;
}
