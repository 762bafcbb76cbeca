//! CSV spreadsheet writer

use crate::adapters::spreadsheet::SpreadsheetWriter;
use crate::domain::{Result, Row, TradexError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Writes rows as CSV with a header line
///
/// Cells are rendered with [`crate::domain::CellValue`]'s `Display`: nulls
/// are empty, dates ISO-8601. Writing happens on the blocking pool.
#[derive(Debug, Clone)]
pub struct CsvSheetWriter {
    delimiter: u8,
}

impl Default for CsvSheetWriter {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl CsvSheetWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }
}

#[async_trait]
impl SpreadsheetWriter for CsvSheetWriter {
    fn extension(&self) -> &'static str {
        "csv"
    }

    async fn write(&self, rows: Vec<Row>, destination: &Path) -> Result<PathBuf> {
        let path = destination.to_path_buf();
        let delimiter = self.delimiter;

        tokio::task::spawn_blocking(move || write_csv(&rows, &path, delimiter).map(|_| path))
            .await
            .map_err(|e| TradexError::Spreadsheet(format!("CSV writer task failed: {e}")))?
    }
}

fn write_csv(rows: &[Row], path: &Path, delimiter: u8) -> Result<()> {
    let mut wtr = ::csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| {
            TradexError::Spreadsheet(format!("Failed to create {}: {e}", path.display()))
        })?;

    if let Some(first) = rows.first() {
        wtr.write_record(first.schema().columns())?;
    }

    for row in rows {
        wtr.write_record(row.values().iter().map(|v| v.to_string()))?;
    }

    wtr.flush()?;
    Ok(())
}
