//! Data source abstraction
//!
//! The trait a query backend implements to feed the batch executor.

use crate::domain::{QueryFilter, Result, Row};
use async_trait::async_trait;

/// Query and execution collaborator
///
/// One call pair per combination: the executor first asks the source to
/// refresh whatever derived data the filter depends on, then fetches the
/// matching rows. An empty result is a legitimate answer, not an error.
#[async_trait]
pub trait TradeDataSource: Send + Sync {
    /// Test the connection
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    /// Refresh backend state for a filter (e.g. call a stored procedure)
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh fails.
    async fn trigger_refresh(&self, filter: &QueryFilter) -> Result<()>;

    /// Fetch the rows matching a filter, in backend order
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a column cannot be decoded.
    async fn fetch_rows(&self, filter: &QueryFilter) -> Result<Vec<Row>>;
}
