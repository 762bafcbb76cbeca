//! PostgreSQL client implementation
//!
//! Connection pooling over `deadpool-postgres`, with TLS through
//! `postgres-native-tls` unless `ssl_mode = "disable"`.

use crate::config::schema::DatabaseConfig;
use crate::domain::{QueryError, Result, TradexError};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_postgres::config::SslMode;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};

/// Pooled PostgreSQL client
///
/// Every statement runs on a pooled connection with the configured
/// `statement_timeout` applied first.
pub struct PostgreSQLClient {
    pool: Pool,
    statement_timeout_ms: u64,
    safe_dsn: String,
}

impl PostgreSQLClient {
    /// Create a new PostgreSQL client
    ///
    /// No connection is opened until the first statement.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string cannot be parsed, the TLS
    /// connector cannot be built or the pool cannot be created.
    pub fn new(config: &DatabaseConfig) -> Result<Self> {
        let mut pg_config: tokio_postgres::Config = config
            .connection_string
            .expose_secret()
            .parse()
            .map_err(|e| {
                TradexError::Configuration(format!("Invalid PostgreSQL connection string: {e}"))
            })?;

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = match config.ssl_mode.as_str() {
            "disable" => {
                pg_config.ssl_mode(SslMode::Disable);
                Manager::from_config(pg_config, NoTls, manager_config)
            }
            mode => {
                pg_config.ssl_mode(if mode == "require" {
                    SslMode::Require
                } else {
                    SslMode::Prefer
                });
                let connector = TlsConnector::builder().build().map_err(|e| {
                    TradexError::Database(format!("Failed to build TLS connector: {e}"))
                })?;
                Manager::from_config(pg_config, MakeTlsConnector::new(connector), manager_config)
            }
        };

        let timeout = Duration::from_secs(config.connection_timeout_seconds);
        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .wait_timeout(Some(timeout))
            .create_timeout(Some(timeout))
            .recycle_timeout(Some(timeout))
            .runtime(deadpool_postgres::Runtime::Tokio1)
            .build()
            .map_err(|e| TradexError::Database(format!("Failed to create connection pool: {e}")))?;

        Ok(Self {
            pool,
            statement_timeout_ms: config.statement_timeout_seconds * 1000,
            safe_dsn: config.connection_string.expose_secret().redacted_dsn(),
        })
    }

    /// Test the connection to PostgreSQL
    pub async fn test_connection(&self) -> Result<()> {
        let client = self.get_connection().await?;

        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| QueryError::ConnectionFailed(format!("Connection test failed: {e}")))?;

        tracing::info!(dsn = %self.safe_dsn, "PostgreSQL connection test successful");
        Ok(())
    }

    /// Get a connection from the pool
    ///
    /// # Errors
    ///
    /// Returns an error if a connection cannot be obtained.
    pub async fn get_connection(&self) -> Result<Object> {
        self.pool.get().await.map_err(|e| {
            TradexError::Query(QueryError::ConnectionFailed(format!(
                "Failed to get connection from pool: {e}"
            )))
        })
    }

    /// Execute a query and return rows
    ///
    /// # Errors
    ///
    /// Returns a [`QueryError::FetchFailed`] (or [`QueryError::Timeout`]) if
    /// the query fails.
    pub async fn query(&self, query: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>> {
        let client = self.get_connection().await?;
        self.apply_statement_timeout(&client).await?;

        client
            .query(query, params)
            .await
            .map_err(|e| classify(e, QueryError::FetchFailed).into())
    }

    /// Execute a statement and return the number of affected rows
    ///
    /// # Errors
    ///
    /// Returns a [`QueryError::RefreshFailed`] (or [`QueryError::Timeout`])
    /// if the statement fails.
    pub async fn execute(&self, statement: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64> {
        let client = self.get_connection().await?;
        self.apply_statement_timeout(&client).await?;

        client
            .execute(statement, params)
            .await
            .map_err(|e| classify(e, QueryError::RefreshFailed).into())
    }

    async fn apply_statement_timeout(&self, client: &Object) -> Result<()> {
        client
            .batch_execute(&format!(
                "SET statement_timeout = {}",
                self.statement_timeout_ms
            ))
            .await
            .map_err(|e| {
                TradexError::Query(QueryError::ConnectionFailed(format!(
                    "Failed to set statement timeout: {e}"
                )))
            })
    }

    /// Connection string without credentials
    pub fn connection_string_safe(&self) -> &str {
        &self.safe_dsn
    }

    /// Get the pool statistics
    pub fn pool_status(&self) -> deadpool_postgres::Status {
        self.pool.status()
    }
}

/// Maps a driver error, singling out `query_canceled` (statement timeout)
fn classify(err: tokio_postgres::Error, otherwise: fn(String) -> QueryError) -> QueryError {
    let is_timeout = err
        .code()
        .is_some_and(|code| *code == tokio_postgres::error::SqlState::QUERY_CANCELED);
    let message = match err.as_db_error() {
        Some(db) => db.message().to_string(),
        None => err.to_string(),
    };

    if is_timeout {
        QueryError::Timeout(message)
    } else {
        otherwise(message)
    }
}
