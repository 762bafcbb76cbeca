//! PostgreSQL adapter implementing [`TradeDataSource`]
//!
//! `trigger_refresh` calls the configured procedure with the nine filter
//! arguments; `fetch_rows` selects from the configured view with one `LIKE`
//! per filter field and a `BETWEEN` on the month column.

use crate::adapters::database::traits::TradeDataSource;
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::config::schema::DatabaseConfig;
use crate::domain::request::FilterField;
use crate::domain::{CellValue, QueryError, QueryFilter, Result, Row, RowSchema, TradexError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio_postgres::types::{ToSql, Type};

/// PostgreSQL implementation of [`TradeDataSource`]
pub struct PostgreSQLAdapter {
    client: Arc<PostgreSQLClient>,
    refresh_sql: String,
    select_sql: String,
}

impl PostgreSQLAdapter {
    /// Create a new adapter; statements are rendered once from the config
    pub fn new(client: PostgreSQLClient, config: &DatabaseConfig) -> Self {
        Self::new_with_arc(Arc::new(client), config)
    }

    pub fn new_with_arc(client: Arc<PostgreSQLClient>, config: &DatabaseConfig) -> Self {
        Self {
            client,
            refresh_sql: refresh_statement(&config.refresh_procedure),
            select_sql: select_statement(&config.source_view, &config.month_column),
        }
    }

    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }
}

#[async_trait]
impl TradeDataSource for PostgreSQLAdapter {
    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    async fn trigger_refresh(&self, filter: &QueryFilter) -> Result<()> {
        let (patterns, from, to) = bind_values(filter);
        let params = param_refs(&patterns, &from, &to);

        self.client.execute(&self.refresh_sql, &params).await?;
        tracing::debug!(
            hs_code = %filter.hs_code,
            from_month = filter.from_month,
            to_month = filter.to_month,
            "Refresh procedure completed"
        );
        Ok(())
    }

    async fn fetch_rows(&self, filter: &QueryFilter) -> Result<Vec<Row>> {
        let (patterns, from, to) = bind_values(filter);
        let params = param_refs(&patterns, &from, &to);

        let pg_rows = self.client.query(&self.select_sql, &params).await?;
        convert_rows(&pg_rows)
    }
}

/// `CALL proc($1, ..., $9)`
fn refresh_statement(procedure: &str) -> String {
    format!("CALL {procedure}($1, $2, $3, $4, $5, $6, $7, $8::int4, $9::int4)")
}

/// Filtered select; field columns come from [`FilterField::column`]
fn select_statement(view: &str, month_column: &str) -> String {
    let conditions: Vec<String> = FilterField::ALL
        .iter()
        .enumerate()
        .map(|(i, field)| format!("{} LIKE ${}", field.column(), i + 1))
        .collect();
    format!(
        "SELECT * FROM {view} WHERE {} AND {month_column} BETWEEN $8::int4 AND $9::int4",
        conditions.join(" AND ")
    )
}

fn bind_values(filter: &QueryFilter) -> ([String; 7], i32, i32) {
    let patterns = filter.patterns().map(str::to_string);
    // Month serials are validated to 2000..=2099 so they always fit.
    (patterns, filter.from_month as i32, filter.to_month as i32)
}

fn param_refs<'a>(
    patterns: &'a [String; 7],
    from: &'a i32,
    to: &'a i32,
) -> Vec<&'a (dyn ToSql + Sync)> {
    let mut params: Vec<&(dyn ToSql + Sync)> = patterns
        .iter()
        .map(|p| p as &(dyn ToSql + Sync))
        .collect();
    params.push(from);
    params.push(to);
    params
}

/// Converts driver rows; the schema is built once from the first row
fn convert_rows(pg_rows: &[tokio_postgres::Row]) -> Result<Vec<Row>> {
    let Some(first) = pg_rows.first() else {
        return Ok(Vec::new());
    };

    let schema = Arc::new(RowSchema::new(
        first
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect(),
    ));

    pg_rows
        .iter()
        .map(|pg_row| {
            let values = pg_row
                .columns()
                .iter()
                .enumerate()
                .map(|(idx, column)| convert_cell(pg_row, idx, column.name(), column.type_()))
                .collect::<Result<Vec<CellValue>>>()?;
            Row::new(schema.clone(), values).map_err(TradexError::Other)
        })
        .collect()
}

fn convert_cell(row: &tokio_postgres::Row, idx: usize, name: &str, ty: &Type) -> Result<CellValue> {
    let decoded: std::result::Result<CellValue, tokio_postgres::Error> = match *ty {
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            row.try_get::<_, Option<String>>(idx).map(CellValue::from)
        }
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)
            .map(|v| v.map(i64::from).into()),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)
            .map(|v| v.map(i64::from).into()),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx).map(CellValue::from),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)
            .map(|v| v.map(f64::from).into()),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx).map(CellValue::from),
        Type::NUMERIC => row
            .try_get::<_, Option<Decimal>>(idx)
            .map(|v| v.map_or(CellValue::Null, CellValue::Decimal)),
        Type::BOOL => row
            .try_get::<_, Option<bool>>(idx)
            .map(|v| v.map_or(CellValue::Null, CellValue::Bool)),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)
            .map(|v| v.map_or(CellValue::Null, CellValue::Date)),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)
            .map(|v| v.map_or(CellValue::Null, CellValue::DateTime)),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)
            .map(|v| v.map_or(CellValue::Null, CellValue::Timestamp)),
        _ => {
            return Ok(row
                .try_get::<_, Option<String>>(idx)
                .map(CellValue::from)
                .unwrap_or(CellValue::Null))
        }
    };

    decoded.map_err(|_| {
        TradexError::Query(QueryError::UnsupportedColumn {
            column: name.to_string(),
            type_name: ty.name().to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_statement() {
        assert_eq!(
            refresh_statement("refresh_trade_summary"),
            "CALL refresh_trade_summary($1, $2, $3, $4, $5, $6, $7, $8::int4, $9::int4)"
        );
    }

    #[test]
    fn test_select_statement() {
        let sql = select_statement("trade_summary", "month_serial");
        assert!(sql.starts_with("SELECT * FROM trade_summary WHERE hs_code LIKE $1 AND product LIKE $2"));
        assert!(sql.contains("foreign_party LIKE $7"));
        assert!(sql.ends_with("month_serial BETWEEN $8::int4 AND $9::int4"));
    }

    #[test]
    fn test_bind_values_order() {
        let filter = QueryFilter {
            hs_code: "01".to_string(),
            product: "%".to_string(),
            exporter: "ACME".to_string(),
            port: "%".to_string(),
            iec: "%".to_string(),
            country: "US".to_string(),
            foreign_party: "%".to_string(),
            from_month: 202401,
            to_month: 202403,
        };
        let (patterns, from, to) = bind_values(&filter);
        assert_eq!(patterns[0], "01");
        assert_eq!(patterns[2], "ACME");
        assert_eq!(patterns[5], "US");
        assert_eq!((from, to), (202401, 202403));
        assert_eq!(param_refs(&patterns, &from, &to).len(), 9);
    }

    #[test]
    fn test_convert_no_rows() {
        assert!(convert_rows(&[]).unwrap().is_empty());
    }
}
