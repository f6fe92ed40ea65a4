//! Raw connection backed by an sqlx SQLite pool.
//!
//! Stands in for the warehouse in integration tests and local dry runs: it
//! only ever receives the literal SQL produced by the executor.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use snowodbc_grammar::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Either, Row as _, SqlitePool, TypeInfo, ValueRef};

use crate::driver::{DriverError, ErrorInfo, PrepareMode, RawConnection, RawStatement, Row};

const SQLITE_BUSY_TIMEOUT_MS: u64 = 5_000;
const GENERAL_ERROR: &str = "HY000";
const LINK_FAILURE: &str = "08S01";

#[derive(Clone, Debug)]
pub struct SqlxConnection {
    pool: SqlitePool,
}

impl SqlxConnection {
    /// Opens (or creates) the database at `url`, e.g. `sqlite::memory:`.
    pub async fn connect(url: &str) -> Result<Self, DriverError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(driver_error)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_millis(SQLITE_BUSY_TIMEOUT_MS));

        // Every pooled connection to an in-memory URL gets its own database.
        let max_connections = if url.contains(":memory:") || url.contains("mode=memory") {
            1
        } else {
            4
        };
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(driver_error)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RawConnection for SqlxConnection {
    async fn prepare(
        &self,
        sql: &str,
        mode: PrepareMode,
    ) -> Result<Box<dyn RawStatement>, DriverError> {
        Ok(Box::new(SqlxStatement {
            pool: self.pool.clone(),
            sql: sql.to_owned(),
            mode,
            rows: Vec::new(),
            affected: 0,
        }))
    }
}

struct SqlxStatement {
    pool: SqlitePool,
    sql: String,
    mode: PrepareMode,
    rows: Vec<Row>,
    affected: u64,
}

#[async_trait]
impl RawStatement for SqlxStatement {
    async fn execute(&mut self) -> Result<bool, DriverError> {
        let mut rows = Vec::new();
        let mut affected = 0;
        {
            let mut stream = sqlx::query(&self.sql)
                .persistent(self.mode == PrepareMode::Prepared)
                .fetch_many(&self.pool);
            while let Some(step) = stream.try_next().await.map_err(driver_error)? {
                match step {
                    Either::Left(done) => affected += done.rows_affected(),
                    Either::Right(row) => rows.push(convert_row(&row)?),
                }
            }
        }
        self.rows = rows;
        self.affected = affected;
        Ok(true)
    }

    fn error_info(&self) -> ErrorInfo {
        ErrorInfo::ok()
    }

    async fn fetch_all(&mut self) -> Result<Vec<Row>, DriverError> {
        Ok(std::mem::take(&mut self.rows))
    }

    fn rows_affected(&self) -> u64 {
        self.affected
    }
}

fn convert_row(row: &SqliteRow) -> Result<Row, DriverError> {
    let mut columns = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(idx).map_err(driver_error)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let storage = raw.type_info().name().to_ascii_uppercase();
            match storage.as_str() {
                "INTEGER" | "BOOLEAN" => Value::Int(row.try_get_unchecked::<i64, _>(idx).map_err(driver_error)?),
                "REAL" => Value::Float(row.try_get_unchecked::<f64, _>(idx).map_err(driver_error)?),
                "BLOB" => {
                    let bytes = row.try_get_unchecked::<Vec<u8>, _>(idx).map_err(driver_error)?;
                    Value::Text(String::from_utf8_lossy(&bytes).into_owned())
                }
                _ => Value::Text(row.try_get_unchecked::<String, _>(idx).map_err(driver_error)?),
            }
        };
        columns.push((column.name().to_owned(), value));
    }
    Ok(Row::new(columns))
}

fn driver_error(err: sqlx::Error) -> DriverError {
    match &err {
        sqlx::Error::Database(db) => {
            let code = db.code().map(|code| code.into_owned()).unwrap_or_default();
            DriverError::new(GENERAL_ERROR, format!("{} (code {code})", db.message()))
        }
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            DriverError::new(LINK_FAILURE, err.to_string())
        }
        _ => DriverError::new(GENERAL_ERROR, err.to_string()),
    }
}
