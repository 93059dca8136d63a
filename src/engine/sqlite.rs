//! SQLite engine implementation.
//!
//! Provides the `SqliteEngine` struct that implements the `AnalyticalEngine`
//! trait using sqlx. SQLite has no `PIVOT`, so pivot fragments fail here
//! with an ordinary engine error.

use crate::config::EngineConfig;
use crate::engine::{
    quote_ident, AnalyticalEngine, ColumnInfo, EngineBackend, EngineConnection, QueryResult, Row,
    Value,
};
use crate::error::{CellQueryError, Result};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as SqlxColumn, Executor, Row as SqlxRow, Sqlite, Statement, TypeInfo, ValueRef};
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// An SQLite database behind a single-connection pool.
///
/// One connection keeps `:memory:` databases alive and shared between
/// queries.
#[derive(Debug, Clone)]
pub struct SqliteEngine {
    pool: SqlitePool,
    max_rows: Option<usize>,
}

impl SqliteEngine {
    /// Opens the database at `config.path`, or an in-memory one.
    pub async fn open(config: &EngineConfig) -> Result<Self> {
        let options = match config.path.as_deref() {
            None | Some(":memory:") => SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| CellQueryError::engine(format!("Invalid SQLite options: {e}")))?,
            Some(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true),
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| CellQueryError::engine(format!("Failed to open SQLite: {e}")))?;

        debug!("Opened SQLite ({})", config.path.as_deref().unwrap_or(":memory:"));
        Ok(Self {
            pool,
            max_rows: config.max_rows,
        })
    }

    /// Opens an in-memory database that keeps every row.
    pub async fn in_memory() -> Result<Self> {
        Self::open(&EngineConfig::default()).await
    }
}

#[async_trait]
impl AnalyticalEngine for SqliteEngine {
    async fn connect(&self) -> Result<Box<dyn EngineConnection>> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| CellQueryError::engine(format!("Failed to connect: {e}")))?;
        Ok(Box::new(SqliteConnection {
            conn,
            max_rows: self.max_rows,
        }))
    }

    async fn load_csv(&self, table: &str, path: &Path) -> Result<()> {
        let owned = path.to_path_buf();
        let (headers, records) = tokio::task::spawn_blocking(move || read_csv(&owned))
            .await
            .map_err(|e| CellQueryError::internal(format!("CSV task failed: {e}")))??;

        if headers.is_empty() {
            return Err(CellQueryError::io(format!(
                "{} has no header row",
                path.display()
            )));
        }

        let columns: Vec<String> = headers.iter().map(|h| quote_ident(h)).collect();
        let create = format!(
            "DROP TABLE IF EXISTS {t}; CREATE TABLE {t} ({cols})",
            t = quote_ident(table),
            cols = columns
                .iter()
                .map(|c| format!("{c} TEXT"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            columns.join(", "),
            vec!["?"; columns.len()].join(", ")
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CellQueryError::engine(e.to_string()))?;
        let conn: &mut sqlx::SqliteConnection = &mut tx;
        conn.execute(sqlx::raw_sql(&create))
            .await
            .map_err(|e| CellQueryError::engine(e.to_string()))?;

        for record in &records {
            let mut query = sqlx::query(&insert);
            for i in 0..columns.len() {
                let field = record.get(i).filter(|s| !s.is_empty()).cloned();
                query = query.bind(field);
            }
            query
                .execute(&mut *conn)
                .await
                .map_err(|e| CellQueryError::engine(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| CellQueryError::engine(e.to_string()))?;
        debug!("Loaded {} rows into {}", records.len(), table);
        Ok(())
    }

    async fn execute_batch(&self, sql: &str) -> Result<()> {
        sqlx::raw_sql(sql)
            .execute(&self.pool)
            .await
            .map_err(|e| CellQueryError::engine(e.to_string()))?;
        Ok(())
    }

    fn backend(&self) -> EngineBackend {
        EngineBackend::Sqlite
    }
}

/// A connection checked out of the pool; dropping it returns it.
struct SqliteConnection {
    conn: PoolConnection<Sqlite>,
    max_rows: Option<usize>,
}

#[async_trait]
impl EngineConnection for SqliteConnection {
    async fn query(&mut self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();

        // Preparing first gives the schema even when no rows come back.
        let columns: Vec<ColumnInfo> = {
            let stmt = (&mut *self.conn)
                .prepare(sql)
                .await
                .map_err(|e| CellQueryError::engine(e.to_string()))?;
            stmt.columns()
                .iter()
                .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                .collect()
        };

        let rows = sqlx::query(sql)
            .fetch_all(&mut *self.conn)
            .await
            .map_err(|e| CellQueryError::engine(e.to_string()))?;

        if let Some(cap) = self.max_rows.filter(|&cap| rows.len() > cap) {
            warn!("Query returned {} rows, truncating to {} rows", rows.len(), cap);
        }

        let rows: Vec<Row> = rows.iter().map(convert_row).collect();
        Ok(QueryResult::with_data(columns, rows)
            .truncated(self.max_rows)
            .with_execution_time(start.elapsed()))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        drop(self.conn);
        Ok(())
    }
}

fn read_csv(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| CellQueryError::io(format!("Failed to read {}: {e}", path.display())))?;
    let headers = reader
        .headers()
        .map_err(|e| CellQueryError::io(e.to_string()))?
        .iter()
        .map(|s| s.to_string())
        .collect();
    let records = reader
        .records()
        .map(|r| {
            r.map(|rec| rec.iter().map(|s| s.to_string()).collect())
                .map_err(|e| CellQueryError::io(e.to_string()))
        })
        .collect::<Result<Vec<Vec<String>>>>()?;
    Ok((headers, records))
}

/// Converts a sqlx SqliteRow to our Row type.
fn convert_row(row: &SqliteRow) -> Row {
    (0..row.columns().len())
        .map(|i| convert_value(row, i))
        .collect()
}

/// Converts a single value, dispatching on its storage class.
fn convert_value(row: &SqliteRow, index: usize) -> Value {
    let storage = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return Value::Null,
    };

    match storage.as_str() {
        "INTEGER" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "REAL" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BLOB" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}
