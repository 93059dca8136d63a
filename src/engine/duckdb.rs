//! DuckDB engine implementation.
//!
//! Provides the `DuckDbEngine` struct that implements the `AnalyticalEngine`
//! trait using the in-process `duckdb` crate. DuckDB calls block, so they
//! run on tokio's blocking pool.

use crate::config::EngineConfig;
use crate::engine::{
    quote_ident, AnalyticalEngine, ColumnInfo, EngineBackend, EngineConnection, QueryResult, Row,
    Value,
};
use crate::error::{CellQueryError, Result};
use ::duckdb::types::ValueRef;
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, warn};

/// An in-process DuckDB database.
///
/// Holds a root connection; every `connect` clones it into a new
/// connection to the same database.
#[derive(Clone)]
pub struct DuckDbEngine {
    root: Arc<Mutex<::duckdb::Connection>>,
    max_rows: Option<usize>,
}

impl std::fmt::Debug for DuckDbEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbEngine")
            .field("max_rows", &self.max_rows)
            .finish()
    }
}

impl DuckDbEngine {
    /// Opens the database at `config.path`, or an in-memory one.
    pub fn open(config: &EngineConfig) -> Result<Self> {
        let conn = match config.path.as_deref() {
            None | Some(":memory:") => ::duckdb::Connection::open_in_memory(),
            Some(path) => ::duckdb::Connection::open(path),
        }
        .map_err(|e| CellQueryError::engine(format!("Failed to open DuckDB: {e}")))?;

        debug!("Opened DuckDB ({})", config.path.as_deref().unwrap_or(":memory:"));
        Ok(Self {
            root: Arc::new(Mutex::new(conn)),
            max_rows: config.max_rows,
        })
    }

    /// Opens an in-memory database that keeps every row.
    pub fn in_memory() -> Result<Self> {
        Self::open(&EngineConfig::default())
    }

    fn clone_connection(&self) -> Result<::duckdb::Connection> {
        let root = self
            .root
            .lock()
            .map_err(|_| CellQueryError::internal("DuckDB root connection poisoned"))?;
        root.try_clone()
            .map_err(|e| CellQueryError::engine(format!("Failed to connect: {e}")))
    }

    async fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&::duckdb::Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.clone_connection()?;
        tokio::task::spawn_blocking(move || f(&conn))
            .await
            .map_err(|e| CellQueryError::internal(format!("DuckDB task failed: {e}")))?
    }
}

#[async_trait]
impl AnalyticalEngine for DuckDbEngine {
    async fn connect(&self) -> Result<Box<dyn EngineConnection>> {
        Ok(Box::new(DuckDbConnection {
            conn: Some(self.clone_connection()?),
            max_rows: self.max_rows,
        }))
    }

    async fn load_csv(&self, table: &str, path: &Path) -> Result<()> {
        let sql = format!(
            "CREATE OR REPLACE TABLE {} AS SELECT * FROM read_csv_auto('{}')",
            quote_ident(table),
            path.display().to_string().replace('\'', "''")
        );
        debug!("Loading {} into {}", path.display(), table);
        self.execute_batch(&sql).await
    }

    async fn execute_batch(&self, sql: &str) -> Result<()> {
        let sql = sql.to_string();
        self.with_connection(move |conn| {
            conn.execute_batch(&sql)
                .map_err(|e| CellQueryError::engine(e.to_string()))
        })
        .await
    }

    fn backend(&self) -> EngineBackend {
        EngineBackend::DuckDb
    }
}

/// One DuckDB connection, closed by dropping it.
struct DuckDbConnection {
    conn: Option<::duckdb::Connection>,
    max_rows: Option<usize>,
}

#[async_trait]
impl EngineConnection for DuckDbConnection {
    async fn query(&mut self, sql: &str) -> Result<QueryResult> {
        let conn = self
            .conn
            .take()
            .ok_or_else(|| CellQueryError::engine("Connection is closed"))?;
        let sql = sql.to_string();
        let max_rows = self.max_rows;

        let (conn, result) = tokio::task::spawn_blocking(move || {
            let result = run_query(&conn, &sql, max_rows);
            (conn, result)
        })
        .await
        .map_err(|e| CellQueryError::internal(format!("DuckDB task failed: {e}")))?;

        self.conn = Some(conn);
        result
    }

    async fn close(self: Box<Self>) -> Result<()> {
        if let Some(conn) = self.conn {
            conn.close()
                .map_err(|(_, e)| CellQueryError::engine(format!("Failed to close: {e}")))?;
        }
        Ok(())
    }
}

fn run_query(
    conn: &::duckdb::Connection,
    sql: &str,
    max_rows: Option<usize>,
) -> Result<QueryResult> {
    let start = Instant::now();
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| CellQueryError::engine(e.to_string()))?;
    let mut rows = stmt
        .query([])
        .map_err(|e| CellQueryError::engine(e.to_string()))?;

    let columns: Vec<ColumnInfo> = match rows.as_ref() {
        Some(stmt) => stmt
            .column_names()
            .into_iter()
            .enumerate()
            .map(|(i, name)| ColumnInfo::new(name, stmt.column_type(i).to_string()))
            .collect(),
        None => Vec::new(),
    };

    let mut out: Vec<Row> = Vec::new();
    while let Some(row) = rows
        .next()
        .map_err(|e| CellQueryError::engine(e.to_string()))?
    {
        out.push((0..columns.len()).map(|i| convert_value(row, i)).collect());
    }

    let result = QueryResult::with_data(columns, out)
        .truncated(max_rows)
        .with_execution_time(start.elapsed());
    if let Some(warning) = result.truncation_warning() {
        warn!("{}", warning);
    }
    debug!(
        "DuckDB returned {} rows in {:?}",
        result.row_count, result.execution_time
    );
    Ok(result)
}

/// Converts a single column value from a DuckDB row to our Value type.
fn convert_value(row: &::duckdb::Row<'_>, index: usize) -> Value {
    let value = match row.get_ref(index) {
        Ok(v) => v,
        Err(_) => return Value::Null,
    };

    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(v) => Value::Bool(v),
        ValueRef::TinyInt(v) => Value::Int(v.into()),
        ValueRef::SmallInt(v) => Value::Int(v.into()),
        ValueRef::Int(v) => Value::Int(v.into()),
        ValueRef::BigInt(v) => Value::Int(v),
        ValueRef::HugeInt(v) => i64::try_from(v)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::String(v.to_string())),
        ValueRef::UTinyInt(v) => Value::Int(v.into()),
        ValueRef::USmallInt(v) => Value::Int(v.into()),
        ValueRef::UInt(v) => Value::Int(v.into()),
        ValueRef::UBigInt(v) => i64::try_from(v)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::String(v.to_string())),
        ValueRef::Float(v) => Value::Float(v.into()),
        ValueRef::Double(v) => Value::Float(v),
        ValueRef::Decimal(v) => v
            .to_string()
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or_else(|_| Value::String(v.to_string())),
        ValueRef::Text(v) => Value::String(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => Value::Bytes(v.to_vec()),
        ValueRef::Date32(_) => row
            .get::<_, chrono::NaiveDate>(index)
            .map(|d| Value::String(d.to_string()))
            .unwrap_or(Value::Null),
        ValueRef::Timestamp(..) => row
            .get::<_, chrono::NaiveDateTime>(index)
            .map(|t| Value::String(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
            .unwrap_or(Value::Null),
        ValueRef::Time64(..) => row
            .get::<_, chrono::NaiveTime>(index)
            .map(|t| Value::String(t.to_string()))
            .unwrap_or(Value::Null),
        other => Value::String(format!("{other:?}")),
    }
}
