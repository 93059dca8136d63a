//! Analytical engine abstraction for cellquery.
//!
//! Provides a trait-based interface over embedded engines, allowing
//! different backends to be used interchangeably. Every query runs on a
//! connection acquired for that query alone and closed afterwards.

mod duckdb;
mod mock;
mod sqlite;
mod types;

pub use self::duckdb::DuckDbEngine;
pub use mock::MockEngine;
pub use sqlite::SqliteEngine;
pub use types::{format_for_table, ColumnInfo, JsonRow, QueryResult, Row, Value};

use crate::config::EngineConfig;
use crate::error::Result;
use async_trait::async_trait;

/// Supported engine backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineBackend {
    #[default]
    DuckDb,
    Sqlite,
}

impl EngineBackend {
    /// Returns the backend as a string for display and config.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuckDb => "duckdb",
            Self::Sqlite => "sqlite",
        }
    }

    /// Parses a backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "duckdb" | "duck" => Some(Self::DuckDb),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Returns true if the backend understands `PIVOT` statements.
    pub fn supports_pivot(&self) -> bool {
        matches!(self, Self::DuckDb)
    }
}

/// Opens an engine for the given configuration.
///
/// This is the central factory function for engines.
pub async fn open(config: &EngineConfig) -> Result<Box<dyn AnalyticalEngine>> {
    match config.backend {
        EngineBackend::DuckDb => {
            let engine = DuckDbEngine::open(config)?;
            Ok(Box::new(engine))
        }
        EngineBackend::Sqlite => {
            let engine = SqliteEngine::open(config).await?;
            Ok(Box::new(engine))
        }
    }
}

/// An embedded engine that hands out connections.
#[async_trait]
pub trait AnalyticalEngine: Send + Sync {
    /// Acquires a fresh connection.
    async fn connect(&self) -> Result<Box<dyn EngineConnection>>;

    /// Creates (or replaces) `table` from a CSV file.
    async fn load_csv(&self, table: &str, path: &std::path::Path) -> Result<()>;

    /// Executes one or more statements that return no rows.
    async fn execute_batch(&self, sql: &str) -> Result<()>;

    /// Which backend this engine is.
    fn backend(&self) -> EngineBackend;
}

/// A single connection, used for exactly one query.
#[async_trait]
pub trait EngineConnection: Send {
    /// Runs `sql` and materializes every row plus the column schema.
    async fn query(&mut self, sql: &str) -> Result<QueryResult>;

    /// Releases the connection.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Quotes an identifier for use in generated DDL.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
