//! Fail-soft query execution.
//!
//! Every call acquires its own connection, runs one statement and closes
//! the connection again, whatever happened in between. Failures never
//! propagate: they are logged and folded into the returned outcome.

use crate::engine::{AnalyticalEngine, JsonRow, QueryResult};
use crate::error::{CompileError, Result};
use tracing::{debug, warn};

/// What became of one script.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The engine answered. Zero rows is still a success and keeps the
    /// column schema.
    Success(QueryResult),
    /// Assembly failed, so nothing was sent to the engine.
    CompileFailed(CompileError),
    /// Connecting, querying or closing failed.
    ExecutionFailed(String),
}

impl RunOutcome {
    /// Returns true for `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The result, if the engine answered.
    pub fn result(&self) -> Option<&QueryResult> {
        match self {
            Self::Success(result) => Some(result),
            _ => None,
        }
    }

    /// Human-readable failure message, if any.
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Success(_) => None,
            Self::CompileFailed(e) => Some(e.to_string()),
            Self::ExecutionFailed(msg) => Some(msg.clone()),
        }
    }

    /// Splits into `(rows as JSON objects, raw result)`; both `None` on
    /// failure.
    pub fn into_parts(self) -> (Option<Vec<JsonRow>>, Option<QueryResult>) {
        match self {
            Self::Success(result) => (Some(result.to_json_rows()), Some(result)),
            _ => (None, None),
        }
    }
}

/// Runs `sql` on a fresh connection.
///
/// Never fails: errors are logged with `warn!` and returned as
/// `RunOutcome::ExecutionFailed`.
pub async fn run<E: AnalyticalEngine + ?Sized>(sql: &str, engine: &E) -> RunOutcome {
    match execute(sql, engine).await {
        Ok(result) => {
            debug!(
                "Query returned {} rows in {:?}",
                result.row_count, result.execution_time
            );
            if let Some(warning) = result.truncation_warning() {
                warn!("{}", warning);
            }
            RunOutcome::Success(result)
        }
        Err(e) => {
            warn!("{}: {}", e.category(), e);
            RunOutcome::ExecutionFailed(e.message())
        }
    }
}

/// Same as [`run`], shaped as `(rows, result)` with both absent on failure.
pub async fn run_legacy<E: AnalyticalEngine + ?Sized>(
    sql: &str,
    engine: &E,
) -> (Option<Vec<JsonRow>>, Option<QueryResult>) {
    run(sql, engine).await.into_parts()
}

async fn execute<E: AnalyticalEngine + ?Sized>(sql: &str, engine: &E) -> Result<QueryResult> {
    let mut conn = engine.connect().await?;
    let result = conn.query(sql).await;
    let closed = conn.close().await;

    // A query error is more useful than the close error it may have caused.
    let result = result?;
    closed?;
    Ok(result)
}
