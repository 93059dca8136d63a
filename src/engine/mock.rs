//! Mock engine for testing.
//!
//! Returns scripted results without touching a real database, and counts
//! connections so tests can check that every query releases its own.

use super::{AnalyticalEngine, ColumnInfo, EngineBackend, EngineConnection, QueryResult, Value};
use crate::error::{CellQueryError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
struct Rules {
    responses: Vec<(String, QueryResult)>,
    failures: Vec<String>,
    delays: Vec<(String, Duration)>,
}

impl Rules {
    fn response_for(&self, sql: &str) -> Option<QueryResult> {
        self.responses
            .iter()
            .find(|(marker, _)| sql.contains(marker.as_str()))
            .map(|(_, result)| result.clone())
    }

    fn failure_for(&self, sql: &str) -> Option<&str> {
        self.failures
            .iter()
            .find(|marker| sql.contains(marker.as_str()))
            .map(String::as_str)
    }

    fn delay_for(&self, sql: &str) -> Option<Duration> {
        self.delays
            .iter()
            .find(|(marker, _)| sql.contains(marker.as_str()))
            .map(|(_, d)| *d)
    }
}

#[derive(Debug, Default)]
struct Stats {
    connects: AtomicUsize,
    closes: AtomicUsize,
    queries: Mutex<Vec<String>>,
    loaded: Mutex<Vec<String>>,
}

/// A mock engine that returns predefined results.
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    rules: Arc<Rules>,
    stats: Arc<Stats>,
}

impl MockEngine {
    /// Creates a mock engine with no scripted behaviour.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `result` for any query containing `marker`.
    pub fn with_result(mut self, marker: impl Into<String>, result: QueryResult) -> Self {
        Arc::make_mut(&mut self.rules)
            .responses
            .push((marker.into(), result));
        self
    }

    /// Fails any query or batch containing `marker`.
    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.rules).failures.push(marker.into());
        self
    }

    /// Sleeps for `delay` before answering any query containing `marker`.
    pub fn delayed_on(mut self, marker: impl Into<String>, delay: Duration) -> Self {
        Arc::make_mut(&mut self.rules)
            .delays
            .push((marker.into(), delay));
        self
    }

    /// Number of connections handed out.
    pub fn connects(&self) -> usize {
        self.stats.connects.load(Ordering::SeqCst)
    }

    /// Number of connections closed.
    pub fn closes(&self) -> usize {
        self.stats.closes.load(Ordering::SeqCst)
    }

    /// Every SQL text sent to a connection, in order.
    pub fn queries(&self) -> Vec<String> {
        self.stats
            .queries
            .lock()
            .map(|q| q.clone())
            .unwrap_or_default()
    }

    /// Names of tables loaded through `load_csv`.
    pub fn loaded_tables(&self) -> Vec<String> {
        self.stats
            .loaded
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AnalyticalEngine for MockEngine {
    async fn connect(&self) -> Result<Box<dyn EngineConnection>> {
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            rules: Arc::clone(&self.rules),
            stats: Arc::clone(&self.stats),
        }))
    }

    async fn load_csv(&self, table: &str, _path: &Path) -> Result<()> {
        if let Ok(mut loaded) = self.stats.loaded.lock() {
            loaded.push(table.to_string());
        }
        Ok(())
    }

    async fn execute_batch(&self, sql: &str) -> Result<()> {
        match self.rules.failure_for(sql) {
            Some(marker) => Err(CellQueryError::engine(format!("mock failure on `{marker}`"))),
            None => Ok(()),
        }
    }

    fn backend(&self) -> EngineBackend {
        EngineBackend::DuckDb
    }
}

struct MockConnection {
    rules: Arc<Rules>,
    stats: Arc<Stats>,
}

#[async_trait]
impl EngineConnection for MockConnection {
    async fn query(&mut self, sql: &str) -> Result<QueryResult> {
        if let Ok(mut queries) = self.stats.queries.lock() {
            queries.push(sql.to_string());
        }

        if let Some(delay) = self.rules.delay_for(sql) {
            tokio::time::sleep(delay).await;
        }

        if let Some(marker) = self.rules.failure_for(sql) {
            return Err(CellQueryError::engine(format!("mock failure on `{marker}`")));
        }

        if let Some(result) = self.rules.response_for(sql) {
            return Ok(result);
        }

        let sql_upper = sql.trim_start().to_uppercase();
        if sql_upper.starts_with("SELECT") || sql_upper.starts_with("WITH") {
            Ok(QueryResult::with_data(
                vec![ColumnInfo::new("result", "VARCHAR")],
                vec![vec![Value::String(format!("Mock result for: {sql}"))]],
            )
            .with_execution_time(Duration::from_millis(1)))
        } else {
            Ok(QueryResult::new().with_execution_time(Duration::from_millis(1)))
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(engine: &MockEngine, sql: &str) -> Result<QueryResult> {
        let mut conn = engine.connect().await?;
        let result = conn.query(sql).await;
        conn.close().await?;
        result
    }

    #[tokio::test]
    async fn test_mock_select() {
        let engine = MockEngine::new();
        let result = run(&engine, "SELECT 1").await.unwrap();
        assert_eq!(result.row_count, 1);
        assert_eq!(result.rows[0][0], Value::from("Mock result for: SELECT 1"));
        assert_eq!(engine.connects(), 1);
        assert_eq!(engine.closes(), 1);
    }

    #[tokio::test]
    async fn test_mock_non_select_is_empty() {
        let engine = MockEngine::new();
        let result = run(&engine, "PIVOT t ON a").await.unwrap();
        assert!(result.is_empty());
        assert!(result.columns.is_empty());
    }

    #[tokio::test]
    async fn test_scripted_result_and_failure() {
        let scripted = QueryResult::with_data(
            vec![ColumnInfo::new("n", "INTEGER")],
            vec![vec![Value::Int(7)]],
        );
        let engine = MockEngine::new()
            .with_result("from_scripted", scripted.clone())
            .failing_on("boom");

        assert_eq!(run(&engine, "SELECT * FROM from_scripted").await.unwrap(), scripted);
        let err = run(&engine, "SELECT boom").await.unwrap_err();
        assert_eq!(err.to_string(), "Engine error: mock failure on `boom`");
        assert_eq!(engine.queries(), vec!["SELECT * FROM from_scripted", "SELECT boom"]);
    }

    #[tokio::test]
    async fn test_load_csv_records_table() {
        let engine = MockEngine::new();
        engine
            .load_csv("InputTable", Path::new("people.csv"))
            .await
            .unwrap();
        assert_eq!(engine.loaded_tables(), vec!["InputTable"]);
        assert_eq!(engine.connects(), 0);
    }

    #[tokio::test]
    async fn test_clones_share_stats() {
        let engine = MockEngine::new();
        let other = engine.clone();
        run(&other, "SELECT 1").await.unwrap();
        assert_eq!(engine.connects(), 1);
    }
}
