//! End-to-end tests against in-memory SQLite.

use cellquery::assembler::AssembleOptions;
use cellquery::dsl::{CompileOptions, PrqlCompiler, SqlDialect};
use cellquery::engine::{AnalyticalEngine, SqliteEngine, Value};
use cellquery::query::{QueryPipeline, RunOutcome};

fn sqlite_options() -> AssembleOptions {
    AssembleOptions {
        compile: CompileOptions::new(SqlDialect::Sqlite),
        ..AssembleOptions::default()
    }
}

async fn pipeline() -> QueryPipeline<PrqlCompiler, SqliteEngine> {
    let engine = SqliteEngine::in_memory().await.unwrap();
    engine
        .execute_batch(
            "CREATE TABLE people (name TEXT, age INTEGER);
             INSERT INTO people VALUES ('ada', 36), ('grace', 45), ('linus', 28);",
        )
        .await
        .unwrap();
    QueryPipeline::new(PrqlCompiler, Box::new(engine), sqlite_options())
}

#[tokio::test]
async fn test_prql_and_sql_block() {
    let p = pipeline().await;
    let outcome = p
        .execute("from people\nfilter age > 30\nSQL { select count(*) as n from AI_Table }")
        .await;

    let result = outcome.result().unwrap();
    assert_eq!(result.rows, vec![vec![Value::Int(2)]]);
}

#[tokio::test]
async fn test_pivot_fails_at_execution() {
    let p = pipeline().await;
    let outcome = p
        .execute("from people\nPIVOT { ON name USING sum(age) }")
        .await;

    assert!(matches!(outcome, RunOutcome::ExecutionFailed(_)));
}

#[tokio::test]
async fn test_zero_rows_keep_schema() {
    let p = pipeline().await;
    let outcome = p.execute("SQL { select name, age from people where age > 100 }").await;

    let result = outcome.result().unwrap();
    assert!(result.is_empty());
    assert_eq!(result.column_names(), vec!["name", "age"]);
}

#[tokio::test]
async fn test_csv_columns_are_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cities.csv");
    std::fs::write(&path, "city,population\nLondon,8800000\nOslo,700000\n").unwrap();

    let engine = SqliteEngine::in_memory().await.unwrap();
    engine.load_csv("cities", &path).await.unwrap();
    let p = QueryPipeline::new(PrqlCompiler, Box::new(engine), sqlite_options());

    let script = "from cities\nsort city\n\
                  SQL { select city, cast(population as integer) as pop from AI_Table }";
    let outcome = p.execute(script).await;
    let result = outcome.result().unwrap();
    assert_eq!(result.row_count, 2);
    assert!(result.rows.contains(&vec![Value::from("Oslo"), Value::Int(700000)]));
}
