//! End-to-end tests against in-memory DuckDB.

use cellquery::assembler::AssembleOptions;
use cellquery::dsl::PrqlCompiler;
use cellquery::engine::{AnalyticalEngine, DuckDbEngine, QueryResult, Value};
use cellquery::query::{run_legacy, QueryPipeline, QuerySlot, RunOutcome};
use serde_json::json;

const SEED: &str = "
CREATE TABLE people (name VARCHAR, age INTEGER, city VARCHAR);
INSERT INTO people VALUES
    ('ada', 36, 'London'),
    ('grace', 45, 'New York'),
    ('linus', 28, 'Helsinki'),
    ('barbara', 52, 'New York');
CREATE TABLE sales AS SELECT * FROM (VALUES ('a', 'x', 1), ('a', 'y', 2), ('b', 'x', 3)) v(k, c, n);
";

async fn seeded_engine() -> DuckDbEngine {
    let engine = DuckDbEngine::in_memory().unwrap();
    engine.execute_batch(SEED).await.unwrap();
    engine
}

async fn pipeline(options: AssembleOptions) -> QueryPipeline<PrqlCompiler, DuckDbEngine> {
    QueryPipeline::new(PrqlCompiler, Box::new(seeded_engine().await), options)
}

fn success(outcome: RunOutcome) -> QueryResult {
    match outcome {
        RunOutcome::Success(result) => result,
        other => panic!("Expected Success, got {other:?}"),
    }
}

fn sorted_column(result: &QueryResult, index: usize) -> Vec<String> {
    let mut values: Vec<String> = result
        .rows
        .iter()
        .map(|row| row[index].to_display_string())
        .collect();
    values.sort();
    values
}

#[tokio::test]
async fn test_prql_only_script() {
    let p = pipeline(AssembleOptions::default()).await;
    let result = success(p.execute("from people\nfilter age > 30\nselect {name}").await);

    assert_eq!(result.column_names(), vec!["name"]);
    assert_eq!(sorted_column(&result, 0), vec!["ada", "barbara", "grace"]);
}

#[tokio::test]
async fn test_prql_then_sql_block() {
    let p = pipeline(AssembleOptions::default()).await;
    let script = "from people\nfilter city == 'New York'\n\
                  SQL { select name, age * 2 as double_age from AI_Table }";
    let result = success(p.execute(script).await);

    assert_eq!(result.column_names(), vec!["name", "double_age"]);
    assert_eq!(sorted_column(&result, 0), vec!["barbara", "grace"]);
    assert_eq!(sorted_column(&result, 1), vec!["104", "90"]);
}

#[tokio::test]
async fn test_sql_then_prql() {
    let p = pipeline(AssembleOptions::default()).await;
    let result = success(
        p.execute("SQL { select * from people where age < 50 }\nsort age\ntake 2")
            .await,
    );

    assert_eq!(result.row_count, 2);
    assert_eq!(sorted_column(&result, 0), vec!["ada", "linus"]);
}

#[tokio::test]
async fn test_pivot_block() {
    let p = pipeline(AssembleOptions::default()).await;
    let result = success(p.execute("from sales\nPIVOT { ON c USING sum(n) GROUP BY k }").await);

    assert_eq!(result.column_names(), vec!["k", "x", "y"]);
    let mut rows = result.rows.clone();
    rows.sort_by_key(|row| row[0].to_display_string());
    assert_eq!(rows[0], vec![Value::from("a"), Value::Int(1), Value::Int(2)]);
    assert_eq!(rows[1], vec![Value::from("b"), Value::Int(3), Value::Null]);
}

#[tokio::test]
async fn test_base_table_feeds_first_block() {
    let options = AssembleOptions {
        base_table: Some("people".to_string()),
        ..AssembleOptions::default()
    };
    let p = pipeline(options).await;
    let result = success(p.execute("SQL { select count(*) as n from PrevTable }").await);

    assert_eq!(result.rows, vec![vec![Value::Int(4)]]);
}

#[tokio::test]
async fn test_nested_braces_in_sql_block() {
    let p = pipeline(AssembleOptions::default()).await;
    let result = success(
        p.execute("from people\nSQL { select name, {'city': city} as place from AI_Table }")
            .await,
    );

    assert_eq!(result.row_count, 4);
    assert_eq!(result.column_names(), vec!["name", "place"]);
}

#[tokio::test]
async fn test_zero_rows_is_success_with_schema() {
    let p = pipeline(AssembleOptions::default()).await;
    let outcome = p.execute("from people\nfilter age > 1000").await;

    let result = success(outcome);
    assert!(result.is_empty());
    assert_eq!(result.column_names(), vec!["name", "age", "city"]);
}

#[tokio::test]
async fn test_engine_error_is_execution_failure() {
    let p = pipeline(AssembleOptions::default()).await;
    let outcome = p.execute("SQL { select * from missing_table }").await;

    match outcome {
        RunOutcome::ExecutionFailed(msg) => assert!(msg.contains("missing_table")),
        other => panic!("Expected ExecutionFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_read_only_mode_rejects_mutation() {
    let options = AssembleOptions {
        read_only_sql_blocks: true,
        ..AssembleOptions::default()
    };
    let p = pipeline(options).await;
    let outcome = p.execute("from people\nSQL { delete from people }").await;

    assert!(matches!(outcome, RunOutcome::CompileFailed(_)));
    let count = success(p.execute("from people\naggregate {n = count this}").await);
    assert_eq!(count.rows, vec![vec![Value::Int(4)]]);
}

#[tokio::test]
async fn test_run_legacy_rows() {
    let engine = seeded_engine().await;
    let (rows, result) =
        run_legacy("SELECT name, age FROM people WHERE name = 'ada'", &engine).await;

    let rows = rows.unwrap();
    assert_eq!(rows[0]["name"], json!("ada"));
    assert_eq!(rows[0]["age"], json!(36));
    assert_eq!(result.unwrap().row_count, 1);
}

#[tokio::test]
async fn test_slot_publishes_latest_run() {
    let engine = seeded_engine().await;
    let slot = QuerySlot::new();
    let options = AssembleOptions::default();

    let first = slot
        .run("from people\ntake 1", &PrqlCompiler, &engine, &options)
        .await;
    assert!(first.unwrap().is_success());

    let stale = slot.begin();
    let fresh = slot
        .run("from people\ntake 2", &PrqlCompiler, &engine, &options)
        .await
        .unwrap();
    assert_eq!(fresh.result().unwrap().row_count, 2);
    assert!(stale.is_cancelled());
    assert_eq!(slot.finish(stale, fresh.clone()), None);
}

#[tokio::test]
async fn test_load_csv_then_query() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("InputTable.csv");
    std::fs::write(&path, "product,price\nwidget,2.5\ngadget,10.125\n").unwrap();

    let engine = DuckDbEngine::in_memory().unwrap();
    engine.load_csv("InputTable", &path).await.unwrap();

    let p = QueryPipeline::new(PrqlCompiler, Box::new(engine), AssembleOptions::default());
    let script = "from InputTable\n\
                  SQL { select product, price * 2 as doubled from AI_Table order by product }";
    let result = success(p.execute(script).await);

    assert_eq!(result.row_count, 2);
    assert_eq!(sorted_column(&result, 0), vec!["gadget", "widget"]);
}
