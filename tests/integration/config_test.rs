//! Config file to running engine.

use cellquery::config::Config;
use cellquery::dsl::{PrqlCompiler, SqlDialect};
use cellquery::engine::{self, AnalyticalEngine, EngineBackend, Value};
use cellquery::query::{run, QueryPipeline};

#[tokio::test]
async fn test_sqlite_file_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("cells.db");
    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        format!(
            "[engine]\nbackend = \"sqlite\"\npath = \"{}\"\nmax_rows = 2\n\n[compiler]\ndialect = \"sqlite\"\n\n[assembler]\nbase_table = \"numbers\"\n",
            db_path.display()
        ),
    )
    .unwrap();

    let config = Config::load_from_file(&config_path).unwrap();
    assert_eq!(config.engine.backend, EngineBackend::Sqlite);
    assert_eq!(config.compiler.dialect, SqlDialect::Sqlite);

    let engine = engine::open(&config.engine).await.unwrap();
    engine
        .execute_batch(
            "CREATE TABLE numbers (n INTEGER); INSERT INTO numbers VALUES (1), (2), (3);",
        )
        .await
        .unwrap();

    let pipeline = QueryPipeline::new(PrqlCompiler, engine, config.assemble_options());
    let outcome = pipeline
        .execute("SQL { select n from PrevTable order by n }")
        .await;

    let result = outcome.result().unwrap();
    assert_eq!(result.rows, vec![vec![Value::Int(1)], vec![Value::Int(2)]]);
    assert!(result.was_truncated);
    assert_eq!(result.total_rows, Some(3));
    assert!(db_path.exists());
}

#[tokio::test]
async fn test_default_config_opens_duckdb() {
    let config = Config::default();
    let engine = engine::open(&config.engine).await.unwrap();
    assert_eq!(engine.backend(), EngineBackend::DuckDb);
}

#[tokio::test]
async fn test_default_config_returns_every_row() {
    let config = Config::default();
    assert_eq!(config.engine.max_rows, None);

    let engine = engine::open(&config.engine).await.unwrap();
    let outcome = run("SELECT * FROM range(1500)", engine.as_ref()).await;

    let result = outcome.result().unwrap();
    assert_eq!(result.row_count, 1500);
    assert!(!result.was_truncated);
}

#[test]
fn test_malformed_config_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    std::fs::write(&config_path, "[engine\nbackend = ").unwrap();

    let err = Config::load_from_file(&config_path).unwrap_err();
    assert_eq!(err.category(), "Configuration Error");
    assert!(err.to_string().contains("config.toml"));
}
