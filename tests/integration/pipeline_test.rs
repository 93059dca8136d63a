//! Assembly tests against the real PRQL compiler.
//!
//! The engine is mocked here; these tests check the SQL that would be sent.

use cellquery::assembler::{compile_script, AssembleOptions};
use cellquery::chunk::{segment, FragmentKind};
use cellquery::dsl::{CompileOptions, DslCompiler, PrqlCompiler, SqlDialect};
use cellquery::engine::MockEngine;
use cellquery::error::CompileError;
use cellquery::query::{QueryPipeline, RunOutcome};
use cellquery::stages::{
    filter_query, merge_queries, table_view_query, upload_query, PivotSpec, PivotValue,
};
use pretty_assertions::assert_eq;

fn options() -> AssembleOptions {
    AssembleOptions::default()
}

fn prql(source: &str) -> String {
    PrqlCompiler
        .compile(source, &CompileOptions::new(SqlDialect::DuckDb))
        .unwrap()
}

#[test]
fn test_single_prql_fragment_matches_compiler() {
    let script = "from employees\ntake 10";
    let stmt = compile_script(script, &PrqlCompiler, &options()).unwrap();

    assert_eq!(stmt.sql(), prql(script));
    assert!(stmt.ctes().is_empty());
    assert!(stmt.sql().contains("LIMIT 10"));
}

#[test]
fn test_prql_then_sql_block() {
    let script = "from employees\ntake 10\nSQL { select * from AI_Table limit 1 }";
    let stmt = compile_script(script, &PrqlCompiler, &options()).unwrap();

    let expected = format!(
        "WITH table1 AS ({}), table2 AS (select * from table1 limit 1) SELECT * FROM table2",
        prql("from employees\ntake 10\n")
    );
    assert_eq!(stmt.sql(), expected);
    assert_eq!(stmt.final_alias(), Some("table2"));
}

#[test]
fn test_sql_then_pivot() {
    let stmt = compile_script(
        "SQL { select 1 }\nPIVOT { ON col USING sum(x) }",
        &PrqlCompiler,
        &options(),
    )
    .unwrap();

    assert_eq!(stmt.ctes()[0].body, "select 1");
    assert_eq!(stmt.ctes()[1].body, "PIVOT table1 ON col USING sum(x)");
    assert!(stmt.sql().ends_with("SELECT * FROM table2"));
}

#[test]
fn test_later_prql_fragment_reads_previous_cte() {
    let stmt = compile_script(
        "SQL { select * from people }\nsort name\ntake 2",
        &PrqlCompiler,
        &options(),
    )
    .unwrap();

    assert_eq!(stmt.ctes()[1].body, prql("from table1\nsort name\ntake 2"));
    assert!(!stmt.sql().contains("Generated by"));
}

#[test]
fn test_unterminated_block_is_prql_text() {
    let script = "from t\nSQL { select 1";
    let fragments = segment(script);
    assert_eq!(fragments.len(), 1);
    assert_eq!(fragments[0].kind, FragmentKind::Prql);

    let err = compile_script(script, &PrqlCompiler, &options()).unwrap_err();
    assert_eq!(err.fragment_index(), Some(0));
}

#[tokio::test]
async fn test_invalid_prql_never_reaches_engine() {
    let pipeline = QueryPipeline::new(PrqlCompiler, Box::new(MockEngine::new()), options());
    let outcome = pipeline.execute("from t\nfilter (").await;

    match outcome {
        RunOutcome::CompileFailed(CompileError::Fragment { index, message }) => {
            assert_eq!(index, 0);
            assert!(!message.is_empty());
        }
        other => panic!("Expected CompileFailed, got {other:?}"),
    }
    assert_eq!(pipeline.engine().connects(), 0);
}

#[tokio::test]
async fn test_failing_middle_fragment_short_circuits() {
    let pipeline = QueryPipeline::new(PrqlCompiler, Box::new(MockEngine::new()), options());
    let outcome = pipeline
        .execute("from t\nSQL { select * from AI_Table }\nfilter (\nSQL { select 1 }")
        .await;

    match outcome {
        RunOutcome::CompileFailed(err) => assert_eq!(err.fragment_index(), Some(2)),
        other => panic!("Expected CompileFailed, got {other:?}"),
    }
    assert!(pipeline.engine().queries().is_empty());
}

#[test]
fn test_compile_is_deterministic() {
    let script = "from people\nfilter age > 30\nSQL { select name from PrevTable }\nPIVOT { ON name USING count(*) }";
    let first = compile_script(script, &PrqlCompiler, &options()).unwrap();
    let second = compile_script(script, &PrqlCompiler, &options()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_stage_builders_compose_a_valid_script() {
    let pivot = PivotSpec {
        rows: vec!["city".to_string()],
        columns: vec!["year".to_string()],
        values: vec![PivotValue::new("sales", "sum")],
    };
    let script = [filter_query("sales > 0"), table_view_query(100), pivot.to_block()]
        .iter()
        .fold(upload_query("InputTable"), |acc, stage| merge_queries(&acc, stage));

    let stmt = compile_script(&script, &PrqlCompiler, &options()).unwrap();
    assert_eq!(stmt.ctes().len(), 2);
    assert_eq!(
        stmt.ctes()[1].body,
        "PIVOT table1 ON \"year\"\nUSING sum(\"sales\") as \"sum_sales\"\nGROUP BY \"city\""
    );
}
