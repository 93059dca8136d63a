//! Integration tests for cellquery.

pub mod config_test;
pub mod duckdb_test;
pub mod pipeline_test;
pub mod sqlite_test;
