//! Pipeline DSL compiler interface.
//!
//! The DSL compiler is an external black box: text in, SQL out. This module
//! defines the seam so the assembler can be driven by `prqlc` in production
//! and by a scripted mock in tests.

mod mock;
mod prql;

pub use mock::MockCompiler;
pub use prql::PrqlCompiler;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned by a DSL compiler for a single piece of source text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct DslError(pub String);

impl DslError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// SQL dialect the DSL compiler should target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    Generic,
    #[default]
    DuckDb,
    Sqlite,
    Postgres,
}

impl SqlDialect {
    /// Parses a dialect name as used in config files and on the CLI.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "generic" | "any" => Some(Self::Generic),
            "duckdb" => Some(Self::DuckDb),
            "sqlite" => Some(Self::Sqlite),
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::DuckDb => "duckdb",
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
        }
    }
}

/// Options passed to the DSL compiler on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompileOptions {
    /// Emit a compiler-identifying comment after the generated SQL.
    ///
    /// The assembler always turns this off, since fragment output is
    /// wrapped in a CTE.
    pub signature_comment: bool,
    pub dialect: SqlDialect,
}

impl CompileOptions {
    pub fn new(dialect: SqlDialect) -> Self {
        Self {
            signature_comment: false,
            dialect,
        }
    }
}

/// A compiler from pipeline DSL text to SQL.
pub trait DslCompiler: Send + Sync {
    /// Compiles one piece of DSL text to a SQL query.
    fn compile(&self, source: &str, options: &CompileOptions) -> Result<String, DslError>;
}

impl<T: DslCompiler + ?Sized> DslCompiler for &T {
    fn compile(&self, source: &str, options: &CompileOptions) -> Result<String, DslError> {
        (**self).compile(source, options)
    }
}

impl<T: DslCompiler + ?Sized> DslCompiler for std::sync::Arc<T> {
    fn compile(&self, source: &str, options: &CompileOptions) -> Result<String, DslError> {
        (**self).compile(source, options)
    }
}
