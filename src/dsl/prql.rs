//! PRQL compiler backed by the `prqlc` crate.

use super::{CompileOptions, DslCompiler, DslError, SqlDialect};
use prqlc::sql::Dialect;
use prqlc::{DisplayOptions, Options, Target};
use tracing::debug;

/// Compiles PRQL text to SQL in-process.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrqlCompiler;

impl PrqlCompiler {
    pub fn new() -> Self {
        Self
    }

    fn options(options: &CompileOptions) -> Options {
        let dialect = match options.dialect {
            SqlDialect::Generic => Dialect::Generic,
            SqlDialect::DuckDb => Dialect::DuckDb,
            SqlDialect::Sqlite => Dialect::SQLite,
            SqlDialect::Postgres => Dialect::Postgres,
        };

        Options::default()
            .with_target(Target::Sql(Some(dialect)))
            .with_signature_comment(options.signature_comment)
            .with_display(DisplayOptions::Plain)
    }
}

impl DslCompiler for PrqlCompiler {
    fn compile(&self, source: &str, options: &CompileOptions) -> Result<String, DslError> {
        debug!("Compiling PRQL ({} bytes)", source.len());
        prqlc::compile(source, &Self::options(options))
            .map(|sql| sql.trim_end().to_string())
            .map_err(|e| DslError::new(e.to_string().trim()))
    }
}
