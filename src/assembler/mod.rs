//! Query assembly.
//!
//! Turns a fragment sequence into one executable SQL statement. Each
//! fragment becomes a CTE named `table1`, `table2`, ... and reads from the
//! CTE before it. A lone PRQL fragment is compiled directly, without a CTE
//! wrapper.

mod rewrite;

pub use rewrite::{pivot_statement, substitute_placeholders, synthetic_name, PLACEHOLDERS};

use crate::chunk::{segment, Fragment, FragmentKind};
use crate::dsl::{CompileOptions, DslCompiler};
use crate::error::CompileError;
use crate::safety::{classify_sql, SafetyLevel};
use serde::Serialize;
use tracing::debug;

/// Options controlling assembly.
#[derive(Debug, Clone, Default)]
pub struct AssembleOptions {
    /// Passed to the DSL compiler. `signature_comment` is forced off.
    pub compile: CompileOptions,
    /// Table the first escape block reads from. Empty when unset.
    pub base_table: Option<String>,
    /// Reject `SQL { .. }` bodies that would modify data.
    pub read_only_sql_blocks: bool,
}

/// One entry of the final `WITH` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cte {
    pub alias: String,
    pub body: String,
}

/// The assembled statement plus the CTEs it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledStatement {
    sql: String,
    ctes: Vec<Cte>,
}

impl CompiledStatement {
    /// The SQL to hand to the engine.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The CTEs in declaration order. Empty for a lone PRQL fragment.
    pub fn ctes(&self) -> &[Cte] {
        &self.ctes
    }

    /// Alias of the last CTE, which the statement selects from.
    pub fn final_alias(&self) -> Option<&str> {
        self.ctes.last().map(|cte| cte.alias.as_str())
    }

    pub fn into_sql(self) -> String {
        self.sql
    }
}

/// Accumulator threaded through the fragment fold.
#[derive(Debug)]
struct Thread {
    current_table: String,
    ctes: Vec<Cte>,
}

impl Thread {
    fn new(base_table: Option<&str>) -> Self {
        Self {
            current_table: base_table.unwrap_or_default().to_string(),
            ctes: Vec::new(),
        }
    }

    /// Appends a CTE under the next synthetic name and makes it current.
    fn push(mut self, body: String) -> Self {
        let alias = synthetic_name(self.ctes.len() + 1);
        debug!("{} <- {} bytes", alias, body.len());
        self.current_table = alias.clone();
        self.ctes.push(Cte { alias, body });
        self
    }

    fn step<C: DslCompiler + ?Sized>(
        self,
        index: usize,
        fragment: &Fragment,
        compiler: &C,
        options: &AssembleOptions,
        compile_options: &CompileOptions,
    ) -> Result<Self, CompileError> {
        let body = match fragment.kind {
            FragmentKind::Prql => {
                let source = if index == 0 {
                    fragment.text.clone()
                } else {
                    format!("from {}\n{}", self.current_table, fragment.text)
                };
                compiler
                    .compile(&source, compile_options)
                    .map_err(|e| CompileError::Fragment {
                        index,
                        message: e.to_string(),
                    })?
            }
            FragmentKind::RawSql => {
                let sql = substitute_placeholders(fragment.body(), &self.current_table);
                if options.read_only_sql_blocks {
                    check_read_only(index, &sql)?;
                }
                sql
            }
            FragmentKind::Pivot => pivot_statement(fragment.body(), &self.current_table),
        };
        Ok(self.push(body))
    }

    fn finish(self) -> CompiledStatement {
        let list: Vec<String> = self
            .ctes
            .iter()
            .map(|cte| format!("{} AS ({})", cte.alias, cte.body))
            .collect();
        let sql = format!(
            "WITH {} SELECT * FROM {}",
            list.join(", "),
            self.current_table
        );
        CompiledStatement {
            sql,
            ctes: self.ctes,
        }
    }
}

fn check_read_only(index: usize, sql: &str) -> Result<(), CompileError> {
    let classification = classify_sql(sql);
    if classification.level == SafetyLevel::Mutating {
        return Err(CompileError::UnsafeSql {
            index,
            statement: classification.statement.unwrap_or_default(),
        });
    }
    Ok(())
}

/// Compiles a fragment sequence into one SQL statement.
///
/// Blank fragments are ignored. The first failing fragment aborts assembly
/// and the compiler is not called for any fragment after it.
pub fn compile<C: DslCompiler + ?Sized>(
    fragments: &[Fragment],
    compiler: &C,
    options: &AssembleOptions,
) -> Result<CompiledStatement, CompileError> {
    let fragments: Vec<&Fragment> = fragments.iter().filter(|f| !f.is_blank()).collect();
    let compile_options = CompileOptions {
        signature_comment: false,
        ..options.compile
    };

    match fragments.as_slice() {
        [] => Err(CompileError::Empty),
        [only] if only.kind == FragmentKind::Prql => {
            debug!("Single PRQL fragment, compiling directly");
            let sql = compiler
                .compile(&only.text, &compile_options)
                .map_err(|e| CompileError::Fragment {
                    index: 0,
                    message: e.to_string(),
                })?;
            Ok(CompiledStatement {
                sql,
                ctes: Vec::new(),
            })
        }
        _ => {
            debug!("Assembling {} fragments", fragments.len());
            let thread = fragments.iter().enumerate().try_fold(
                Thread::new(options.base_table.as_deref()),
                |thread, (index, fragment)| {
                    thread.step(index, fragment, compiler, options, &compile_options)
                },
            )?;
            Ok(thread.finish())
        }
    }
}

/// Segments `script` and compiles the fragments.
pub fn compile_script<C: DslCompiler + ?Sized>(
    script: &str,
    compiler: &C,
    options: &AssembleOptions,
) -> Result<CompiledStatement, CompileError> {
    compile(&segment(script), compiler, options)
}
