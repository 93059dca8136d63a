//! Script-to-rows pipeline.

use super::executor::{run, RunOutcome};
use crate::assembler::{compile_script, AssembleOptions, CompiledStatement};
use crate::dsl::DslCompiler;
use crate::engine::AnalyticalEngine;
use crate::error::CompileError;
use tracing::debug;

/// Bundles a compiler, an engine and assembly options.
pub struct QueryPipeline<C, E: ?Sized> {
    compiler: C,
    options: AssembleOptions,
    engine: Box<E>,
}

impl<C, E> QueryPipeline<C, E>
where
    C: DslCompiler,
    E: AnalyticalEngine + ?Sized,
{
    pub fn new(compiler: C, engine: Box<E>, options: AssembleOptions) -> Self {
        Self {
            compiler,
            options,
            engine,
        }
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn options(&self) -> &AssembleOptions {
        &self.options
    }

    /// Assembles `script` without running it.
    pub fn compile(&self, script: &str) -> Result<CompiledStatement, CompileError> {
        compile_script(script, &self.compiler, &self.options)
    }

    /// Assembles and runs `script`. The engine is not touched when assembly
    /// fails.
    pub async fn execute(&self, script: &str) -> RunOutcome {
        match self.compile(script) {
            Ok(statement) => {
                debug!("Running: {}", statement.sql());
                run(statement.sql(), self.engine.as_ref()).await
            }
            Err(e) => {
                debug!("Not running: {}", e);
                RunOutcome::CompileFailed(e)
            }
        }
    }
}
