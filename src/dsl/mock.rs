//! Mock DSL compiler for testing.
//!
//! Produces deterministic SQL without parsing anything and records every
//! source it was asked to compile, along with the options it was given.

use super::{CompileOptions, DslCompiler, DslError};
use std::collections::HashMap;
use std::sync::Mutex;

/// A compiler that returns canned SQL.
///
/// Sources with a registered response get that response. Sources containing
/// a registered failure marker get an error. Everything else compiles to
/// `SELECT /* <source> */` with newlines folded into ` | `.
#[derive(Debug, Default)]
pub struct MockCompiler {
    responses: HashMap<String, String>,
    failure_markers: Vec<String>,
    calls: Mutex<Vec<(String, CompileOptions)>>,
}

impl MockCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the SQL returned for an exact (trimmed) source.
    pub fn with_response(mut self, source: impl Into<String>, sql: impl Into<String>) -> Self {
        self.responses
            .insert(source.into().trim().to_string(), sql.into());
        self
    }

    /// Makes every source containing `marker` fail to compile.
    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.failure_markers.push(marker.into());
        self
    }

    /// Returns the sources passed to `compile`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.iter().map(|(source, _)| source.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns the options passed to `compile`, in call order.
    pub fn call_options(&self) -> Vec<CompileOptions> {
        self.calls
            .lock()
            .map(|calls| calls.iter().map(|(_, options)| *options).collect())
            .unwrap_or_default()
    }

    /// Returns the SQL this mock produces for `source` when no response is
    /// registered.
    pub fn default_sql(source: &str) -> String {
        let folded: Vec<&str> = source
            .trim()
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        format!("SELECT /* {} */", folded.join(" | "))
    }
}

impl DslCompiler for MockCompiler {
    fn compile(&self, source: &str, options: &CompileOptions) -> Result<String, DslError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((source.to_string(), *options));
        }

        if let Some(marker) = self.failure_markers.iter().find(|m| source.contains(m.as_str())) {
            return Err(DslError::new(format!("unexpected `{marker}`")));
        }

        Ok(self
            .responses
            .get(source.trim())
            .cloned()
            .unwrap_or_else(|| Self::default_sql(source)))
    }
}
