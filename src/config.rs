//! Configuration management for cellquery.
//!
//! Handles loading configuration from TOML files and environment variables:
//! which engine to run against, the SQL dialect the DSL compiles to, and
//! how escape blocks are assembled.

use crate::assembler::AssembleOptions;
use crate::dsl::{CompileOptions, SqlDialect};
use crate::engine::EngineBackend;
use crate::error::{CellQueryError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the engine backend.
pub const ENGINE_ENV_VAR: &str = "CELLQUERY_ENGINE";

/// Main configuration structure for cellquery.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Engine settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// DSL compiler settings.
    #[serde(default)]
    pub compiler: CompilerConfig,

    /// Script assembly settings.
    #[serde(default)]
    pub assembler: AssemblerConfig,
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Which embedded engine to use.
    #[serde(default)]
    pub backend: EngineBackend,

    /// Database file. `None` or `":memory:"` opens an in-memory database.
    #[serde(default)]
    pub path: Option<String>,

    /// Maximum rows kept from a single query. Unset keeps every row.
    #[serde(default)]
    pub max_rows: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: EngineBackend::default(),
            path: None,
            max_rows: None,
        }
    }
}

impl EngineConfig {
    /// Returns a display string for log lines.
    pub fn display_string(&self) -> String {
        format!(
            "{} ({})",
            self.backend.as_str(),
            self.path.as_deref().unwrap_or(":memory:")
        )
    }
}

/// DSL compiler configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CompilerConfig {
    /// SQL dialect targeted by the compiler.
    #[serde(default)]
    pub dialect: SqlDialect,
}

/// Assembly configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AssemblerConfig {
    /// Table the first escape block reads from.
    #[serde(default)]
    pub base_table: Option<String>,

    /// Reject escape-block SQL that would modify data.
    #[serde(default)]
    pub read_only_sql_blocks: bool,
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cellquery")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    ///
    /// A missing file yields the defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| CellQueryError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    pub fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            CellQueryError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Applies `CELLQUERY_ENGINE` when it is set.
    pub fn apply_env_defaults(&mut self) -> Result<()> {
        match std::env::var(ENGINE_ENV_VAR) {
            Ok(value) => self.set_backend(&value),
            Err(_) => Ok(()),
        }
    }

    /// Sets the engine backend by name.
    pub fn set_backend(&mut self, name: &str) -> Result<()> {
        self.engine.backend = EngineBackend::parse(name).ok_or_else(|| {
            CellQueryError::config(format!(
                "Unknown engine '{name}'. Expected: duckdb or sqlite"
            ))
        })?;
        Ok(())
    }

    /// Options for the DSL compiler.
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions::new(self.compiler.dialect)
    }

    /// Options for the assembler.
    pub fn assemble_options(&self) -> AssembleOptions {
        AssembleOptions {
            compile: self.compile_options(),
            base_table: self.assembler.base_table.clone(),
            read_only_sql_blocks: self.assembler.read_only_sql_blocks,
        }
    }
}
