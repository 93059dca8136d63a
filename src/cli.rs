//! Command-line argument parsing for cellquery.
//!
//! Uses clap to parse the `compile` and `run` subcommands plus the global
//! engine and logging options.

use crate::config::Config;
use crate::dsl::SqlDialect;
use crate::error::{CellQueryError, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;

/// Output format for `run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned text table with display rounding.
    #[default]
    Table,
    /// One JSON object per row, unrounded.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "text" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(format!(
                "Invalid output format: {s}. Expected: table or json"
            )),
        }
    }
}

/// A `table=path.csv` pair given to `--load`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSpec {
    pub table: String,
    pub path: PathBuf,
}

impl std::str::FromStr for LoadSpec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((table, path)) if !table.trim().is_empty() && !path.trim().is_empty() => {
                Ok(Self {
                    table: table.trim().to_string(),
                    path: PathBuf::from(path.trim()),
                })
            }
            _ => Err(format!("Invalid load spec: '{s}'. Expected TABLE=PATH")),
        }
    }
}

/// Compiles PRQL notebook scripts with SQL and PIVOT escape blocks.
#[derive(Parser, Debug)]
#[command(name = "cellquery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Engine backend: duckdb or sqlite (overrides config and CELLQUERY_ENGINE)
    #[arg(long, global = true, value_name = "ENGINE")]
    pub engine: Option<String>,

    /// SQL dialect the PRQL compiler targets
    #[arg(long, global = true, value_name = "DIALECT")]
    pub dialect: Option<String>,

    /// Table the first escape block reads from
    #[arg(long, global = true, value_name = "TABLE")]
    pub base_table: Option<String>,

    /// Reject SQL blocks that modify data
    #[arg(long, global = true)]
    pub read_only: bool,

    /// Write logs to a file (default location when no path is given)
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<Option<PathBuf>>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the SQL a script assembles to
    Compile(CompileArgs),
    /// Assemble a script and run it against the engine
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Script file (use "-" for stdin)
    #[arg(value_name = "SCRIPT")]
    pub script: String,

    /// Print the statement and its CTEs as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Script file (use "-" for stdin)
    #[arg(value_name = "SCRIPT")]
    pub script: String,

    /// Load a CSV file as a table before running (repeatable)
    #[arg(long = "load", value_name = "TABLE=PATH")]
    pub loads: Vec<LoadSpec>,

    /// Output format: table or json
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub format: String,

    /// Database file (overrides config)
    #[arg(long, value_name = "PATH")]
    pub database: Option<String>,
}

impl RunArgs {
    /// Parses the output format from the --format argument.
    pub fn parse_output_format(&self) -> std::result::Result<OutputFormat, String> {
        self.format.parse()
    }
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// The script argument of whichever subcommand was given.
    pub fn script(&self) -> &str {
        match &self.command {
            Command::Compile(args) => &args.script,
            Command::Run(args) => &args.script,
        }
    }

    /// Applies command-line overrides on top of file and environment
    /// configuration.
    pub fn apply_to(&self, config: &mut Config) -> Result<()> {
        if let Some(engine) = &self.engine {
            config.set_backend(engine)?;
        }
        if let Some(dialect) = &self.dialect {
            config.compiler.dialect = SqlDialect::parse(dialect).ok_or_else(|| {
                CellQueryError::config(format!(
                    "Unknown dialect '{dialect}'. Expected: generic, duckdb, sqlite or postgres"
                ))
            })?;
        }
        if let Some(table) = &self.base_table {
            config.assembler.base_table = Some(table.clone());
        }
        if self.read_only {
            config.assembler.read_only_sql_blocks = true;
        }
        if let Command::Run(args) = &self.command {
            if let Some(path) = &args.database {
                config.engine.path = Some(path.clone());
            }
        }
        Ok(())
    }
}

/// Reads a script from `source`, or from stdin when it is `-`.
pub fn read_script(source: &str) -> Result<String> {
    if source == "-" {
        let mut script = String::new();
        std::io::stdin()
            .read_to_string(&mut script)
            .map_err(|e| CellQueryError::io(format!("Failed to read stdin: {e}")))?;
        return Ok(script);
    }

    std::fs::read_to_string(source)
        .map_err(|e| CellQueryError::io(format!("Failed to read {source}: {e}")))
}
