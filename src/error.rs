//! Error types for cellquery.
//!
//! Defines the crate-level error enum plus the assembly error that callers
//! match on to tell a broken script apart from a broken engine.

use thiserror::Error;

/// Main error type for cellquery operations.
#[derive(Error, Debug)]
pub enum CellQueryError {
    /// Configuration errors (invalid config file, unknown backend, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Script compilation errors.
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// Engine errors (connect failures, bad SQL, type errors, etc.)
    #[error("Engine error: {0}")]
    Engine(String),

    /// File system errors (reading scripts, loading data files).
    #[error("I/O error: {0}")]
    Io(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CellQueryError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an engine error with the given message.
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Creates an I/O error with the given message.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the message without the category prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Config(msg) | Self::Engine(msg) | Self::Io(msg) | Self::Internal(msg) => {
                msg.clone()
            }
            Self::Compile(e) => e.to_string(),
        }
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "Configuration Error",
            Self::Compile(_) => "Compile Error",
            Self::Engine(_) => "Engine Error",
            Self::Io(_) => "I/O Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Failure while turning a script into a single SQL statement.
///
/// The first failing fragment aborts assembly, so at most one of these is
/// ever produced per script.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The script contained nothing but whitespace.
    #[error("script is empty")]
    Empty,

    /// The DSL compiler rejected a fragment.
    #[error("fragment {index}: {message}")]
    Fragment { index: usize, message: String },

    /// A raw SQL block would modify data and read-only mode is enabled.
    #[error("fragment {index}: SQL block is not read-only ({statement})")]
    UnsafeSql { index: usize, statement: String },
}

impl CompileError {
    /// Zero-based index of the offending fragment, if any.
    pub fn fragment_index(&self) -> Option<usize> {
        match self {
            Self::Empty => None,
            Self::Fragment { index, .. } | Self::UnsafeSql { index, .. } => Some(*index),
        }
    }
}

/// Result type alias using CellQueryError.
pub type Result<T> = std::result::Result<T, CellQueryError>;
