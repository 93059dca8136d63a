//! Read-only classification for raw SQL escape blocks.
//!
//! `SQL { .. }` bodies are often written by an assistant rather than the
//! user. When read-only mode is on, bodies that parse as data-modifying
//! statements are rejected before anything reaches the engine.

use sqlparser::ast::Statement;
use sqlparser::dialect::DuckDbDialect;
use sqlparser::parser::Parser;
use std::fmt;
use tracing::debug;

/// Safety level of a SQL body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SafetyLevel {
    /// Queries only (SELECT, VALUES, EXPLAIN).
    ReadOnly,
    /// At least one statement writes data or changes the schema.
    Mutating,
    /// The parser did not understand the body (engine-specific syntax).
    Unknown,
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "Read-only"),
            Self::Mutating => write!(f, "Mutating"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Result of classifying a SQL body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub level: SafetyLevel,
    /// Leading keyword of the most dangerous statement, e.g. `DELETE`.
    pub statement: Option<String>,
}

/// Classifies `sql`, taking the most dangerous statement when there are
/// several.
pub fn classify_sql(sql: &str) -> Classification {
    let statements = match Parser::parse_sql(&DuckDbDialect {}, sql) {
        Ok(statements) => statements,
        Err(e) => {
            debug!("SQL block not classified: {}", e);
            return Classification {
                level: SafetyLevel::Unknown,
                statement: None,
            };
        }
    };

    if statements.is_empty() {
        return Classification {
            level: SafetyLevel::Unknown,
            statement: None,
        };
    }

    let mutating = statements.iter().find(|stmt| !is_read_only(stmt));
    match mutating {
        Some(stmt) => Classification {
            level: SafetyLevel::Mutating,
            statement: leading_keyword(stmt),
        },
        None => Classification {
            level: SafetyLevel::ReadOnly,
            statement: leading_keyword(&statements[0]),
        },
    }
}

fn is_read_only(statement: &Statement) -> bool {
    matches!(statement, Statement::Query(_) | Statement::Explain { .. })
}

fn leading_keyword(statement: &Statement) -> Option<String> {
    statement
        .to_string()
        .split_whitespace()
        .next()
        .map(str::to_uppercase)
}
