//! Script segmentation.
//!
//! Splits a query-cell script into typed fragments: PRQL pipeline text,
//! `SQL { .. }` escape blocks and `PIVOT { .. }` escape blocks.

mod lexer;

pub use lexer::{tokenize, BlockKind, Token};

use serde::Serialize;
use std::fmt;

/// The sub-language a fragment is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    /// Pipeline DSL text, compiled by the external DSL compiler.
    Prql,
    /// A `SQL { .. }` block, passed through after placeholder substitution.
    RawSql,
    /// A `PIVOT { .. }` block, native engine syntax.
    Pivot,
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prql => write!(f, "PRQL"),
            Self::RawSql => write!(f, "SQL"),
            Self::Pivot => write!(f, "PIVOT"),
        }
    }
}

impl From<BlockKind> for FragmentKind {
    fn from(kind: BlockKind) -> Self {
        match kind {
            BlockKind::Sql => Self::RawSql,
            BlockKind::Pivot => Self::Pivot,
        }
    }
}

/// A contiguous, typed slice of a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fragment {
    pub kind: FragmentKind,
    /// Literal source text. Escape blocks keep their `SQL {` / `}` wrapper.
    pub text: String,
}

impl Fragment {
    pub fn new(kind: FragmentKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn prql(text: impl Into<String>) -> Self {
        Self::new(FragmentKind::Prql, text)
    }

    pub fn raw_sql(text: impl Into<String>) -> Self {
        Self::new(FragmentKind::RawSql, text)
    }

    pub fn pivot(text: impl Into<String>) -> Self {
        Self::new(FragmentKind::Pivot, text)
    }

    /// Returns true if the fragment holds nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Returns the block body with the escape wrapper stripped and trimmed.
    ///
    /// PRQL fragments have no wrapper; their text is returned as-is.
    pub fn body(&self) -> &str {
        match self.kind {
            FragmentKind::Prql => &self.text,
            FragmentKind::RawSql | FragmentKind::Pivot => {
                let inner = match (self.text.find('{'), self.text.rfind('}')) {
                    (Some(open), Some(close)) if open < close => &self.text[open + 1..close],
                    _ => self.text.as_str(),
                };
                inner.trim()
            }
        }
    }
}

impl From<Token<'_>> for Fragment {
    fn from(token: Token<'_>) -> Self {
        match token {
            Token::Text(text) => Fragment::prql(text),
            Token::Block { kind, text } => Fragment::new(kind.into(), text),
        }
    }
}

/// Splits a trimmed script into fragments without dropping blank ones.
///
/// Concatenating the `text` of the returned fragments reproduces
/// `script.trim()` exactly.
pub fn segment_raw(script: &str) -> Vec<Fragment> {
    tokenize(script.trim()).into_iter().map(Fragment::from).collect()
}

/// Splits a script into its non-blank fragments, in source order.
pub fn segment(script: &str) -> Vec<Fragment> {
    segment_raw(script)
        .into_iter()
        .filter(|fragment| !fragment.is_blank())
        .collect()
}
