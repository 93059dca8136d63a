//! Brace-aware lexer for escape blocks.
//!
//! Splits a script into a stream of plain-text runs and `SQL { .. }` /
//! `PIVOT { .. }` blocks. Block bodies extend to the matching closing brace,
//! so nested braces are allowed. Braces inside quoted runs, `--` line
//! comments and `/* .. */` block comments are ignored.

use std::collections::HashMap;

/// Which escape block a [`Token::Block`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Sql,
    Pivot,
}

impl BlockKind {
    /// The keyword that opens this block.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Sql => "SQL",
            Self::Pivot => "PIVOT",
        }
    }
}

/// A slice of the input script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Text outside any escape block.
    Text(&'a str),
    /// A complete escape block, wrapper included.
    Block { kind: BlockKind, text: &'a str },
}

impl<'a> Token<'a> {
    /// The source text covered by this token.
    pub fn as_str(&self) -> &'a str {
        match self {
            Token::Text(text) | Token::Block { text, .. } => text,
        }
    }
}

/// Tokenizes `src` into text runs and escape blocks.
///
/// The returned tokens cover `src` exactly, left to right. Empty text runs
/// are never emitted. This never fails: anything that does not form a
/// complete block stays in a text run.
pub fn tokenize(src: &str) -> Vec<Token<'_>> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut braces = BraceIndex::default();
    let mut text_start = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        match match_block(bytes, pos, &mut braces) {
            Some((kind, end)) => {
                if text_start < pos {
                    tokens.push(Token::Text(&src[text_start..pos]));
                }
                tokens.push(Token::Block {
                    kind,
                    text: &src[pos..end],
                });
                pos = end;
                text_start = end;
            }
            None => pos += 1,
        }
    }

    if text_start < bytes.len() {
        tokens.push(Token::Text(&src[text_start..]));
    }

    tokens
}

/// Tries to match a block starting at `start`, returning its kind and the
/// byte offset just past the closing brace.
fn match_block(
    bytes: &[u8],
    start: usize,
    braces: &mut BraceIndex,
) -> Option<(BlockKind, usize)> {
    let rest = &bytes[start..];
    let kind = if rest.starts_with(b"PIVOT") {
        BlockKind::Pivot
    } else if rest.starts_with(b"SQL") {
        BlockKind::Sql
    } else {
        return None;
    };

    if start > 0 && is_ident_byte(bytes[start - 1]) {
        return None;
    }

    let mut pos = start + kind.keyword().len();
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    if bytes.get(pos) != Some(&b'{') {
        return None;
    }

    braces.closing(bytes, pos).map(|close| (kind, close + 1))
}

/// Closing brace positions keyed by opening brace, filled in as blocks are
/// scanned.
///
/// A scan records every brace pair it walks over, so a later block opening
/// inside an earlier scanned region is answered without rescanning. Entries
/// only depend on the opening position because every scan starts outside
/// quotes and comments.
#[derive(Debug, Default)]
struct BraceIndex {
    closes: HashMap<usize, Option<usize>>,
}

impl BraceIndex {
    /// Returns the position of the brace closing the one at `open`.
    fn closing(&mut self, bytes: &[u8], open: usize) -> Option<usize> {
        if let Some(close) = self.closes.get(&open) {
            return *close;
        }
        self.scan(bytes, open);
        self.closes.get(&open).copied().flatten()
    }

    fn scan(&mut self, bytes: &[u8], open: usize) {
        let mut open_braces = vec![open];
        let mut quote: Option<u8> = None;
        let mut pos = open + 1;

        while pos < bytes.len() {
            let b = bytes[pos];
            if let Some(q) = quote {
                if b == q {
                    quote = None;
                }
                pos += 1;
                continue;
            }
            match b {
                b'\'' | b'"' | b'`' => quote = Some(b),
                b'-' if bytes.get(pos + 1) == Some(&b'-') => {
                    pos = skip_line_comment(bytes, pos);
                    continue;
                }
                b'/' if bytes.get(pos + 1) == Some(&b'*') => {
                    pos = skip_block_comment(bytes, pos);
                    continue;
                }
                b'{' => open_braces.push(pos),
                b'}' => {
                    if let Some(opened) = open_braces.pop() {
                        self.closes.insert(opened, Some(pos));
                    }
                    if open_braces.is_empty() {
                        return;
                    }
                }
                _ => {}
            }
            pos += 1;
        }

        for opened in open_braces {
            self.closes.insert(opened, None);
        }
    }
}

fn skip_line_comment(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |offset| start + offset)
}

// An unterminated block comment runs to the end of the input.
fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    bytes[start + 2..]
        .windows(2)
        .position(|w| w == b"*/")
        .map_or(bytes.len(), |offset| start + 2 + offset + 2)
}

// Non-ASCII bytes count as identifier characters so a keyword glued to a
// unicode identifier is not treated as a block.
fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concat(tokens: &[Token<'_>]) -> String {
        tokens.iter().map(Token::as_str).collect()
    }

    #[test]
    fn test_plain_text_is_single_token() {
        let tokens = tokenize("from t\ntake 10");
        assert_eq!(tokens, vec![Token::Text("from t\ntake 10")]);
    }

    #[test]
    fn test_sql_block_between_text() {
        let src = "from t\nSQL { select 1 }\ntake 1";
        let tokens = tokenize(src);
        assert_eq!(
            tokens,
            vec![
                Token::Text("from t\n"),
                Token::Block {
                    kind: BlockKind::Sql,
                    text: "SQL { select 1 }"
                },
                Token::Text("\ntake 1"),
            ]
        );
    }

    #[test]
    fn test_nested_braces_stay_in_block() {
        let src = "SQL { select {'a': 1} as s }";
        let tokens = tokenize(src);
        assert_eq!(
            tokens,
            vec![Token::Block {
                kind: BlockKind::Sql,
                text: src
            }]
        );
    }

    #[test]
    fn test_quoted_brace_is_ignored() {
        let src = "SQL { select '}' as brace }";
        let tokens = tokenize(src);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].as_str(), src);
    }

    #[test]
    fn test_line_comment_brace_is_ignored() {
        let src = "SQL { select 1 -- don't close }\n}";
        let tokens = tokenize(src);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].as_str(), src);
    }

    #[test]
    fn test_block_comment_apostrophe_is_ignored() {
        let src = "SQL { select a /* it's the id */ from AI_Table }";
        assert_eq!(
            tokenize(src),
            vec![Token::Block {
                kind: BlockKind::Sql,
                text: src
            }]
        );
    }

    #[test]
    fn test_block_comment_brace_is_ignored() {
        let src = "SQL { select 1 /* } */ }\ntake 1";
        let tokens = tokenize(src);
        assert_eq!(tokens[0].as_str(), "SQL { select 1 /* } */ }");
        assert_eq!(tokens[1], Token::Text("\ntake 1"));
    }

    #[test]
    fn test_unterminated_block_comment_is_text() {
        let src = "SQL { select 1 /* } ";
        assert_eq!(tokenize(src), vec![Token::Text(src)]);
    }

    #[test]
    fn test_failed_scan_records_inner_braces() {
        let src = "SQL { a SQL { b SQL { c";
        let mut braces = BraceIndex::default();
        assert_eq!(braces.closing(src.as_bytes(), 4), None);
        assert_eq!(braces.closes.len(), 3);
        assert_eq!(braces.closes.get(&12), Some(&None));
        assert_eq!(braces.closes.get(&20), Some(&None));
    }

    #[test]
    fn test_many_unterminated_blocks_stay_text() {
        let src = "SQL { x ".repeat(5_000);
        assert_eq!(tokenize(&src), vec![Token::Text(src.as_str())]);
    }

    #[test]
    fn test_no_whitespace_before_brace() {
        let tokens = tokenize("PIVOT{ON a USING sum(b)}");
        assert_eq!(
            tokens,
            vec![Token::Block {
                kind: BlockKind::Pivot,
                text: "PIVOT{ON a USING sum(b)}"
            }]
        );
    }

    #[test]
    fn test_unterminated_block_is_text() {
        let src = "take 1\nSQL { select 1";
        assert_eq!(tokenize(src), vec![Token::Text(src)]);
    }

    #[test]
    fn test_keyword_without_brace_is_text() {
        let src = "derive {SQL = 1}";
        assert_eq!(tokenize(src), vec![Token::Text(src)]);
    }

    #[test]
    fn test_keyword_inside_identifier_is_text() {
        let src = "from MYSQL { x }";
        assert_eq!(tokenize(src), vec![Token::Text(src)]);
    }

    #[test]
    fn test_inner_block_of_unterminated_outer() {
        let src = "SQL { a SQL { b }";
        let tokens = tokenize(src);
        assert_eq!(
            tokens,
            vec![
                Token::Text("SQL { a "),
                Token::Block {
                    kind: BlockKind::Sql,
                    text: "SQL { b }"
                },
            ]
        );
    }

    #[test]
    fn test_tokens_cover_input() {
        let inputs = [
            "",
            "take 10",
            "SQL { x }PIVOT { y }",
            "a\nSQL {\n select * from AI_Table }\nb PIVOT { ON c USING sum(d) } e",
            "héllo SQL { 'ü' } wörld",
            "SQL { never closed",
        ];
        for src in inputs {
            assert_eq!(concat(&tokenize(src)), src, "coverage failed for {src:?}");
        }
    }
}
