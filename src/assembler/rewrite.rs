//! Text rewrites applied to escape-block bodies.

/// Placeholder names that refer to the previous fragment's result.
pub const PLACEHOLDERS: [&str; 2] = ["AI_Table", "PrevTable"];

/// Returns the synthetic CTE name for the `n`th fragment (1-based).
pub fn synthetic_name(n: usize) -> String {
    format!("table{n}")
}

/// Replaces every placeholder in `sql` with `table`.
///
/// Both bare (`AI_Table`) and backtick-quoted (`` `AI_Table` ``) forms are
/// replaced. Bare names only match as whole identifiers, so `MyAI_Table` or
/// `PrevTable2` are left alone.
pub fn substitute_placeholders(sql: &str, table: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;
    let mut prev: Option<char> = None;

    while let Some(c) = rest.chars().next() {
        if let Some(len) = placeholder_at(rest, prev) {
            out.push_str(table);
            prev = rest[..len].chars().next_back();
            rest = &rest[len..];
            continue;
        }
        out.push(c);
        prev = Some(c);
        rest = &rest[c.len_utf8()..];
    }

    out
}

/// Length of the placeholder starting at the head of `rest`, if any.
fn placeholder_at(rest: &str, prev: Option<char>) -> Option<usize> {
    for name in PLACEHOLDERS {
        if let Some(quoted) = rest.strip_prefix('`') {
            if quoted.starts_with(name) && quoted[name.len()..].starts_with('`') {
                return Some(name.len() + 2);
            }
        }

        if prev.is_some_and(is_ident_char) {
            continue;
        }
        if let Some(after) = rest.strip_prefix(name) {
            if !after.chars().next().is_some_and(is_ident_char) {
                return Some(name.len());
            }
        }
    }
    None
}

/// Builds a pivot statement reading from `table`.
///
/// `body` is the clause text between the braces, e.g. `ON col USING sum(x)`.
pub fn pivot_statement(body: &str, table: &str) -> String {
    let body = body.trim();
    match (table.is_empty(), body.is_empty()) {
        (true, true) => "PIVOT".to_string(),
        (true, false) => format!("PIVOT {body}"),
        (false, true) => format!("PIVOT {table}"),
        (false, false) => format!("PIVOT {table} {body}"),
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
