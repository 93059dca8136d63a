//! Builders for the PRQL lines that notebook cells contribute to a script.
//!
//! Each cell appends one stage to the script of the cell before it, so the
//! script for cell *n* is `merge_queries` folded over cells `1..=n`.

/// Default name of the uploaded input table.
pub const INPUT_TABLE: &str = "InputTable";

/// `from <table>`: the first stage of every script.
pub fn upload_query(table: &str) -> String {
    format!("from {table}")
}

/// One row, used to discover the column names of the previous stage.
pub fn fields_query() -> String {
    "take 1".to_string()
}

/// One row per distinct value of `field`.
pub fn field_values_query(field: &str) -> String {
    format!("group {} (take 1)", quoted(field))
}

/// Keeps only `columns`, in order.
pub fn column_select_query<S: AsRef<str>>(columns: &[S]) -> String {
    format!("select {{{}}}", quoted_list(columns))
}

/// Like [`column_select_query`] but limited to one row, to validate the
/// column list cheaply.
pub fn column_probe_query<S: AsRef<str>>(columns: &[S]) -> String {
    format!("{}\ntake 1", column_select_query(columns))
}

/// `filter <expr>`, or nothing for an empty expression.
pub fn filter_query(expr: &str) -> String {
    if expr.is_empty() {
        String::new()
    } else {
        format!("filter {expr}")
    }
}

/// First `rows` rows.
pub fn table_view_query(rows: usize) -> String {
    format!("take {rows}")
}

/// A sort key. `-name` parses as descending, `name` or `+name` as
/// ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.strip_prefix('-') {
            Some(column) => Self::desc(column),
            None => Self::asc(s.strip_prefix('+').unwrap_or(s)),
        }
    }
}

/// `sort {+`a`, -`b`}`, or nothing when there are no keys.
pub fn sort_query(keys: &[SortKey]) -> String {
    if keys.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = keys
        .iter()
        .map(|k| {
            let sign = if k.descending { '-' } else { '+' };
            format!("{sign}{}", quoted(&k.column))
        })
        .collect();
    format!("sort {{{}}}", parts.join(", "))
}

/// Adds a computed column.
pub fn derive_query(name: &str, expr: &str) -> String {
    format!("derive {{\n{} = {expr}\n}}", quoted(name))
}

/// Keeps the first row for each value of `column`, then restores the
/// column order given by `fields`.
pub fn remove_duplicates_query<S: AsRef<str>>(column: &str, fields: &[S]) -> String {
    let group = format!("group {{{}}} (take 1)", quoted(column));
    if fields.is_empty() {
        group
    } else {
        format!("{group}\n{}", column_select_query(fields))
    }
}

/// Aggregation applied to a pivot value column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotValue {
    pub column: String,
    /// `sum`, `avg`, `count_distinct`, ...
    pub aggregation: String,
}

impl PivotValue {
    pub fn new(column: impl Into<String>, aggregation: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            aggregation: aggregation.into(),
        }
    }

    fn to_sql(&self) -> String {
        if self.aggregation == "count_distinct" {
            format!(
                "COUNT(DISTINCT \"{c}\") as \"count_distinct_{c}\"",
                c = self.column
            )
        } else {
            format!(
                "{a}(\"{c}\") as \"{a}_{c}\"",
                a = self.aggregation,
                c = self.column
            )
        }
    }
}

/// Rows, columns and values of a pivot cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PivotSpec {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub values: Vec<PivotValue>,
}

impl PivotSpec {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.columns.is_empty() && self.values.is_empty()
    }

    /// Renders the `PIVOT { .. }` escape block, or nothing when no field is
    /// chosen.
    pub fn to_block(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut block = String::from("PIVOT {\n");
        if !self.columns.is_empty() {
            block.push_str(&format!("ON {}\n", double_quoted_list(&self.columns)));
        }
        if !self.values.is_empty() {
            let values: Vec<String> = self.values.iter().map(PivotValue::to_sql).collect();
            block.push_str(&format!("USING {}\n", values.join(", ")));
        }
        if !self.rows.is_empty() {
            block.push_str(&format!("GROUP BY {}\n", double_quoted_list(&self.rows)));
        }
        block.push('}');
        block
    }
}

/// Appends `next` as a new line of `acc`.
pub fn merge_queries(acc: &str, next: &str) -> String {
    format!("{acc}\n{next}")
}

fn quoted(name: &str) -> String {
    format!("`{name}`")
}

fn quoted_list<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|n| quoted(n.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

fn double_quoted_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("\"{n}\""))
        .collect::<Vec<_>>()
        .join(", ")
}
