//! Text rendering of query results for the command line.

use crate::engine::{format_for_table, QueryResult};
use crate::error::{CellQueryError, Result};

/// Renders `result` as an aligned text table followed by a row count.
///
/// Values go through [`format_for_table`], so floats show two decimals.
pub fn render_table(result: &QueryResult) -> String {
    let headers: Vec<String> = result.columns.iter().map(|c| c.name.clone()).collect();
    let rows: Vec<Vec<String>> = format_for_table(result)
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|h| row.get(h).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    if !headers.is_empty() {
        out.push_str(&format_line(&headers, &widths));
        out.push_str(
            &widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("-+-"),
        );
        out.push('\n');
        for row in &rows {
            out.push_str(&format_line(row, &widths));
        }
    }

    let noun = if result.row_count == 1 { "row" } else { "rows" };
    out.push_str(&format!("({} {noun})", result.row_count));
    if let Some(warning) = result.truncation_warning() {
        out.push('\n');
        out.push_str(&warning);
    }
    out
}

/// Renders `result` as a pretty-printed JSON array of row objects.
pub fn render_json(result: &QueryResult) -> Result<String> {
    serde_json::to_string_pretty(&result.to_json_rows())
        .map_err(|e| CellQueryError::internal(format!("Failed to serialize rows: {e}")))
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_line(cells: &[String], widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    format!("{}\n", padded.join(" | ").trim_end())
}
