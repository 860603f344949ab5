//! Plain-text rendering of the top rows of a ranking

use std::fmt::Write;

use lu_core::{DataRow, Ranking};
use serde_json::Value;

const MISSING: &str = "-";
const MAX_CELL: usize = 24;

/// Table of the given rows under the ranking's top-level visible columns
///
/// `rows` pairs each row index with its payload, in rank order. The rank
/// column shows the ranks of the provider's last sort.
pub fn render(ranking: &Ranking, rows: &[(usize, Value)]) -> String {
    let columns: Vec<_> = ranking.layout().into_iter().filter(|c| c.depth == 0).collect();

    let header: Vec<String> = columns.iter().map(|c| clip(&c.label)).collect();

    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|(index, value)| {
            let row = DataRow::new(*index, value);
            columns
                .iter()
                .map(|c| {
                    ranking
                        .cell(&c.id, &row)
                        .filter(|cell| !cell.is_missing)
                        .and_then(|cell| cell.label)
                        .map(|label| clip(&label))
                        .unwrap_or_else(|| MISSING.to_string())
                })
                .collect()
        })
        .collect();

    let widths: Vec<usize> = (0..header.len())
        .map(|i| {
            body.iter()
                .map(|line| line[i].chars().count())
                .chain(std::iter::once(header[i].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    for line in std::iter::once(&header).chain(body.iter()) {
        let cells: Vec<String> = line
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        let _ = writeln!(out, "{}", cells.join("  ").trim_end());
    }
    out
}

/// Single-line cell text, shortened to a readable width
fn clip(text: &str) -> String {
    let line = text.replace('\n', " ");
    if line.chars().count() <= MAX_CELL {
        return line;
    }
    let mut clipped: String = line.chars().take(MAX_CELL - 1).collect();
    clipped.push('…');
    clipped
}
