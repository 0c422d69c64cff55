//! Plain-text tables for terminal output.

use crate::utils::format_money;
use std::fmt::{Display, Formatter};

/// Shown in place of a zero amount in dense tables.
pub(super) const EMPTY_CELL: &str = "-";

/// Columns are padded to their widest cell. Numeric columns can be right-aligned.
#[derive(Debug, Clone, Default)]
pub(super) struct Table {
    headers: Vec<String>,
    right: Vec<bool>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub(super) fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let headers: Vec<String> = headers.into_iter().map(Into::into).collect();
        let right = vec![false; headers.len()];
        Self {
            headers,
            right,
            rows: Vec::new(),
        }
    }

    /// Right-aligns every column from `first` on.
    pub(super) fn numeric_from(mut self, first: usize) -> Self {
        for r in self.right.iter_mut().skip(first) {
            *r = true;
        }
        self
    }

    pub(super) fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub(super) fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.chars().count());
                }
            }
        }
        widths
    }

    fn write_row(&self, f: &mut Formatter<'_>, row: &[String], widths: &[usize]) -> std::fmt::Result {
        let mut line = String::new();
        for (i, width) in widths.iter().enumerate() {
            let cell = row.get(i).map(String::as_str).unwrap_or("");
            let pad = width.saturating_sub(cell.chars().count());
            if i > 0 {
                line.push_str("  ");
            }
            if self.right[i] {
                line.push_str(&" ".repeat(pad));
                line.push_str(cell);
            } else {
                line.push_str(cell);
                line.push_str(&" ".repeat(pad));
            }
        }
        writeln!(f, "{}", line.trim_end())
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let widths = self.widths();
        self.write_row(f, &self.headers, &widths)?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        self.write_row(f, &rule, &widths)?;
        for row in &self.rows {
            self.write_row(f, row, &widths)?;
        }
        Ok(())
    }
}

/// `format_money`, or the empty-cell placeholder for zero.
pub(super) fn money_or_empty(value: f64) -> String {
    if value == 0.0 {
        EMPTY_CELL.to_string()
    } else {
        format_money(value)
    }
}
