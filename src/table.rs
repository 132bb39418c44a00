//! Plain-text rendering of tables for terminal output.
//!
//! Columns are separated by two spaces. Numeric columns of a [`Table`] are
//! right-aligned; everything else is left-aligned. Control characters are
//! flattened to spaces and over-long cells are cut with an ellipsis.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::frame::Table;

/// Cells wider than this are truncated.
pub const MAX_CELL_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

pub fn render_rows(headers: &[String], rows: &[Vec<String>], align: &[Align]) -> String {
    let column_count = headers.len();
    let mut widths = headers
        .iter()
        .map(|h| display_width(&clip(h)))
        .collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(&clip(cell)));
        }
    }
    for width in &mut widths {
        *width = (*width).max(3);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths, &[]));
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &widths, &[]));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, align));
    }
    output
}

/// Renders a frame, right-aligning numeric columns.
pub fn render_frame(table: &Table) -> String {
    let align = table
        .columns()
        .iter()
        .map(|c| {
            if c.non_null_count() > 0 && c.is_numeric() {
                Align::Right
            } else {
                Align::Left
            }
        })
        .collect::<Vec<_>>();
    render_rows(&table.headers(), &table.display_rows(), &align)
}

pub fn print_frame(table: &Table) {
    print!("{}", render_frame(table));
}

/// Two-column `label  value` listing.
pub fn render_pairs(pairs: &[(String, String)]) -> String {
    let width = pairs
        .iter()
        .map(|(label, _)| display_width(label))
        .max()
        .unwrap_or(0);
    let mut output = String::new();
    for (label, value) in pairs {
        let padding = width.saturating_sub(display_width(label));
        let _ = writeln!(output, "{label}{}  {value}", " ".repeat(padding));
    }
    output
}

fn format_row(values: &[String], widths: &[usize], align: &[Align]) -> String {
    let cells = values
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(idx, (value, width))| {
            let clipped = clip(value);
            let padding = " ".repeat(width.saturating_sub(display_width(&clipped)));
            match align.get(idx) {
                Some(Align::Right) => format!("{padding}{clipped}"),
                _ => format!("{clipped}{padding}"),
            }
        })
        .collect::<Vec<_>>();
    cells.join("  ").trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn clip(value: &str) -> Cow<'_, str> {
    let flat = if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    };
    if display_width(&flat) <= MAX_CELL_WIDTH {
        return flat;
    }
    let mut cut = flat.chars().take(MAX_CELL_WIDTH - 1).collect::<String>();
    cut.push('…');
    Cow::Owned(cut)
}
