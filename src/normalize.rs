//! Cell-level normalizers: null tokens, dates, numbers and text.
//!
//! Every normalizer works on a whole column and resolves failures per cell
//! to `None`. None of them return errors.

use std::sync::OnceLock;

use chrono::NaiveDateTime;
use log::debug;
use regex::Regex;

use crate::data::{
    DAY_FIRST_DATE_FORMATS, DAY_FIRST_DATETIME_FORMATS, ISO_DATE_FORMATS, ISO_DATETIME_FORMATS,
    MONTH_FIRST_DATE_FORMATS, MONTH_FIRST_DATETIME_FORMATS, Value, parse_day_first,
    parse_month_first, parse_with_format,
};

/// Share of parsed cells the bulk date pass must exceed to be accepted.
pub const BULK_DATE_ACCEPT_RATIO: f64 = 0.1;

const NULL_TOKENS: &[&str] = &["", "NA", "N/A"];

static NUMERIC_NOISE: OnceLock<Regex> = OnceLock::new();

fn numeric_noise() -> &'static Regex {
    NUMERIC_NOISE.get_or_init(|| Regex::new(r"[^\d.\-eE]").expect("valid numeric noise pattern"))
}

pub fn is_null_token(value: &str) -> bool {
    NULL_TOKENS.contains(&value.trim())
}

/// Maps an empty, `NA` or `N/A` text cell to null.
pub fn null_token(cell: Option<Value>) -> Option<Value> {
    match cell {
        Some(Value::Text(text)) if is_null_token(&text) => None,
        other => other,
    }
}

/// Parses one text cell after stripping everything that cannot be part of
/// a number (currency symbols, thousands separators, units).
pub fn parse_noisy_number(value: &str) -> Option<f64> {
    let stripped = numeric_noise().replace_all(value, "");
    stripped
        .parse::<f64>()
        .ok()
        .filter(|parsed| parsed.is_finite())
}

/// Coerces a column to numbers; unparseable cells become null.
pub fn coerce_numeric(cells: &[Option<Value>]) -> Vec<Option<f64>> {
    let already_numeric = cells
        .iter()
        .flatten()
        .all(|value| matches!(value, Value::Number(_)));
    cells
        .iter()
        .map(|cell| match cell {
            Some(Value::Number(n)) if n.is_finite() => Some(*n),
            Some(Value::Text(text)) if !already_numeric => parse_noisy_number(text),
            _ => None,
        })
        .collect()
}

/// Renders cells as trimmed text; blank results become null.
pub fn normalize_text(cells: Vec<Option<Value>>) -> Vec<Option<Value>> {
    cells
        .into_iter()
        .map(|cell| {
            let rendered = match cell? {
                Value::Text(text) => {
                    let trimmed = text.trim();
                    if trimmed.len() == text.len() {
                        text
                    } else {
                        trimmed.to_string()
                    }
                }
                other => other.as_display(),
            };
            (!rendered.is_empty()).then_some(Value::Text(rendered))
        })
        .collect()
}

/// Which tier of the date normalizer produced a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateStrategy {
    /// One layout applied to the whole column.
    Bulk { format: Option<&'static str> },
    /// Per-value month-first then day-first parsing.
    PerValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedDates {
    pub cells: Vec<Option<Value>>,
    pub strategy: DateStrategy,
    pub parsed: usize,
}

fn bulk_formats() -> impl Iterator<Item = &'static str> {
    [
        ISO_DATETIME_FORMATS,
        ISO_DATE_FORMATS,
        MONTH_FIRST_DATETIME_FORMATS,
        MONTH_FIRST_DATE_FORMATS,
        DAY_FIRST_DATETIME_FORMATS,
        DAY_FIRST_DATE_FORMATS,
    ]
    .into_iter()
    .flatten()
    .copied()
}

fn bulk_parse(cells: &[Option<Value>], format: Option<&str>) -> Vec<Option<NaiveDateTime>> {
    cells
        .iter()
        .map(|cell| match cell {
            Some(Value::DateTime(dt)) => Some(*dt),
            Some(Value::Text(text)) => format.and_then(|f| parse_with_format(text, f)),
            _ => None,
        })
        .collect()
}

fn per_value_parse(cells: &[Option<Value>]) -> Vec<Option<NaiveDateTime>> {
    cells
        .iter()
        .map(|cell| match cell {
            Some(Value::DateTime(dt)) => Some(*dt),
            Some(value) => {
                let text = value.as_display();
                parse_month_first(&text).or_else(|| parse_day_first(&text))
            }
            None => None,
        })
        .collect()
}

/// Two-tier date normalization.
///
/// The bulk tier picks the single layout that parses the most text cells
/// (earlier layouts win ties, so ISO beats month-first beats day-first) and
/// applies it to the whole column. It is kept when more than
/// [`BULK_DATE_ACCEPT_RATIO`] of the column parsed. Otherwise each value is
/// parsed individually, month-first and then day-first.
pub fn normalize_dates(cells: &[Option<Value>]) -> NormalizedDates {
    let mut best: Option<(&'static str, usize)> = None;
    for format in bulk_formats() {
        let hits = cells
            .iter()
            .filter(|cell| {
                matches!(cell, Some(Value::Text(text)) if parse_with_format(text, format).is_some())
            })
            .count();
        if hits > best.map(|(_, count)| count).unwrap_or(0) {
            best = Some((format, hits));
        }
    }

    let format = best.map(|(format, _)| format);
    let parsed = bulk_parse(cells, format);
    let hits = parsed.iter().filter(|p| p.is_some()).count();
    let ratio = hits as f64 / cells.len().max(1) as f64;
    if ratio > BULK_DATE_ACCEPT_RATIO {
        debug!(
            "Bulk date parse accepted with format {:?} ({hits}/{} cells)",
            format,
            cells.len()
        );
        return NormalizedDates {
            cells: parsed.into_iter().map(|p| p.map(Value::DateTime)).collect(),
            strategy: DateStrategy::Bulk { format },
            parsed: hits,
        };
    }

    let parsed = per_value_parse(cells);
    let hits = parsed.iter().filter(|p| p.is_some()).count();
    debug!(
        "Bulk date parse rejected ({:.1}% parsed); per-value parse recovered {hits} cell(s)",
        ratio * 100.0
    );
    NormalizedDates {
        cells: parsed.into_iter().map(|p| p.map(Value::DateTime)).collect(),
        strategy: DateStrategy::PerValue,
        parsed: hits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn text(s: &str) -> Option<Value> {
        Some(Value::Text(s.to_string()))
    }

    fn ymd(y: i32, m: u32, d: u32) -> Option<Value> {
        Some(Value::DateTime(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        ))
    }

    #[test]
    fn noisy_text_numbers_are_stripped() {
        let cells = vec![text("$1,200.50"), None, text("2,000"), text("12 kg"), text("n/a")];
        assert_eq!(
            coerce_numeric(&cells),
            vec![Some(1200.5), None, Some(2000.0), Some(12.0), None]
        );
    }

    #[test]
    fn numeric_column_passes_through() {
        let cells = vec![Some(Value::Number(3.0)), None, Some(Value::Number(-1.5))];
        assert_eq!(coerce_numeric(&cells), vec![Some(3.0), None, Some(-1.5)]);
    }

    #[test]
    fn exponent_and_negative_values_survive() {
        assert_eq!(parse_noisy_number("-€3.5e2"), Some(-350.0));
        assert_eq!(parse_noisy_number("--"), None);
        assert_eq!(parse_noisy_number("free"), None);
    }

    #[test]
    fn null_tokens_cover_blank_na_and_n_slash_a() {
        let cells = [text(""), text("NA"), text(" N/A "), text("na"), text("x")]
            .into_iter()
            .map(null_token)
            .collect::<Vec<_>>();
        assert_eq!(cells, vec![None, None, None, text("na"), text("x")]);
    }

    #[test]
    fn text_normalizer_trims_and_renders_numbers() {
        let cells = normalize_text(vec![text("  Widget "), text("   "), Some(Value::Number(42.0))]);
        assert_eq!(cells, vec![text("Widget"), None, text("42")]);
    }

    #[test]
    fn bulk_pass_nulls_invalid_iso_dates() {
        let cells = vec![text("2024-01-05"), text("2024-13-45"), text("2024-02-01"), None];
        let result = normalize_dates(&cells);
        assert_eq!(
            result.strategy,
            DateStrategy::Bulk {
                format: Some("%Y-%m-%d")
            }
        );
        assert_eq!(result.cells, vec![ymd(2024, 1, 5), None, ymd(2024, 2, 1), None]);
    }

    #[test]
    fn bulk_pass_prefers_month_first_on_ambiguous_columns() {
        let cells = vec![text("03/04/2024"), text("05/06/2024")];
        let result = normalize_dates(&cells);
        assert_eq!(result.cells, vec![ymd(2024, 3, 4), ymd(2024, 5, 6)]);
    }

    #[test]
    fn bulk_pass_switches_to_day_first_when_it_fits_more_values() {
        let cells = vec![text("03/04/2024"), text("25/12/2024"), text("31/01/2024")];
        let result = normalize_dates(&cells);
        assert_eq!(
            result.cells,
            vec![ymd(2024, 4, 3), ymd(2024, 12, 25), ymd(2024, 1, 31)]
        );
    }

    #[test]
    fn sparse_columns_fall_back_to_per_value_parsing() {
        let mut cells = vec![text("note"); 12];
        cells.push(text("2024-01-05"));
        let result = normalize_dates(&cells);
        assert_eq!(result.strategy, DateStrategy::PerValue);
        assert_eq!(result.parsed, 1);
        assert_eq!(result.cells.last().cloned().flatten(), ymd(2024, 1, 5));
    }

    #[test]
    fn per_value_parsing_mixes_layouts() {
        let mut cells = vec![None; 20];
        cells.push(text("12/31/2024"));
        cells.push(text("31/12/2024"));
        let result = normalize_dates(&cells);
        assert_eq!(result.strategy, DateStrategy::PerValue);
        assert_eq!(result.cells[20], ymd(2024, 12, 31));
        assert_eq!(result.cells[21], ymd(2024, 12, 31));
    }
}
