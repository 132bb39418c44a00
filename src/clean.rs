//! The cleaning pipeline: override merge, normalization, derivation and row
//! admission, producing one (table, mapping) result per invocation.

use log::{debug, info};
use serde::Serialize;
use thiserror::Error;

use crate::{
    derive::{Outcomes, derive},
    fields::{CanonicalField, PARSED_DATE_COLUMN},
    frame::Table,
    inference::infer_schema,
    mapping::{MappingError, MappingIssue, SchemaMapping, UserMapping, merge},
    normalize::{DateStrategy, coerce_numeric, normalize_dates, normalize_text, null_token},
};

/// Fields whose presence admits a row.
pub const ADMISSION_FIELDS: [CanonicalField; 3] = [
    CanonicalField::Date,
    CanonicalField::Revenue,
    CanonicalField::Product,
];

const TEXT_FIELDS: [CanonicalField; 3] = [
    CanonicalField::Product,
    CanonicalField::Category,
    CanonicalField::OrderId,
];

#[derive(Debug, Error, PartialEq)]
pub enum CleanError {
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error("no rows survived cleaning ({input_rows} row(s) read); map a date, revenue, or product column")]
    NoRowsAdmitted { input_rows: usize },
}

/// What happened during one cleaning run, for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanReport {
    pub inferred: SchemaMapping,
    pub issues: Vec<MappingIssue>,
    pub outcomes: Outcomes,
    pub date_strategy: Option<String>,
    pub input_rows: usize,
    pub admitted_rows: usize,
}

impl CleanReport {
    pub fn dropped_rows(&self) -> usize {
        self.input_rows - self.admitted_rows
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cleaned {
    pub table: Table,
    pub schema: SchemaMapping,
    pub report: CleanReport,
}

/// Cleans `raw` using the inferred mapping with `user` layered on top.
///
/// `raw` is never modified. Passing `None` reproduces pure auto-detection.
pub fn clean(raw: &Table, user: Option<&UserMapping>) -> Result<Cleaned, CleanError> {
    let mut table = raw.clone();
    table.trim_headers();
    for name in table.headers() {
        table.map_column(&name, null_token);
    }

    let inferred = infer_schema(&table);
    let (mut schema, issues) = match user {
        Some(user) => merge(&inferred, user, &table.headers())?,
        None => (inferred.clone(), Vec::new()),
    };

    let mut date_strategy = None;
    if let Some(column) = schema.resolve(CanonicalField::Date, &table)
        && let Some(cells) = table.column(column).map(|c| c.cells.clone())
    {
        let normalized = normalize_dates(&cells);
        date_strategy = Some(match normalized.strategy {
            DateStrategy::Bulk { format } => format!("bulk ({})", format.unwrap_or("none")),
            DateStrategy::PerValue => "per-value".to_string(),
        });
        table.set_column(PARSED_DATE_COLUMN, normalized.cells);
        schema.insert(CanonicalField::Date, PARSED_DATE_COLUMN);
    }

    for field in TEXT_FIELDS {
        if let Some(column) = schema.resolve(field, &table).map(str::to_string)
            && let Some(existing) = table.column(&column)
        {
            let cells = normalize_text(existing.cells.clone());
            table.set_column(&column, cells);
        }
    }

    if let Some(column) = schema.resolve(CanonicalField::Quantity, &table).map(str::to_string)
        && let Some(existing) = table.column(&column)
    {
        let filled = coerce_numeric(&existing.cells)
            .into_iter()
            .map(|q| Some(q.unwrap_or(1.0)))
            .collect();
        table.set_numbers(&column, filled);
    }

    let derived = derive(table, schema);
    let mut table = derived.table;
    let schema = derived.schema;

    let input_rows = table.row_count();
    let mask = admission_mask(&table, &schema);
    table.retain_rows(&mask);
    let admitted_rows = table.row_count();
    debug!("Admitted {admitted_rows} of {input_rows} row(s)");

    if admitted_rows == 0 {
        return Err(CleanError::NoRowsAdmitted { input_rows });
    }
    info!(
        "Cleaned {admitted_rows} row(s) ({} dropped) with {} mapped field(s)",
        input_rows - admitted_rows,
        schema.len()
    );

    Ok(Cleaned {
        table,
        schema,
        report: CleanReport {
            inferred,
            issues,
            outcomes: derived.outcomes,
            date_strategy,
            input_rows,
            admitted_rows,
        },
    })
}

/// A row is admitted when any resolvable admission field is non-null.
pub fn admission_mask(table: &Table, schema: &SchemaMapping) -> Vec<bool> {
    let mut mask = vec![false; table.row_count()];
    for field in ADMISSION_FIELDS {
        if let Some(column) = schema
            .resolve(field, table)
            .and_then(|name| table.column(name))
        {
            for (keep, cell) in mask.iter_mut().zip(&column.cells) {
                *keep |= cell.is_some();
            }
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    fn text(s: &str) -> Option<Value> {
        Some(Value::Text(s.to_string()))
    }

    #[test]
    fn admission_requires_one_signal() {
        let table = Table::from_rows(
            vec!["date".into(), "product".into()],
            vec![vec![None, None], vec![text("2024-01-01"), None], vec![None, text("A")]],
        );
        let mut schema = SchemaMapping::new();
        schema.insert(CanonicalField::Date, "date");
        schema.insert(CanonicalField::Product, "product");
        assert_eq!(admission_mask(&table, &schema), vec![false, true, true]);
    }

    #[test]
    fn unmapped_admission_fields_drop_everything() {
        let table = Table::from_rows(vec!["note".into()], vec![vec![text("hello")]]);
        let err = clean(&table, None).unwrap_err();
        assert_eq!(err, CleanError::NoRowsAdmitted { input_rows: 1 });
    }

    #[test]
    fn headers_are_trimmed_before_inference() {
        let table = Table::from_rows(
            vec![" Product ".into(), " Amount".into()],
            vec![vec![text("A"), text("10")]],
        );
        let cleaned = clean(&table, None).unwrap();
        assert_eq!(cleaned.schema.get(CanonicalField::Product), Some("Product"));
        assert_eq!(cleaned.schema.get(CanonicalField::Revenue), Some("Amount"));
        assert_eq!(table.headers()[0], " Product ");
    }
}
