//! Derivation of revenue, cost total, profit, margin and quantity.
//!
//! [`derive`] consumes a (table, mapping) pair and returns a new pair. Each
//! step runs only when its prerequisites resolve in the mapping as it stands
//! at that point, so later steps see columns registered by earlier ones.
//! A step that cannot run is recorded as [`DerivationOutcome::Skipped`]
//! with the fields it was missing.

use std::collections::BTreeMap;

use log::{debug, warn};
use serde::Serialize;

use crate::{
    fields::{
        COST_COMPUTED_COLUMN, CanonicalField, MARGIN_COLUMN, PROFIT_COLUMN,
        QUANTITY_INFERRED_COLUMN, REVENUE_COMPUTED_COLUMN,
    },
    frame::Table,
    mapping::SchemaMapping,
    normalize::coerce_numeric,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DerivationOutcome {
    /// The input already supplied the field.
    Provided { column: String },
    /// The engine computed the field into `column`.
    Computed { column: String },
    /// The field could not be computed.
    Skipped { missing: Vec<CanonicalField> },
}

pub type Outcomes = BTreeMap<CanonicalField, DerivationOutcome>;

#[derive(Debug, Clone, PartialEq)]
pub struct Derived {
    pub table: Table,
    pub schema: SchemaMapping,
    pub outcomes: Outcomes,
}

fn numbers(table: &Table, schema: &SchemaMapping, field: CanonicalField) -> Option<Vec<Option<f64>>> {
    let column = schema.resolve(field, table)?;
    table.column(column).map(|c| coerce_numeric(&c.cells))
}

fn coerce_in_place(table: &mut Table, schema: &SchemaMapping, field: CanonicalField) {
    if let Some(values) = numbers(table, schema, field)
        && let Some(column) = schema.get(field)
    {
        table.set_numbers(column, values);
    }
}

fn missing(table: &Table, schema: &SchemaMapping, fields: &[CanonicalField]) -> Vec<CanonicalField> {
    fields
        .iter()
        .copied()
        .filter(|field| schema.resolve(*field, table).is_none())
        .collect()
}

fn multiply(left: &[Option<f64>], right: &[Option<f64>]) -> Vec<Option<f64>> {
    left.iter()
        .zip(right)
        .map(|(a, b)| Some((*a)? * (*b)?).filter(|v| v.is_finite()))
        .collect()
}

/// Column-wise `profit / revenue`; null where revenue is null or zero or the
/// quotient is not finite.
pub fn margin_column(profit: &[Option<f64>], revenue: &[Option<f64>]) -> Vec<Option<f64>> {
    profit
        .iter()
        .zip(revenue)
        .map(|(p, r)| match (p, r) {
            (Some(p), Some(r)) if *r != 0.0 => Some(p / r).filter(|m| m.is_finite()),
            _ => None,
        })
        .collect()
}

/// Runs the derivation steps over an owned (table, mapping) pair.
pub fn derive(mut table: Table, mut schema: SchemaMapping) -> Derived {
    let mut outcomes = Outcomes::new();
    let rows = table.row_count();

    for field in CanonicalField::NUMERIC {
        coerce_in_place(&mut table, &schema, field);
    }

    // Revenue from price * quantity.
    if let Some(column) = schema.resolve(CanonicalField::Revenue, &table) {
        outcomes.insert(
            CanonicalField::Revenue,
            DerivationOutcome::Provided {
                column: column.to_string(),
            },
        );
    } else {
        match (
            numbers(&table, &schema, CanonicalField::Price),
            numbers(&table, &schema, CanonicalField::Quantity),
        ) {
            (Some(price), Some(quantity)) => {
                table.set_numbers(REVENUE_COMPUTED_COLUMN, multiply(&price, &quantity));
                schema.insert(CanonicalField::Revenue, REVENUE_COMPUTED_COLUMN);
                debug!("Computed revenue as price * quantity");
                outcomes.insert(
                    CanonicalField::Revenue,
                    DerivationOutcome::Computed {
                        column: REVENUE_COMPUTED_COLUMN.to_string(),
                    },
                );
            }
            _ => {
                outcomes.insert(
                    CanonicalField::Revenue,
                    DerivationOutcome::Skipped {
                        missing: missing(
                            &table,
                            &schema,
                            &[CanonicalField::Price, CanonicalField::Quantity],
                        ),
                    },
                );
            }
        }
    }

    // Total cost from per-unit cost * quantity.
    match (
        numbers(&table, &schema, CanonicalField::Cost),
        numbers(&table, &schema, CanonicalField::Quantity),
    ) {
        (Some(cost), Some(quantity)) => {
            table.set_numbers(COST_COMPUTED_COLUMN, multiply(&cost, &quantity));
            schema.insert(CanonicalField::CostTotal, COST_COMPUTED_COLUMN);
            outcomes.insert(
                CanonicalField::CostTotal,
                DerivationOutcome::Computed {
                    column: COST_COMPUTED_COLUMN.to_string(),
                },
            );
        }
        _ => {
            outcomes.insert(
                CanonicalField::CostTotal,
                DerivationOutcome::Skipped {
                    missing: missing(
                        &table,
                        &schema,
                        &[CanonicalField::Cost, CanonicalField::Quantity],
                    ),
                },
            );
        }
    }

    coerce_in_place(&mut table, &schema, CanonicalField::Revenue);
    coerce_in_place(&mut table, &schema, CanonicalField::CostTotal);

    // Profit and margin.
    match (
        numbers(&table, &schema, CanonicalField::Revenue),
        numbers(&table, &schema, CanonicalField::CostTotal),
    ) {
        (Some(revenue), Some(cost_total)) => {
            let profit = revenue
                .iter()
                .zip(&cost_total)
                .map(|(r, c)| Some(r.unwrap_or(0.0) - c.unwrap_or(0.0)))
                .collect::<Vec<_>>();
            let margin = margin_column(&profit, &revenue);
            table.set_numbers(PROFIT_COLUMN, profit);
            table.set_numbers(MARGIN_COLUMN, margin);
            schema.insert(CanonicalField::Profit, PROFIT_COLUMN);
            schema.insert(CanonicalField::Margin, MARGIN_COLUMN);
            for (field, column) in [
                (CanonicalField::Profit, PROFIT_COLUMN),
                (CanonicalField::Margin, MARGIN_COLUMN),
            ] {
                outcomes.insert(
                    field,
                    DerivationOutcome::Computed {
                        column: column.to_string(),
                    },
                );
            }
        }
        _ => {
            let missing = missing(
                &table,
                &schema,
                &[CanonicalField::Revenue, CanonicalField::CostTotal],
            );
            debug!("Profit and margin unavailable; missing {missing:?}");
            table.set_numbers(PROFIT_COLUMN, vec![None; rows]);
            table.set_numbers(MARGIN_COLUMN, vec![None; rows]);
            schema.remove(CanonicalField::Profit);
            schema.remove(CanonicalField::Margin);
            outcomes.insert(
                CanonicalField::Profit,
                DerivationOutcome::Skipped {
                    missing: missing.clone(),
                },
            );
            outcomes.insert(CanonicalField::Margin, DerivationOutcome::Skipped { missing });
        }
    }

    // Quantity from revenue / price.
    if let Some(column) = schema.resolve(CanonicalField::Quantity, &table) {
        outcomes.insert(
            CanonicalField::Quantity,
            DerivationOutcome::Provided {
                column: column.to_string(),
            },
        );
    } else {
        match (
            numbers(&table, &schema, CanonicalField::Price),
            numbers(&table, &schema, CanonicalField::Revenue),
        ) {
            (Some(price), Some(revenue)) => {
                let inferred = revenue
                    .iter()
                    .zip(&price)
                    .map(|(r, p)| {
                        let quotient = (r.unwrap_or(f64::NAN) / p.unwrap_or(f64::NAN)).round();
                        Some(if quotient.is_finite() { quotient } else { 0.0 })
                    })
                    .collect();
                table.set_numbers(QUANTITY_INFERRED_COLUMN, inferred);
                schema.insert(CanonicalField::Quantity, QUANTITY_INFERRED_COLUMN);
                debug!("Inferred quantity as round(revenue / price)");
                outcomes.insert(
                    CanonicalField::Quantity,
                    DerivationOutcome::Computed {
                        column: QUANTITY_INFERRED_COLUMN.to_string(),
                    },
                );
            }
            _ => {
                outcomes.insert(
                    CanonicalField::Quantity,
                    DerivationOutcome::Skipped {
                        missing: missing(
                            &table,
                            &schema,
                            &[CanonicalField::Price, CanonicalField::Revenue],
                        ),
                    },
                );
            }
        }
    }

    let dropped = schema.retain_present(&table);
    if !dropped.is_empty() {
        warn!("Dropped mapping(s) with no matching column: {dropped:?}");
    }

    Derived {
        table,
        schema,
        outcomes,
    }
}
