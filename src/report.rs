//! Aggregate views over a cleaned table.
//!
//! Every view resolves the canonical fields it needs through the mapping.
//! When one is missing the view returns `None`, which callers present as
//! "unavailable" rather than as zero.

use std::collections::BTreeMap;

use chrono::{Datelike, Days, Months, NaiveDate};
use clap::ValueEnum;
use itertools::Itertools;
use serde::Serialize;

use crate::{
    clean::Cleaned,
    data::Value,
    fields::{CanonicalField, is_synthesized_column},
    frame::Table,
    mapping::SchemaMapping,
};

/// Label used for rows whose product or category is null.
pub const UNKNOWN_LABEL: &str = "Unknown";

const SAMPLE_FIELDS: [CanonicalField; 7] = [
    CanonicalField::Date,
    CanonicalField::Product,
    CanonicalField::Category,
    CanonicalField::Quantity,
    CanonicalField::Revenue,
    CanonicalField::Profit,
    CanonicalField::Margin,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Day,
    #[default]
    Week,
    Month,
}

impl Frequency {
    /// Last day of the period containing `date`. Weeks end on Sunday.
    pub fn period_end(self, date: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Day => date,
            Frequency::Week => {
                let remaining = 6 - u64::from(date.weekday().num_days_from_monday());
                date.checked_add_days(Days::new(remaining)).unwrap_or(date)
            }
            Frequency::Month => month_end(date),
        }
    }

    fn next_period_end(self, end: NaiveDate) -> Option<NaiveDate> {
        match self {
            Frequency::Day => end.checked_add_days(Days::new(1)),
            Frequency::Week => end.checked_add_days(Days::new(7)),
            Frequency::Month => end.checked_add_days(Days::new(1)).map(month_end),
        }
    }
}

fn month_end(date: NaiveDate) -> NaiveDate {
    date.checked_sub_days(Days::new(u64::from(date.day0())))
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}

fn numbers(table: &Table, schema: &SchemaMapping, field: CanonicalField) -> Option<Vec<Option<f64>>> {
    let column = schema.resolve(field, table)?;
    table.column(column).map(|c| c.numbers().collect())
}

fn dates(table: &Table, schema: &SchemaMapping) -> Option<Vec<Option<NaiveDate>>> {
    let column = schema.resolve(CanonicalField::Date, table)?;
    table.column(column).map(|c| {
        c.cells
            .iter()
            .map(|cell| cell.as_ref().and_then(Value::as_datetime).map(|dt| dt.date()))
            .collect()
    })
}

fn labels(table: &Table, schema: &SchemaMapping, field: CanonicalField) -> Option<Vec<String>> {
    let column = schema.resolve(field, table)?;
    table.column(column).map(|c| {
        c.cells
            .iter()
            .map(|cell| match cell {
                Some(value) => value.as_display(),
                None => UNKNOWN_LABEL.to_string(),
            })
            .collect()
    })
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Headline figures for a cleaned table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    pub rows: usize,
    pub total_revenue: Option<f64>,
    pub total_profit: Option<f64>,
    pub average_margin: Option<f64>,
}

/// Computes KPIs, optionally restricted to rows whose product equals
/// `product_filter`. A filter on an unmapped product field matches nothing.
pub fn kpis(table: &Table, schema: &SchemaMapping, product_filter: Option<&str>) -> Kpis {
    let mask: Vec<bool> = match product_filter {
        None => vec![true; table.row_count()],
        Some(wanted) => {
            let wanted = wanted.trim();
            match schema
                .resolve(CanonicalField::Product, table)
                .and_then(|name| table.column(name))
            {
                Some(column) => column
                    .cells
                    .iter()
                    .map(|cell| cell.as_ref().is_some_and(|v| v.as_display() == wanted))
                    .collect(),
                None => vec![false; table.row_count()],
            }
        }
    };
    let selected = |values: Vec<Option<f64>>| -> Vec<f64> {
        values
            .into_iter()
            .zip(&mask)
            .filter_map(|(value, keep)| if *keep { value } else { None })
            .collect()
    };

    Kpis {
        rows: mask.iter().filter(|keep| **keep).count(),
        total_revenue: numbers(table, schema, CanonicalField::Revenue)
            .map(|values| selected(values).into_iter().sum()),
        total_profit: numbers(table, schema, CanonicalField::Profit)
            .map(|values| selected(values).into_iter().sum()),
        average_margin: numbers(table, schema, CanonicalField::Margin)
            .and_then(|values| mean(selected(values).into_iter())),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodRevenue {
    pub period_end: NaiveDate,
    pub revenue: f64,
}

/// Walks every period between the first and last key of `sums`, filling gaps
/// with the default value.
fn fill_periods<T: Clone + Default>(
    sums: BTreeMap<NaiveDate, T>,
    freq: Frequency,
) -> Vec<(NaiveDate, T)> {
    let (Some(first), Some(last)) = (
        sums.keys().next().copied(),
        sums.keys().next_back().copied(),
    ) else {
        return Vec::new();
    };
    let mut filled = Vec::new();
    let mut cursor = Some(first);
    while let Some(period) = cursor
        && period <= last
    {
        filled.push((period, sums.get(&period).cloned().unwrap_or_default()));
        cursor = freq.next_period_end(period);
    }
    filled
}

/// Revenue summed per period. Rows with a null date or revenue are skipped.
pub fn revenue_over_time(
    table: &Table,
    schema: &SchemaMapping,
    freq: Frequency,
) -> Option<Vec<PeriodRevenue>> {
    let dates = dates(table, schema)?;
    let revenue = numbers(table, schema, CanonicalField::Revenue)?;
    let mut sums: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (date, value) in dates.into_iter().zip(revenue) {
        if let (Some(date), Some(value)) = (date, value) {
            *sums.entry(freq.period_end(date)).or_default() += value;
        }
    }
    Some(
        fill_periods(sums, freq)
            .into_iter()
            .map(|(period_end, revenue)| PeriodRevenue {
                period_end,
                revenue,
            })
            .collect(),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodMargin {
    pub period_end: NaiveDate,
    pub profit: f64,
    pub revenue: f64,
    pub margin: Option<f64>,
}

/// Weekly profit over weekly revenue. A week with zero revenue has no margin.
pub fn margin_over_time(table: &Table, schema: &SchemaMapping) -> Option<Vec<PeriodMargin>> {
    let dates = dates(table, schema)?;
    let profit = numbers(table, schema, CanonicalField::Profit)?;
    let revenue = numbers(table, schema, CanonicalField::Revenue)?;
    let mut sums: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();
    for ((date, profit), revenue) in dates.into_iter().zip(profit).zip(revenue) {
        if let Some(date) = date {
            let entry = sums.entry(Frequency::Week.period_end(date)).or_default();
            entry.0 += profit.unwrap_or(0.0);
            entry.1 += revenue.unwrap_or(0.0);
        }
    }
    Some(
        fill_periods(sums, Frequency::Week)
            .into_iter()
            .map(|(period_end, (profit, revenue))| PeriodMargin {
                period_end,
                profit,
                revenue,
                margin: (revenue != 0.0)
                    .then(|| profit / revenue)
                    .filter(|m| m.is_finite()),
            })
            .collect(),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductTotal {
    pub product: String,
    pub revenue: f64,
    pub profit: Option<f64>,
}

/// The `n` products with the highest revenue; ties are ordered by name.
pub fn top_products(table: &Table, schema: &SchemaMapping, n: usize) -> Option<Vec<ProductTotal>> {
    let products = labels(table, schema, CanonicalField::Product)?;
    let revenue = numbers(table, schema, CanonicalField::Revenue)?;
    let profit = numbers(table, schema, CanonicalField::Profit);

    let mut totals: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for (idx, (product, revenue)) in products.into_iter().zip(revenue).enumerate() {
        let entry = totals.entry(product).or_default();
        entry.0 += revenue.unwrap_or(0.0);
        entry.1 += profit
            .as_ref()
            .and_then(|values| values.get(idx).copied().flatten())
            .unwrap_or(0.0);
    }
    Some(
        totals
            .into_iter()
            .map(|(product, (revenue, total_profit))| ProductTotal {
                product,
                revenue,
                profit: profit.as_ref().map(|_| total_profit),
            })
            .sorted_by(|a, b| {
                b.revenue
                    .total_cmp(&a.revenue)
                    .then_with(|| a.product.cmp(&b.product))
            })
            .take(n)
            .collect(),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub category: String,
    pub revenue: f64,
    pub share: Option<f64>,
}

/// Revenue per category with its share of total revenue, largest first.
pub fn category_share(table: &Table, schema: &SchemaMapping) -> Option<Vec<CategoryShare>> {
    let categories = labels(table, schema, CanonicalField::Category)?;
    let revenue = numbers(table, schema, CanonicalField::Revenue)?;
    let totals = categories
        .into_iter()
        .zip(revenue)
        .map(|(category, revenue)| (category, revenue.unwrap_or(0.0)))
        .into_grouping_map()
        .sum();
    let grand_total: f64 = totals.values().sum();
    Some(
        totals
            .into_iter()
            .map(|(category, revenue)| CategoryShare {
                share: (grand_total != 0.0).then(|| revenue / grand_total),
                category,
                revenue,
            })
            .sorted_by(|a, b| {
                b.revenue
                    .total_cmp(&a.revenue)
                    .then_with(|| a.category.cmp(&b.category))
            })
            .collect(),
    )
}

/// Up to `n` rows of the mapped display fields, newest first when a date is
/// mapped. Rows without a date sort last.
pub fn sales_sample(table: &Table, schema: &SchemaMapping, n: usize) -> Table {
    let names = SAMPLE_FIELDS
        .iter()
        .filter_map(|field| schema.resolve(*field, table))
        .map(str::to_string)
        .unique()
        .collect::<Vec<_>>();
    let selected = table.select(&names);
    let order = match dates(table, schema) {
        Some(dates) => (0..table.row_count())
            .sorted_by(|a, b| dates[*b].cmp(&dates[*a]).then_with(|| a.cmp(b)))
            .take(n)
            .collect::<Vec<_>>(),
        None => (0..table.row_count().min(n)).collect(),
    };
    selected.take_rows(&order)
}

/// Before/after summary of one cleaning run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub raw_rows: usize,
    pub cleaned_rows: usize,
    pub dropped_rows: usize,
    /// Share of null cells per mapped field in the cleaned table.
    pub null_rates: BTreeMap<CanonicalField, f64>,
    pub computed_columns: Vec<String>,
    pub issues: Vec<String>,
}

impl Diagnostics {
    pub fn compute(raw: &Table, cleaned: &Cleaned) -> Self {
        let rows = cleaned.table.row_count();
        let null_rates = cleaned
            .schema
            .iter()
            .filter_map(|(field, column)| {
                let column = cleaned.table.column(column)?;
                let rate = if rows == 0 {
                    0.0
                } else {
                    column.null_count() as f64 / rows as f64
                };
                Some((field, rate))
            })
            .collect();
        let computed_columns = cleaned
            .table
            .headers()
            .into_iter()
            .filter(|name| is_synthesized_column(name))
            .collect();
        Diagnostics {
            raw_rows: raw.row_count(),
            cleaned_rows: rows,
            dropped_rows: raw.row_count().saturating_sub(rows),
            null_rates,
            computed_columns,
            issues: cleaned
                .report
                .issues
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weeks_end_on_sunday() {
        // 2024-01-01 was a Monday.
        assert_eq!(Frequency::Week.period_end(ymd(2024, 1, 1)), ymd(2024, 1, 7));
        assert_eq!(Frequency::Week.period_end(ymd(2024, 1, 7)), ymd(2024, 1, 7));
        assert_eq!(Frequency::Week.period_end(ymd(2024, 1, 8)), ymd(2024, 1, 14));
    }

    #[test]
    fn months_end_on_their_last_day() {
        assert_eq!(Frequency::Month.period_end(ymd(2024, 2, 10)), ymd(2024, 2, 29));
        assert_eq!(Frequency::Month.period_end(ymd(2023, 12, 31)), ymd(2023, 12, 31));
        assert_eq!(
            Frequency::Month.next_period_end(ymd(2024, 1, 31)),
            Some(ymd(2024, 2, 29))
        );
    }

    #[test]
    fn gaps_are_filled_with_defaults() {
        let sums = BTreeMap::from([(ymd(2024, 1, 1), 5.0), (ymd(2024, 1, 3), 7.0)]);
        let filled = fill_periods(sums, Frequency::Day);
        assert_eq!(
            filled,
            vec![
                (ymd(2024, 1, 1), 5.0),
                (ymd(2024, 1, 2), 0.0),
                (ymd(2024, 1, 3), 7.0)
            ]
        );
    }

    #[test]
    fn mean_of_nothing_is_none() {
        assert_eq!(mean(std::iter::empty()), None);
        assert_eq!(mean([1.0, 3.0].into_iter()), Some(2.0));
    }
}
