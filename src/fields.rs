//! Canonical field roles and the alias table used to recognise them.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Column roles the engine understands regardless of how a file names them.
///
/// The first nine variants are read from the input and may be inferred or
/// overridden by the user. `CostTotal`, `Profit` and `Margin` are only ever
/// registered by the derivation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    OrderId,
    Date,
    Product,
    Category,
    Quantity,
    Price,
    Cost,
    Revenue,
    Currency,
    CostTotal,
    Profit,
    Margin,
}

pub const PARSED_DATE_COLUMN: &str = "_parsed_date";
pub const REVENUE_COMPUTED_COLUMN: &str = "revenue__computed";
pub const COST_COMPUTED_COLUMN: &str = "cost__computed";
pub const QUANTITY_INFERRED_COLUMN: &str = "quantity__inferred";
pub const PROFIT_COLUMN: &str = "profit";
pub const MARGIN_COLUMN: &str = "margin";

/// Column names the engine writes itself.
pub const SYNTHESIZED_COLUMNS: &[&str] = &[
    PARSED_DATE_COLUMN,
    REVENUE_COMPUTED_COLUMN,
    COST_COMPUTED_COLUMN,
    QUANTITY_INFERRED_COLUMN,
    PROFIT_COLUMN,
    MARGIN_COLUMN,
];

impl CanonicalField {
    /// Fields read from the input, in inference order.
    pub const INPUTS: [CanonicalField; 9] = [
        CanonicalField::OrderId,
        CanonicalField::Date,
        CanonicalField::Product,
        CanonicalField::Category,
        CanonicalField::Quantity,
        CanonicalField::Price,
        CanonicalField::Cost,
        CanonicalField::Revenue,
        CanonicalField::Currency,
    ];

    /// Fields whose values take part in arithmetic.
    pub const NUMERIC: [CanonicalField; 4] = [
        CanonicalField::Quantity,
        CanonicalField::Price,
        CanonicalField::Cost,
        CanonicalField::Revenue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::OrderId => "order_id",
            CanonicalField::Date => "date",
            CanonicalField::Product => "product",
            CanonicalField::Category => "category",
            CanonicalField::Quantity => "quantity",
            CanonicalField::Price => "price",
            CanonicalField::Cost => "cost",
            CanonicalField::Revenue => "revenue",
            CanonicalField::Currency => "currency",
            CanonicalField::CostTotal => "cost_total",
            CanonicalField::Profit => "profit",
            CanonicalField::Margin => "margin",
        }
    }

    /// Accepted raw-name variants in priority order. Empty for derived fields.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            CanonicalField::OrderId => &["order_id", "order", "id", "transaction_id", "txn_id"],
            CanonicalField::Date => &["date", "order_date", "sale_date", "timestamp", "created_at"],
            CanonicalField::Product => &[
                "product",
                "product_name",
                "item",
                "sku",
                "title",
                "product_title",
            ],
            CanonicalField::Category => &["category", "product_category", "cat", "category_name"],
            CanonicalField::Quantity => &["quantity", "qty", "units", "quantity_sold", "count"],
            CanonicalField::Price => &["price", "unit_price", "selling_price", "price_per_unit"],
            CanonicalField::Cost => &["cost", "unit_cost", "cost_price", "cogs"],
            CanonicalField::Revenue => &["revenue", "total", "sale_amount", "amount", "subtotal"],
            CanonicalField::Currency => &["currency", "curr"],
            CanonicalField::CostTotal | CanonicalField::Profit | CanonicalField::Margin => &[],
        }
    }

    pub fn is_input(&self) -> bool {
        Self::INPUTS.contains(self)
    }

    pub fn is_numeric(&self) -> bool {
        Self::NUMERIC.contains(self)
    }

    pub fn all() -> impl Iterator<Item = CanonicalField> {
        Self::INPUTS.into_iter().chain([
            CanonicalField::CostTotal,
            CanonicalField::Profit,
            CanonicalField::Margin,
        ])
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalField {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        CanonicalField::all()
            .find(|field| field.as_str() == normalized)
            .ok_or_else(|| format!("Unknown canonical field '{value}'"))
    }
}

pub fn is_synthesized_column(name: &str) -> bool {
    SYNTHESIZED_COLUMNS.contains(&name)
}
