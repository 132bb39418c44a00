mod common;

use std::fs;

use chrono::NaiveDate;
use common::{fixture_path, numbers};
use encoding_rs::UTF_8;
use profit_finder::{
    clean::clean,
    data::Value,
    fields::{CanonicalField, REVENUE_COMPUTED_COLUMN},
    ingest::read_upload,
};

fn workbook() -> profit_finder::frame::Table {
    let bytes = fs::read(fixture_path("sales.xlsx")).unwrap();
    read_upload(&bytes, UTF_8).unwrap()
}

fn midnight(y: i32, m: u32, d: u32) -> Value {
    Value::DateTime(NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap())
}

#[test]
fn first_worksheet_is_read_with_typed_cells() {
    let table = workbook();
    assert_eq!(table.headers(), vec!["Order Date", "Product", "Qty", "Unit Price"]);
    assert_eq!(table.row_count(), 3);
    assert_eq!(table.cell("Order Date", 0), Some(&midnight(2024, 1, 1)));
    assert_eq!(table.cell("Product", 1), Some(&Value::Text("Coffee".into())));
    assert_eq!(table.cell("Qty", 0), Some(&Value::Number(2.0)));
    assert_eq!(table.cell("Unit Price", 1), Some(&Value::Number(3.25)));
    assert_eq!(table.cell("Qty", 1), None);
    assert_eq!(table.cell("Product", 2), None);
}

#[test]
fn workbook_uploads_clean_like_delimited_ones() {
    let cleaned = clean(&workbook(), None).unwrap();
    assert_eq!(cleaned.table.row_count(), 3);
    assert_eq!(cleaned.schema.get(CanonicalField::Quantity), Some("Qty"));
    assert_eq!(
        numbers(&cleaned.table, REVENUE_COMPUTED_COLUMN),
        vec![Some(9.0), Some(3.25), Some(10.0)]
    );
}
