mod common;

use chrono::NaiveDate;
use common::{fixture_path, text_table};
use encoding_rs::UTF_8;
use profit_finder::{
    clean::{Cleaned, clean},
    ingest::read_upload_path,
    report::{
        self, Frequency, PeriodRevenue, UNKNOWN_LABEL, category_share, kpis, margin_over_time,
        revenue_over_time, sales_sample, top_products,
    },
};

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn messy_sales() -> Cleaned {
    let raw = read_upload_path(&fixture_path("messy_sales.csv"), UTF_8).unwrap();
    clean(&raw, None).unwrap()
}

fn close(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() < 1e-9
}

#[test]
fn kpis_cover_revenue_profit_and_margin() {
    let cleaned = messy_sales();
    let kpis = kpis(&cleaned.table, &cleaned.schema, None);
    assert_eq!(kpis.rows, 5);
    assert!(close(kpis.total_revenue.unwrap(), 4070.5));
    assert!(close(kpis.total_profit.unwrap(), 2442.5));
    assert!(kpis.average_margin.unwrap() > 0.6);
}

#[test]
fn product_filter_narrows_kpis() {
    let cleaned = messy_sales();
    let kpis = kpis(&cleaned.table, &cleaned.schema, Some("Gadget"));
    assert_eq!(kpis.rows, 2);
    assert!(close(kpis.total_revenue.unwrap(), 4025.5));
    let none = report::kpis(&cleaned.table, &cleaned.schema, Some("Nothing"));
    assert_eq!(none.rows, 0);
    assert_eq!(none.total_revenue, Some(0.0));
    assert_eq!(none.average_margin, None);
}

#[test]
fn missing_fields_make_views_unavailable() {
    let raw = text_table(&["product", "revenue"], &[&["Tea", "5"]]);
    let cleaned = clean(&raw, None).unwrap();
    let kpis = kpis(&cleaned.table, &cleaned.schema, None);
    assert_eq!(kpis.total_revenue, Some(5.0));
    assert_eq!(kpis.total_profit, None);
    assert_eq!(kpis.average_margin, None);
    assert!(revenue_over_time(&cleaned.table, &cleaned.schema, Frequency::Day).is_none());
    assert!(margin_over_time(&cleaned.table, &cleaned.schema).is_none());
    assert!(category_share(&cleaned.table, &cleaned.schema).is_none());
    assert!(top_products(&cleaned.table, &cleaned.schema, 5).is_some());
}

#[test]
fn weekly_revenue_fills_empty_weeks() {
    let cleaned = messy_sales();
    let weekly = revenue_over_time(&cleaned.table, &cleaned.schema, Frequency::Week).unwrap();
    assert_eq!(
        weekly,
        vec![
            PeriodRevenue {
                period_end: ymd(2024, 1, 7),
                revenue: 45.5
            },
            PeriodRevenue {
                period_end: ymd(2024, 1, 14),
                revenue: 10.0
            },
            PeriodRevenue {
                period_end: ymd(2024, 1, 21),
                revenue: 0.0
            },
            PeriodRevenue {
                period_end: ymd(2024, 1, 28),
                revenue: 0.0
            },
            PeriodRevenue {
                period_end: ymd(2024, 2, 4),
                revenue: 4000.0
            },
        ]
    );
}

#[test]
fn monthly_revenue_uses_month_ends() {
    let cleaned = messy_sales();
    let monthly = revenue_over_time(&cleaned.table, &cleaned.schema, Frequency::Month).unwrap();
    let periods = monthly.iter().map(|p| p.period_end).collect::<Vec<_>>();
    assert_eq!(periods, vec![ymd(2024, 1, 31), ymd(2024, 2, 29)]);
}

#[test]
fn weekly_margin_is_null_for_empty_weeks() {
    let cleaned = messy_sales();
    let margins = margin_over_time(&cleaned.table, &cleaned.schema).unwrap();
    assert_eq!(margins.len(), 5);
    assert!(close(margins[0].margin.unwrap(), 27.5 / 45.5));
    assert_eq!(margins[2].margin, None);
}

#[test]
fn top_products_and_categories_rank_by_revenue() {
    let cleaned = messy_sales();
    let products = top_products(&cleaned.table, &cleaned.schema, 2).unwrap();
    let names = products.iter().map(|p| p.product.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["Gadget", "Widget"]);
    assert!(close(products[1].profit.unwrap(), 18.0));

    let shares = category_share(&cleaned.table, &cleaned.schema).unwrap();
    let labels = shares.iter().map(|s| s.category.as_str()).collect::<Vec<_>>();
    assert_eq!(labels, vec!["Toys", "Tools", UNKNOWN_LABEL]);
    let total_share: f64 = shares.iter().filter_map(|s| s.share).sum();
    assert!(close(total_share, 1.0));
}

#[test]
fn sales_sample_is_newest_first() {
    let cleaned = messy_sales();
    let sample = sales_sample(&cleaned.table, &cleaned.schema, 3);
    assert_eq!(sample.row_count(), 3);
    assert_eq!(sample.headers()[0], "_parsed_date");
    let dates = sample.display_rows().into_iter().map(|row| row[0].clone()).collect::<Vec<_>>();
    assert_eq!(dates, vec!["2024-02-01", "2024-01-09", "2024-01-02"]);
}
