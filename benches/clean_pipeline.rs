use criterion::{Criterion, criterion_group, criterion_main};
use encoding_rs::UTF_8;
use profit_finder::{clean::clean, ingest::read_upload, report};

fn generate_sales(rows: usize) -> Vec<u8> {
    let mut csv = String::from("Order ID,Order Date,Product,Category,Qty,Unit Price,Unit Cost\n");
    for i in 0..rows {
        let product = match i % 4 {
            0 => "Widget",
            1 => "Gadget",
            2 => "Gizmo",
            _ => "N/A",
        };
        let day = (i % 28) + 1;
        let month = (i % 12) + 1;
        let qty = if i % 7 == 0 { String::new() } else { (i % 5 + 1).to_string() };
        csv.push_str(&format!(
            "{i},{month:02}/{day:02}/2024,{product},Cat {},{qty},\"${},{:03}.50\",${}.25\n",
            i % 3,
            i % 3 + 1,
            i % 1000,
            i % 40
        ));
    }
    csv.into_bytes()
}

fn bench_clean(c: &mut Criterion) {
    let bytes = generate_sales(20_000);
    let raw = read_upload(&bytes, UTF_8).expect("read upload");

    c.bench_function("read_upload_20k", |b| {
        b.iter(|| read_upload(&bytes, UTF_8).expect("read upload"))
    });
    c.bench_function("clean_20k", |b| b.iter(|| clean(&raw, None).expect("clean")));

    let cleaned = clean(&raw, None).expect("clean");
    c.bench_function("weekly_revenue_20k", |b| {
        b.iter(|| {
            report::revenue_over_time(&cleaned.table, &cleaned.schema, report::Frequency::Week)
        })
    });
}

criterion_group!(benches, bench_clean);
criterion_main!(benches);
