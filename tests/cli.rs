mod common;

use std::fs;

use assert_cmd::Command;
use common::{TestWorkspace, fixture_path};
use predicates::{prelude::*, str::contains};
use serde_json::Value;

fn bin() -> Command {
    Command::cargo_bin("profit-finder").expect("binary exists")
}

#[test]
fn probe_prints_and_saves_the_inferred_mapping() {
    let workspace = TestWorkspace::new();
    let mapping_path = workspace.path().join("mapping.json");
    bin()
        .args(["probe", "-i"])
        .arg(fixture_path("messy_sales.csv"))
        .arg("--mapping-out")
        .arg(&mapping_path)
        .assert()
        .success()
        .stdout(contains("revenue"))
        .stdout(contains("Total"))
        .stdout(contains("Unit Price"));

    let saved: Value = serde_json::from_str(&fs::read_to_string(&mapping_path).unwrap()).unwrap();
    assert_eq!(saved["date"], "Order Date");
    assert_eq!(saved["currency"], Value::Null);
}

#[test]
fn clean_writes_normalized_csv_and_final_mapping() {
    let workspace = TestWorkspace::new();
    let output = workspace.path().join("clean.csv");
    let mapping_path = workspace.path().join("final.yaml");
    bin()
        .args(["clean", "-i"])
        .arg(fixture_path("messy_sales.csv"))
        .arg("-o")
        .arg(&output)
        .arg("--mapping-out")
        .arg(&mapping_path)
        .assert()
        .success();

    let contents = fs::read_to_string(&output).unwrap();
    let mut reader = csv::Reader::from_reader(contents.as_bytes());
    let headers = reader.headers().unwrap().clone();
    assert!(headers.iter().any(|h| h == "profit"));
    assert!(headers.iter().any(|h| h == "_parsed_date"));
    assert_eq!(reader.records().count(), 5);

    let yaml = fs::read_to_string(&mapping_path).unwrap();
    assert!(yaml.contains("profit: profit"));
    assert!(yaml.contains("date: _parsed_date"));
}

#[test]
fn clean_honours_map_and_unset_flags() {
    let workspace = TestWorkspace::new();
    let input = workspace.write(
        "sales.csv",
        "when,what,gross,net\n2024-01-01,Tea,12,10\n2024-01-02,Coffee,30,25\n",
    );
    bin()
        .args(["clean", "-i"])
        .arg(&input)
        .args(["--map", "date=when", "--map", "product=what", "--map", "revenue=net"])
        .assert()
        .success()
        .stdout(contains("\"Tea\""))
        .stdout(contains("\"2024-01-02\""));
}

#[test]
fn clean_reads_mapping_files() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("sales.tsv", "when\twhat\tnet\n2024-01-01\tTea\t10\n");
    let mapping = workspace.write(
        "mapping.json",
        r#"{"date": "when", "product": "what", "revenue": "net", "cost": "None"}"#,
    );
    bin()
        .args(["clean", "-i"])
        .arg(&input)
        .arg("-m")
        .arg(&mapping)
        .assert()
        .success()
        .stdout(contains("\"10\""));
}

#[test]
fn conflicting_numeric_mapping_fails() {
    bin()
        .args(["clean", "-i"])
        .arg(fixture_path("messy_sales.csv"))
        .args(["--map", "cost=Total"])
        .assert()
        .failure()
        .stderr(contains("more than one numeric field"));
}

#[test]
fn unknown_field_in_map_flag_fails() {
    bin()
        .args(["clean", "-i"])
        .arg(fixture_path("messy_sales.csv"))
        .args(["--map", "discount=Total"])
        .assert()
        .failure()
        .stderr(contains("discount"));
}

#[test]
fn upload_without_usable_rows_fails() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("notes.csv", "note\nhello\n");
    bin()
        .args(["clean", "-i"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(contains("no rows survived cleaning"));
}

#[test]
fn preview_shows_samples_and_diagnostics() {
    bin()
        .args(["preview", "--rows", "3", "-i"])
        .arg(fixture_path("messy_sales.csv"))
        .assert()
        .success()
        .stdout(contains("Original (6 row(s))"))
        .stdout(contains("Cleaned (5 row(s))"))
        .stdout(contains("dropped rows"))
        .stdout(contains("cost__computed"));
}

#[test]
fn report_prints_kpis_and_aggregates() {
    bin()
        .args(["report", "--freq", "month", "--top", "2", "-i"])
        .arg(fixture_path("messy_sales.csv"))
        .assert()
        .success()
        .stdout(contains("4070.50"))
        .stdout(contains("2024-02-29"))
        .stdout(contains("Top 2 products by revenue"))
        .stdout(contains("Unknown"));
}

#[test]
fn report_marks_missing_views_unavailable() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("sales.csv", "product,revenue\nTea,5\n");
    bin()
        .args(["report", "-i"])
        .arg(&input)
        .assert()
        .success()
        .stdout(contains("unavailable (map date and revenue)"))
        .stdout(contains("N/A"));
}

#[test]
fn latin1_input_needs_an_encoding_flag() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("sales.csv", b"product,revenue\ncaf\xe9,5\n".as_slice());
    bin()
        .args(["clean", "-i"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(contains("not valid UTF-8"));
    bin()
        .args(["clean", "--input-encoding", "latin1", "-i"])
        .arg(&input)
        .assert()
        .success()
        .stdout(contains("café"));
}

#[test]
fn clean_reads_xlsx_workbooks() {
    bin()
        .args(["clean", "-i"])
        .arg(fixture_path("sales.xlsx"))
        .assert()
        .success()
        .stdout(contains("\"2024-01-03\""))
        .stdout(contains("\"Coffee\""))
        .stdout(contains("ignored").not());
}
