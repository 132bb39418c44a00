pub mod clean;
pub mod cli;
pub mod data;
pub mod derive;
pub mod fields;
pub mod frame;
pub mod inference;
pub mod ingest;
pub mod io_utils;
pub mod mapping;
pub mod matcher;
pub mod normalize;
pub mod report;
pub mod session;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use itertools::Itertools;
use log::{LevelFilter, debug, info, warn};

use crate::{
    clean::{Cleaned, clean},
    cli::{Cli, Commands, InputArgs, MappingArgs},
    derive::DerivationOutcome,
    fields::CanonicalField,
    frame::Table,
    inference::infer_schema,
    mapping::UserMapping,
    report::{Diagnostics, Kpis},
    session::Workbench,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("profit_finder", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Probe(args) => handle_probe(&args),
        Commands::Clean(args) => handle_clean(&args),
        Commands::Preview(args) => handle_preview(&args),
        Commands::Report(args) => handle_report(&args),
    }
}

fn load_upload(args: &InputArgs) -> Result<Table> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Reading '{}' (encoding {})",
        args.input.display(),
        encoding.name()
    );
    ingest::read_upload_path(&args.input, encoding)
}

/// Combines the mapping file with `--map`/`--unset` flags; flags win.
fn user_mapping(args: &MappingArgs) -> Result<Option<UserMapping>> {
    let mut user = match &args.mapping {
        Some(path) => UserMapping::load(path)
            .with_context(|| format!("Loading mapping from {path:?}"))?,
        None => UserMapping::new(),
    };
    for assignment in &args.assignments {
        let (field, column) = UserMapping::parse_assignment(assignment)?;
        user.set_column(field, column);
    }
    for name in &args.unset {
        let field = name
            .parse::<CanonicalField>()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Parsing --unset '{name}'"))?;
        user.unset(field);
    }
    debug!("User mapping has {} entr(ies)", user.len());
    Ok((!user.is_empty() || args.mapping.is_some()).then_some(user))
}

fn handle_probe(args: &cli::ProbeArgs) -> Result<()> {
    let mut raw = load_upload(&args.input)?;
    raw.trim_headers();
    let schema = infer_schema(&raw);
    let pairs = CanonicalField::INPUTS
        .iter()
        .map(|field| {
            (
                field.to_string(),
                schema.get(*field).unwrap_or("-").to_string(),
            )
        })
        .collect::<Vec<_>>();
    print!("{}", table::render_pairs(&pairs));
    info!(
        "Inferred {} of {} field(s) across {} column(s)",
        schema.len(),
        CanonicalField::INPUTS.len(),
        raw.width()
    );
    if let Some(path) = &args.mapping_out {
        schema
            .save(path)
            .with_context(|| format!("Writing mapping to {path:?}"))?;
        info!("Inferred mapping written to {path:?}");
    }
    Ok(())
}

fn log_outcomes(cleaned: &Cleaned) {
    for (field, outcome) in &cleaned.report.outcomes {
        match outcome {
            DerivationOutcome::Computed { column } => info!("Computed '{field}' into '{column}'"),
            DerivationOutcome::Skipped { missing } if !missing.is_empty() => {
                info!("'{field}' unavailable; missing {missing:?}")
            }
            _ => {}
        }
    }
}

fn clean_upload(input: &InputArgs, mapping: &MappingArgs) -> Result<Cleaned> {
    let raw = load_upload(input)?;
    let user = user_mapping(mapping)?;
    let cleaned = clean(&raw, user.as_ref())
        .with_context(|| format!("Cleaning {:?}", input.input))?;
    log_outcomes(&cleaned);
    Ok(cleaned)
}

fn handle_clean(args: &cli::CleanArgs) -> Result<()> {
    let cleaned = clean_upload(&args.input, &args.mapping)?;
    let delimiter = args
        .output_delimiter
        .unwrap_or(io_utils::DEFAULT_CSV_DELIMITER);
    let mut writer = io_utils::open_csv_writer(args.output.as_deref(), delimiter)?;
    io_utils::write_table(&mut writer, &cleaned.table)?;
    if let Some(path) = &args.output {
        info!(
            "Wrote {} cleaned row(s) to {path:?} ({} dropped)",
            cleaned.report.admitted_rows,
            cleaned.report.dropped_rows()
        );
    }
    if let Some(path) = &args.mapping_out {
        cleaned
            .schema
            .save(path)
            .with_context(|| format!("Writing mapping to {path:?}"))?;
        info!("Final mapping written to {path:?}");
    }
    Ok(())
}

fn handle_preview(args: &cli::PreviewArgs) -> Result<()> {
    let raw = load_upload(&args.input)?;
    let mut bench = Workbench::new();
    if let Err(err) = bench.load(raw) {
        warn!("Auto-detection alone does not clean this upload: {err}");
    }
    if let Some(user) = user_mapping(&args.mapping)? {
        bench.extend_pending(user);
    }
    let preview = bench.preview().context("Previewing cleaned upload")?;
    let cleaned = &preview.cleaned;
    log_outcomes(cleaned);

    let raw = bench.raw().context("Upload missing from session")?;
    println!("Original ({} row(s))", raw.row_count());
    table::print_frame(&raw.head(args.rows));
    println!();

    let mapped = cleaned
        .schema
        .iter()
        .map(|(_, column)| column.to_string())
        .unique()
        .collect::<Vec<_>>();
    println!("Cleaned ({} row(s))", cleaned.table.row_count());
    table::print_frame(&cleaned.table.select(&mapped).head(args.rows));
    println!();

    print_diagnostics(&preview.diagnostics);
    println!();
    print_kpis(&report::kpis(&cleaned.table, &cleaned.schema, None));
    Ok(())
}

fn print_diagnostics(diagnostics: &Diagnostics) {
    println!("Diagnostics");
    let mut pairs = vec![
        ("raw rows".to_string(), diagnostics.raw_rows.to_string()),
        ("cleaned rows".to_string(), diagnostics.cleaned_rows.to_string()),
        ("dropped rows".to_string(), diagnostics.dropped_rows.to_string()),
    ];
    pairs.extend(diagnostics.null_rates.iter().map(|(field, rate)| {
        (format!("null {field}"), format!("{:.1}%", rate * 100.0))
    }));
    if !diagnostics.computed_columns.is_empty() {
        pairs.push((
            "computed".to_string(),
            diagnostics.computed_columns.join(", "),
        ));
    }
    print!("{}", table::render_pairs(&pairs));
    for issue in &diagnostics.issues {
        println!("warning: {issue}");
    }
}

fn money(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.2}"))
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{:.2}%", v * 100.0))
}

fn print_kpis(kpis: &Kpis) {
    println!("KPIs");
    let pairs = vec![
        ("rows".to_string(), kpis.rows.to_string()),
        ("total revenue".to_string(), money(kpis.total_revenue)),
        ("total profit".to_string(), money(kpis.total_profit)),
        ("average margin".to_string(), percent(kpis.average_margin)),
    ];
    print!("{}", table::render_pairs(&pairs));
}

fn print_section(title: &str, headers: &[&str], rows: Option<Vec<Vec<String>>>, needs: &str) {
    println!();
    println!("{title}");
    match rows {
        Some(rows) => {
            let headers = headers.iter().map(|h| h.to_string()).collect::<Vec<_>>();
            let align = headers
                .iter()
                .enumerate()
                .map(|(idx, _)| {
                    if idx == 0 {
                        table::Align::Left
                    } else {
                        table::Align::Right
                    }
                })
                .collect::<Vec<_>>();
            print!("{}", table::render_rows(&headers, &rows, &align));
        }
        None => println!("unavailable (map {needs})"),
    }
}

fn handle_report(args: &cli::ReportArgs) -> Result<()> {
    let cleaned = clean_upload(&args.input, &args.mapping)?;
    let (frame, schema) = (&cleaned.table, &cleaned.schema);

    if let Some(product) = &args.product {
        println!("Product: {product}");
    }
    print_kpis(&report::kpis(frame, schema, args.product.as_deref()));

    print_section(
        "Revenue over time",
        &["period end", "revenue"],
        report::revenue_over_time(frame, schema, args.freq).map(|points| {
            points
                .into_iter()
                .map(|p| vec![p.period_end.to_string(), money(Some(p.revenue))])
                .collect()
        }),
        "date and revenue",
    );
    print_section(
        "Profit margin by week",
        &["week ending", "profit", "revenue", "margin"],
        report::margin_over_time(frame, schema).map(|points| {
            points
                .into_iter()
                .map(|p| {
                    vec![
                        p.period_end.to_string(),
                        money(Some(p.profit)),
                        money(Some(p.revenue)),
                        percent(p.margin),
                    ]
                })
                .collect()
        }),
        "date, revenue and cost",
    );
    print_section(
        &format!("Top {} products by revenue", args.top),
        &["product", "revenue", "profit"],
        report::top_products(frame, schema, args.top).map(|products| {
            products
                .into_iter()
                .map(|p| vec![p.product, money(Some(p.revenue)), money(p.profit)])
                .collect()
        }),
        "product and revenue",
    );
    print_section(
        "Revenue share by category",
        &["category", "revenue", "share"],
        report::category_share(frame, schema).map(|shares| {
            shares
                .into_iter()
                .map(|s| vec![s.category, money(Some(s.revenue)), percent(s.share)])
                .collect()
        }),
        "category and revenue",
    );

    println!();
    println!("Recent sales");
    table::print_frame(&report::sales_sample(frame, schema, args.sample_rows));
    Ok(())
}
