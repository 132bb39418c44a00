use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::report::Frequency;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Clean messy sales exports and report revenue, profit and margin",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Read an upload and print the inferred column mapping
    Probe(ProbeArgs),
    /// Clean an upload and write the normalized table as CSV
    Clean(CleanArgs),
    /// Compare raw and cleaned samples and print cleaning diagnostics
    Preview(PreviewArgs),
    /// Print KPIs and aggregate sales tables for a cleaned upload
    Report(ReportArgs),
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Sales export to read (CSV, TSV, XLSX or XLS; `-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Character encoding of delimited input (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct MappingArgs {
    /// Mapping file (JSON, or YAML by extension) overriding inferred fields
    #[arg(short = 'm', long = "mapping")]
    pub mapping: Option<PathBuf>,
    /// Pin a canonical field to a column, as `field=column`
    #[arg(long = "map", action = clap::ArgAction::Append)]
    pub assignments: Vec<String>,
    /// Leave a canonical field unmapped even if a column matches it
    #[arg(long = "unset", action = clap::ArgAction::Append)]
    pub unset: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Write the inferred mapping to this file
    #[arg(long = "mapping-out")]
    pub mapping_out: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CleanArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub mapping: MappingArgs,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Delimiter to use for output
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Write the final mapping, including computed fields, to this file
    #[arg(long = "mapping-out")]
    pub mapping_out: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub mapping: MappingArgs,
    /// Number of rows shown from each side
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub mapping: MappingArgs,
    /// Bucket size for revenue over time
    #[arg(long, value_enum, default_value_t = Frequency::Week)]
    pub freq: Frequency,
    /// Number of products in the top products table
    #[arg(long, default_value_t = 10)]
    pub top: usize,
    /// Restrict KPIs to a single product
    #[arg(long)]
    pub product: Option<String>,
    /// Number of rows in the recent sales sample
    #[arg(long = "sample-rows", default_value_t = 10)]
    pub sample_rows: usize,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
