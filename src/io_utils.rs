//! I/O helpers for reading uploads and writing cleaned output.
//!
//! - **Input bytes**: `read_input_bytes` reads a file, or stdin for `-`.
//! - **Encoding**: labels resolve through `encoding_rs`, defaulting to UTF-8.
//! - **CSV reader/writer construction** shared by ingestion and the CLI.
//!   Output uses `QuoteStyle::Always` for round-trip safety.

use std::{
    fs::File,
    io::{BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

use crate::frame::Table;

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

/// Number of leading characters inspected when sniffing the delimiter.
pub const DELIMITER_SNIFF_CHARS: usize = 10_000;

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn read_input_bytes(path: &Path) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    if is_dash(path) {
        std::io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .context("Reading upload from stdin")?;
    } else {
        File::open(path)
            .with_context(|| format!("Opening input file {path:?}"))?
            .read_to_end(&mut bytes)
            .with_context(|| format!("Reading input file {path:?}"))?;
    }
    Ok(bytes)
}

/// Tab when the sample holds more tabs than commas, otherwise comma.
pub fn sniff_delimiter(text: &str) -> u8 {
    let (tabs, commas) = text
        .chars()
        .take(DELIMITER_SNIFF_CHARS)
        .fold((0usize, 0usize), |(tabs, commas), ch| match ch {
            '\t' => (tabs + 1, commas),
            ',' => (tabs, commas + 1),
            _ => (tabs, commas),
        });
    if tabs > commas {
        DEFAULT_TSV_DELIMITER
    } else {
        DEFAULT_CSV_DELIMITER
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8, has_headers: bool) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(has_headers)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_writer(path: Option<&Path>, delimiter: u8) -> Result<csv::Writer<Box<dyn Write>>> {
    let writer: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout()),
    };

    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Always)
        .double_quote(true);
    Ok(builder.from_writer(writer))
}

pub fn write_table<W: Write>(writer: &mut csv::Writer<W>, table: &Table) -> Result<()> {
    writer
        .write_record(table.headers())
        .context("Writing header row")?;
    for (idx, row) in table.display_rows().into_iter().enumerate() {
        writer
            .write_record(&row)
            .with_context(|| format!("Writing row {}", idx + 1))?;
    }
    writer.flush().context("Flushing output")?;
    Ok(())
}
