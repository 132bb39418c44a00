//! File reader: turns an uploaded byte stream into a raw [`Table`].
//!
//! The container is sniffed from content, never from the file name: zip
//! (`PK`) and OLE compound-document magic go to the spreadsheet reader,
//! anything else is decoded as delimited text with a sniffed delimiter.
//! Only the first worksheet of a workbook is read.

use std::{io::Cursor, path::Path};

use anyhow::Context;
use calamine::{Data, DataType, Reader, open_workbook_auto_from_rs};
use encoding_rs::Encoding;
use log::{debug, info};
use thiserror::Error;

use crate::{
    data::{Value, parse_month_first},
    frame::{Column, Table},
    io_utils,
};

const ZIP_MAGIC: &[u8] = b"PK";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("upload is empty or has no header row")]
    Empty,
    #[error("upload is not valid {encoding} text")]
    Encoding { encoding: &'static str },
    #[error("malformed delimited text: {0}")]
    Csv(#[from] csv::Error),
    #[error("malformed delimited text: line {line} has {found} fields but the header has {expected}")]
    TooManyFields {
        line: u64,
        found: usize,
        expected: usize,
    },
    #[error("unreadable spreadsheet: {0}")]
    Spreadsheet(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Spreadsheet,
    Delimited,
}

pub fn sniff_container(bytes: &[u8]) -> Container {
    if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) {
        Container::Spreadsheet
    } else {
        Container::Delimited
    }
}

/// Reads an upload held in memory.
pub fn read_upload(bytes: &[u8], encoding: &'static Encoding) -> Result<Table, IngestError> {
    let table = match sniff_container(bytes) {
        Container::Spreadsheet => read_spreadsheet(bytes)?,
        Container::Delimited => read_delimited(bytes, encoding)?,
    };
    info!(
        "Read {} row(s) across {} column(s)",
        table.row_count(),
        table.width()
    );
    Ok(table)
}

pub fn read_upload_path(path: &Path, encoding: &'static Encoding) -> anyhow::Result<Table> {
    let bytes = io_utils::read_input_bytes(path)?;
    read_upload(&bytes, encoding).with_context(|| format!("Reading upload {path:?}"))
}

fn decode(bytes: &[u8], encoding: &'static Encoding) -> Result<String, IngestError> {
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(IngestError::Encoding {
            encoding: used.name(),
        });
    }
    Ok(text.into_owned())
}

fn header_name(raw: &str, idx: usize) -> String {
    if raw.trim().is_empty() {
        format!("Unnamed: {idx}")
    } else {
        raw.to_string()
    }
}

fn read_delimited(bytes: &[u8], encoding: &'static Encoding) -> Result<Table, IngestError> {
    let text = decode(bytes, encoding)?;
    if text.trim().is_empty() {
        return Err(IngestError::Empty);
    }
    let delimiter = io_utils::sniff_delimiter(&text);
    debug!(
        "Reading delimited text with {}",
        if delimiter == b'\t' { "tabs" } else { "commas" }
    );

    let mut reader = io_utils::open_csv_reader(text.as_bytes(), delimiter, true);
    let headers = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(idx, name)| header_name(name, idx))
        .collect::<Vec<_>>();
    if headers.is_empty() {
        return Err(IngestError::Empty);
    }

    let mut raw_columns: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        if record.len() > headers.len() {
            return Err(IngestError::TooManyFields {
                line: record.position().map_or(0, |pos| pos.line()),
                found: record.len(),
                expected: headers.len(),
            });
        }
        // Short rows are padded with nulls.
        for (idx, column) in raw_columns.iter_mut().enumerate() {
            column.push(record.get(idx).unwrap_or_default().to_string());
        }
    }

    let columns = headers
        .into_iter()
        .zip(raw_columns)
        .map(|(name, cells)| Column::new(name, type_text_column(cells)))
        .collect();
    Ok(Table::new(columns))
}

/// A column whose non-empty cells all parse as finite numbers becomes
/// numeric; otherwise every non-empty cell stays text.
fn type_text_column(cells: Vec<String>) -> Vec<Option<Value>> {
    let numeric = cells
        .iter()
        .filter(|cell| !cell.trim().is_empty())
        .all(|cell| cell.trim().parse::<f64>().is_ok_and(f64::is_finite));
    cells
        .into_iter()
        .map(|cell| {
            if cell.trim().is_empty() {
                None
            } else if numeric {
                cell.trim().parse::<f64>().ok().map(Value::Number)
            } else {
                Some(Value::Text(cell))
            }
        })
        .collect()
}

fn read_spreadsheet(bytes: &[u8]) -> Result<Table, IngestError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| IngestError::Spreadsheet(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| IngestError::Spreadsheet("workbook has no worksheets".to_string()))?
        .map_err(|e| IngestError::Spreadsheet(e.to_string()))?;

    let mut rows = range.rows();
    let header_row = rows.next().ok_or(IngestError::Empty)?;
    let headers = header_row
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let raw = cell.as_string().unwrap_or_else(|| cell.to_string());
            header_name(&raw, idx)
        })
        .collect::<Vec<_>>();
    let body = rows
        .map(|row| row.iter().map(spreadsheet_cell).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    debug!("Read first worksheet with {} data row(s)", body.len());
    Ok(Table::from_rows(headers, body))
}

fn spreadsheet_cell(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) if s.trim().is_empty() => None,
        Data::String(s) => Some(Value::Text(s.clone())),
        Data::Float(f) => Some(Value::Number(*f)),
        Data::Int(i) => Some(Value::Number(*i as f64)),
        Data::Bool(b) => Some(Value::Text(b.to_string())),
        Data::DateTime(_) => cell.as_datetime().map(Value::DateTime),
        Data::DateTimeIso(s) => Some(
            parse_month_first(s)
                .map(Value::DateTime)
                .unwrap_or_else(|| Value::Text(s.clone())),
        ),
        Data::DurationIso(s) => Some(Value::Text(s.clone())),
    }
}
