//! Tabular reader: raw upload bytes into [`Table`]s.
//!
//! Delimited text goes through the `csv` crate; workbooks (xlsx, xlsm,
//! xlsb, xls, ods) through `calamine`. The first physical row of every
//! table is the header candidate; deciding where the real header lives is
//! left to the oracle.

use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use chrono::{NaiveDateTime, NaiveTime};
use encoding_rs::{Encoding, UTF_8};
use log::debug;

use crate::{
    error::ReadError,
    io_utils,
    table::{Cell, Table, Workbook},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Delimited,
    Spreadsheet,
}

impl SourceFormat {
    pub fn from_filename(filename: &str) -> Result<Self, ReadError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("csv" | "tsv") => Ok(SourceFormat::Delimited),
            Some("xlsx" | "xlsm" | "xlsb" | "xls" | "ods") => Ok(SourceFormat::Spreadsheet),
            _ => Err(ReadError::UnsupportedFormat {
                file: filename.to_string(),
            }),
        }
    }
}

/// Knobs for delimited input; workbooks ignore them.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
        }
    }
}

pub fn read_delimited(
    bytes: &[u8],
    filename: &str,
    options: &ReadOptions,
) -> Result<Table, ReadError> {
    let text = io_utils::decode_bytes(bytes, options.encoding)
        .map_err(|err| ReadError::input_format(filename, err))?;
    let delimiter = io_utils::resolve_input_delimiter(filename, options.delimiter);
    let mut reader = io_utils::open_csv_reader(text.as_bytes(), delimiter);

    let mut physical = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|err| {
            ReadError::input_format(filename, format!("row {}: {err}", idx + 1))
        })?;
        physical.push(record.iter().map(Cell::from).collect::<Vec<_>>());
    }
    debug!("Read {} physical row(s) from '{}'", physical.len(), filename);
    Ok(Table::from_physical_rows(filename, None, physical))
}

pub fn read_workbook(bytes: &[u8], filename: &str) -> Result<Workbook, ReadError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|err| ReadError::input_format(filename, err))?;
    let names = workbook.sheet_names();
    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|err| ReadError::input_format(filename, format!("sheet '{name}': {err}")))?;
        let physical = range
            .rows()
            .map(|row| row.iter().map(cell_from_data).collect::<Vec<_>>())
            .collect::<Vec<_>>();
        debug!(
            "Read {} physical row(s) from '{}' sheet '{}'",
            physical.len(),
            filename,
            name
        );
        sheets.push(Table::from_physical_rows(filename, Some(name), physical));
    }
    Ok(Workbook {
        source: filename.to_string(),
        sheets,
    })
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(text) if text.is_empty() => Cell::Empty,
        Data::String(text) => Cell::Text(text.clone()),
        Data::Int(value) => Cell::Integer(*value),
        Data::Float(value) => Cell::Float(*value),
        Data::Bool(value) => Cell::Bool(*value),
        Data::DateTime(value) => match value.as_datetime() {
            Some(datetime) => Cell::Text(format_datetime(&datetime)),
            None => Cell::Float(value.as_f64()),
        },
        Data::DateTimeIso(text) | Data::DurationIso(text) => Cell::Text(text.clone()),
        Data::Error(err) => Cell::Text(err.to_string()),
    }
}

fn format_datetime(value: &NaiveDateTime) -> String {
    if value.time() == NaiveTime::MIN {
        value.format("%Y-%m-%d").to_string()
    } else {
        value.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}
