//! I/O utilities for decoding uploads and writing reshaped results.
//!
//! All file I/O in schema-sync flows through this module. It provides:
//!
//! - **Delimiter resolution**: extension-based auto-detection (`.csv` → comma,
//!   `.tsv` → tab) with manual override support.
//! - **Encoding**: input decoding and output transcoding via `encoding_rs`,
//!   defaulting to UTF-8.
//! - **Reader/writer construction**: CSV readers never assume a header row;
//!   writers use `QuoteStyle::Always` for round-trip safety.
//! - **Result emission**: CSV results land at `<dir>/<filename>`, workbook
//!   results at `<dir>/<stem>/<sheet>.csv`.

use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

use crate::{adapter::ReshapedFile, table::Table};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(filename: &str, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match Path::new(filename).extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

/// CSV reader over raw records: no header row, ragged rows allowed.
pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

/// Decodes `bytes` strictly, dropping a leading byte-order mark.
pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn encode_text(text: &str, encoding: &'static Encoding) -> Result<Vec<u8>> {
    if encoding == UTF_8 {
        return Ok(text.as_bytes().to_vec());
    }
    let (encoded, _, had_errors) = encoding.encode(text);
    if had_errors {
        return Err(anyhow!("Failed to encode text using {}", encoding.name()));
    }
    Ok(encoded.into_owned())
}

/// Serializes a table as delimited text: one label row, then data rows.
pub fn table_to_csv(table: &Table, delimiter: u8, encoding: &'static Encoding) -> Result<Vec<u8>> {
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Always)
        .double_quote(true);
    let mut writer = builder.from_writer(Vec::new());
    writer
        .write_record(&table.headers)
        .with_context(|| format!("Writing headers for {}", table.origin()))?;
    for (idx, row) in table.rows.iter().enumerate() {
        writer
            .write_record(row.iter().map(|cell| cell.to_string()))
            .with_context(|| format!("Writing row {} for {}", idx + 1, table.origin()))?;
    }
    let buffer = writer
        .into_inner()
        .map_err(|err| anyhow!("Flushing CSV output: {}", err.error()))?;
    let text = String::from_utf8(buffer).context("CSV output is not valid UTF-8")?;
    encode_text(&text, encoding)
}

pub fn write_table(
    table: &Table,
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<()> {
    let bytes = table_to_csv(table, delimiter, encoding)?;
    fs::write(path, bytes).with_context(|| format!("Creating output file {path:?}"))
}

/// Files written for one reshaped upload, all sharing one content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emitted {
    pub paths: Vec<PathBuf>,
    pub content_type: &'static str,
}

/// Delimiter for written results: the override when given, otherwise the
/// upload's extension for delimited results and a comma for sheets.
pub fn output_delimiter(filename: &str, file: &ReshapedFile, provided: Option<u8>) -> u8 {
    match file {
        ReshapedFile::Csv(_) => resolve_input_delimiter(filename, provided),
        ReshapedFile::Workbook(_) => provided.unwrap_or(DEFAULT_CSV_DELIMITER),
    }
}

pub fn content_type_for(delimiter: u8) -> &'static str {
    if delimiter == DEFAULT_TSV_DELIMITER {
        "text/tab-separated-values"
    } else {
        "text/csv"
    }
}

/// Writes one reshaped file under `dir`. Delimited results keep the upload's
/// name; every workbook sheet becomes `<stem>/<sheet>.csv` (or `.tsv`).
pub fn emit_reshaped(
    dir: &Path,
    filename: &str,
    file: &ReshapedFile,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<Emitted> {
    let delimiter = output_delimiter(filename, file, delimiter);
    let paths = match file {
        ReshapedFile::Csv(table) => {
            let path = dir.join(sanitize_file_component(filename));
            write_table(table, &path, delimiter, encoding)?;
            vec![path]
        }
        ReshapedFile::Workbook(workbook) => {
            let stem = Path::new(filename)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(filename);
            let sheet_dir = dir.join(sanitize_file_component(stem));
            fs::create_dir_all(&sheet_dir)
                .with_context(|| format!("Creating output directory {sheet_dir:?}"))?;
            let extension = if delimiter == DEFAULT_TSV_DELIMITER { "tsv" } else { "csv" };
            let mut written = Vec::with_capacity(workbook.sheets.len());
            for sheet in &workbook.sheets {
                let name = sheet.sheet.as_deref().unwrap_or("sheet");
                let path =
                    sheet_dir.join(format!("{}.{extension}", sanitize_file_component(name)));
                write_table(sheet, &path, delimiter, encoding)?;
                written.push(path);
            }
            written
        }
    };
    Ok(Emitted {
        paths,
        content_type: content_type_for(delimiter),
    })
}

/// Replaces characters that cannot appear in a single path component.
pub fn sanitize_file_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.trim() {
        "" | "." | ".." => "_".to_string(),
        trimmed => trimmed.to_string(),
    }
}
