use std::fs;

use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::PreviewArgs,
    io_utils,
    reader::{self, ReadOptions, SourceFormat},
    table::Table,
};

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let filename = args
        .input
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Input path {:?} has no usable file name", args.input))?;
    let bytes = fs::read(&args.input).with_context(|| format!("Opening input file {:?}", args.input))?;
    let table = load_table(args, filename, &bytes)?;

    print!("{}", table.render(Some(args.rows)));
    info!(
        "Displayed {} of {} row(s) from {}",
        table.row_count().min(args.rows),
        table.row_count(),
        table.origin()
    );
    Ok(())
}

fn load_table(args: &PreviewArgs, filename: &str, bytes: &[u8]) -> Result<Table> {
    match SourceFormat::from_filename(filename)? {
        SourceFormat::Delimited => {
            let options = ReadOptions {
                delimiter: args.delimiter,
                encoding: io_utils::resolve_encoding(args.input_encoding.as_deref())?,
            };
            Ok(reader::read_delimited(bytes, filename, &options)?)
        }
        SourceFormat::Spreadsheet => {
            let mut workbook = reader::read_workbook(bytes, filename)?;
            let index = match args.sheet.as_deref() {
                Some(sheet) => workbook.require_sheet(sheet)?,
                None => 0,
            };
            info!("Sheets in {}: {}", filename, workbook.sheet_names().join(", "));
            if index < workbook.sheets.len() {
                Ok(workbook.sheets.swap_remove(index))
            } else {
                Ok(Table::new(filename, None, Vec::new(), Vec::new()))
            }
        }
    }
}
