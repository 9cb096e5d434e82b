//! Per-format adapters: read → map → reshape for one uploaded file.
//!
//! Workbooks use sheet-replace semantics: the result keeps every sheet of
//! the upload in order, with the requested sheet swapped for its reshaped
//! version and all others passed through untouched.

use log::info;

use crate::{
    config::ShortfallPolicy,
    decision::MappingDecision,
    error::{FileError, ReadError},
    oracle::Oracle,
    reader::{self, ReadOptions, SourceFormat},
    reshape::reshape,
    schema::FieldOrder,
    table::{Table, Workbook},
};

#[derive(Debug, Clone, PartialEq)]
pub enum ReshapedFile {
    Csv(Table),
    Workbook(Workbook),
}

impl ReshapedFile {
    pub fn tables(&self) -> Vec<&Table> {
        match self {
            ReshapedFile::Csv(table) => vec![table],
            ReshapedFile::Workbook(workbook) => workbook.sheets.iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Adapted {
    pub output: ReshapedFile,
    pub decision: MappingDecision,
}

/// Why a file could not be reshaped, with the decision when one was made.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptFailure {
    pub error: FileError,
    pub decision: Option<MappingDecision>,
}

impl From<ReadError> for AdaptFailure {
    fn from(value: ReadError) -> Self {
        Self {
            error: FileError::Read(value),
            decision: None,
        }
    }
}

/// Shared, read-only state every adapter call needs.
#[derive(Clone, Copy)]
pub struct PipelineContext<'a> {
    pub oracle: &'a Oracle,
    pub read: ReadOptions,
    pub shortfall: ShortfallPolicy,
}

impl PipelineContext<'_> {
    fn map_and_reshape(
        &self,
        table: &Table,
        fields: &FieldOrder,
    ) -> Result<(Table, MappingDecision), AdaptFailure> {
        let decision = self.oracle.map_table(table, fields);
        match reshape(table, &decision, fields, self.shortfall) {
            Ok(reshaped) => {
                info!(
                    "Reshaped {} into {} row(s) x {} column(s)",
                    table.origin(),
                    reshaped.row_count(),
                    reshaped.width()
                );
                Ok((reshaped, decision))
            }
            Err(err) => Err(AdaptFailure {
                error: FileError::Reshape(err),
                decision: Some(decision),
            }),
        }
    }
}

/// Routes a file to the adapter matching its extension.
pub fn adapt(
    ctx: &PipelineContext<'_>,
    filename: &str,
    bytes: &[u8],
    fields: &FieldOrder,
    sheet_name: Option<&str>,
) -> Result<Adapted, AdaptFailure> {
    match SourceFormat::from_filename(filename)? {
        SourceFormat::Delimited => adapt_delimited(ctx, filename, bytes, fields),
        SourceFormat::Spreadsheet => adapt_spreadsheet(ctx, filename, bytes, fields, sheet_name),
    }
}

pub fn adapt_delimited(
    ctx: &PipelineContext<'_>,
    filename: &str,
    bytes: &[u8],
    fields: &FieldOrder,
) -> Result<Adapted, AdaptFailure> {
    let table = reader::read_delimited(bytes, filename, &ctx.read)?;
    let (reshaped, decision) = ctx.map_and_reshape(&table, fields)?;
    Ok(Adapted {
        output: ReshapedFile::Csv(reshaped),
        decision,
    })
}

pub fn adapt_spreadsheet(
    ctx: &PipelineContext<'_>,
    filename: &str,
    bytes: &[u8],
    fields: &FieldOrder,
    sheet_name: Option<&str>,
) -> Result<Adapted, AdaptFailure> {
    let mut workbook = reader::read_workbook(bytes, filename)?;
    let sheet_name = sheet_name.ok_or_else(|| ReadError::SheetNotSpecified {
        available: workbook.sheet_names(),
    })?;
    let index = workbook.require_sheet(sheet_name)?;
    let (reshaped, decision) = ctx.map_and_reshape(&workbook.sheets[index], fields)?;
    workbook.replace_sheet(index, reshaped);
    Ok(Adapted {
        output: ReshapedFile::Workbook(workbook),
        decision,
    })
}
