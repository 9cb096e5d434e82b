//! Typed error taxonomy for the mapping pipeline.
//!
//! Per-file failures are values, not panics: every variant here ends up in a
//! [`crate::batch::FileResult`] rather than aborting the batch. Only the CLI
//! layer wraps them in `anyhow` errors.

use thiserror::Error;

/// Failures while turning uploaded bytes into tables.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error("Unable to read '{file}': {detail}")]
    InputFormat { file: String, detail: String },

    #[error("Unsupported file extension for '{file}' (expected csv, tsv, xlsx, xlsm, xlsb, xls or ods)")]
    UnsupportedFormat { file: String },

    #[error("Sheet '{sheet}' not found; available sheets: {}", available.join(", "))]
    SheetNotFound {
        sheet: String,
        available: Vec<String>,
    },

    #[error("A sheet name is required for spreadsheet inputs; available sheets: {}", available.join(", "))]
    SheetNotSpecified { available: Vec<String> },
}

impl ReadError {
    pub fn input_format(file: &str, detail: impl ToString) -> Self {
        ReadError::InputFormat {
            file: file.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// Transport-level failures reported by a completion service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Network failure, timeout, or any condition worth one more attempt.
    #[error("inference service unavailable: {0}")]
    Unavailable(String),

    /// The service answered but refused the request (non-2xx, bad payload).
    #[error("inference service rejected the request: {0}")]
    Rejected(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReshapeError {
    #[error("Mapping failed: {0}")]
    MappingFailed(String),
}

impl ReshapeError {
    pub fn reason(&self) -> &str {
        match self {
            ReshapeError::MappingFailed(reason) => reason,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Output schema must define at least one field")]
    NoFields,

    #[error("Output schema field names must not be blank (position {0})")]
    BlankField(usize),

    #[error("Output schema field '{0}' is defined more than once")]
    DuplicateField(String),
}

/// Outcome of one file that did not produce a reshaped table.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FileError {
    #[error("No metadata supplied for '{0}'")]
    MetadataMissing(String),

    #[error("Schema '{0}' not found for the requesting owner")]
    SchemaUnresolved(String),

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Reshape(#[from] ReshapeError),
}
