use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{
    DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT_SECS, MAX_RETRIES,
    MAX_SAMPLE_ROWS,
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Map arbitrary CSV and spreadsheet uploads onto output schemas",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Reshape a batch of uploaded files into their output schemas
    Sync(SyncArgs),
    /// Show the leading rows of a CSV file or spreadsheet sheet
    Preview(PreviewArgs),
    /// Manage output schemas in a schema store
    #[command(subcommand)]
    Schema(SchemaCommand),
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Schema store (YAML) holding the owner's output schemas
    #[arg(short, long)]
    pub store: PathBuf,
    /// Batch metadata (YAML or JSON) mapping filenames to schema ids
    #[arg(short, long)]
    pub metadata: PathBuf,
    /// Uploaded files, processed in the order given
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// Directory receiving reshaped files (prints tables when omitted)
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,
    /// Write a JSON report with one entry per input file
    #[arg(long)]
    pub report: Option<PathBuf>,
    /// Rows to print per table when no output directory is given
    #[arg(long, default_value_t = 20)]
    pub rows: usize,
    /// Exit with an error when any file fails
    #[arg(long = "fail-on-error")]
    pub fail_on_error: bool,
    /// CSV delimiter override for delimited inputs (also used for outputs
    /// unless --output-delimiter is given)
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Delimiter for written files (defaults to the input's)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding of delimited inputs (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Character encoding for written files (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
    #[command(flatten)]
    pub oracle: OracleArgs,
}

#[derive(Debug, Args)]
pub struct OracleArgs {
    /// OpenAI-compatible chat completions endpoint
    #[arg(long, env = "SCHEMA_SYNC_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
    /// Model used for column mapping
    #[arg(long, env = "GROQ_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,
    /// API key for the inference service
    #[arg(long = "api-key", env = "GROQ_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
    /// Request timeout in seconds
    #[arg(long = "timeout-secs", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
    /// Automatic retries after an unreachable service (at most 1)
    #[arg(long, default_value_t = MAX_RETRIES)]
    pub retries: u32,
    /// Sampling temperature for the mapping request
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f32,
    /// Rows shown to the service, header candidate included (5-10)
    #[arg(long = "sample-rows", default_value_t = MAX_SAMPLE_ROWS)]
    pub sample_rows: usize,
    /// Files processed concurrently
    #[arg(short = 'j', long, default_value_t = 1)]
    pub jobs: usize,
    /// Fail a file when its mapping covers fewer columns than the schema
    #[arg(long = "strict-columns")]
    pub strict_columns: bool,
    /// Skip the inference service and rely on exact header matches
    #[arg(long)]
    pub offline: bool,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// CSV, TSV or spreadsheet file to preview
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Sheet to show for spreadsheets (first sheet when omitted)
    #[arg(long)]
    pub sheet: Option<String>,
    /// Number of rows to display below the header candidate
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
    /// CSV delimiter character
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding for input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum SchemaCommand {
    /// Create an output schema and print its id
    Add(SchemaAddArgs),
    /// List output schemas, optionally for one owner
    List(SchemaListArgs),
    /// Show the fields of one output schema
    Show(SchemaIdArgs),
    /// Replace the fields of an output schema
    Update(SchemaUpdateArgs),
    /// Delete an output schema
    Remove(SchemaIdArgs),
}

#[derive(Debug, Args)]
pub struct SchemaAddArgs {
    /// Schema store (YAML); created when missing
    #[arg(short, long)]
    pub store: PathBuf,
    /// Owner of the new schema
    #[arg(long)]
    pub owner: String,
    /// Optional display name
    #[arg(long)]
    pub name: Option<String>,
    /// Ordered field names, comma-separated or repeated
    #[arg(short = 'f', long = "fields", required = true, action = clap::ArgAction::Append)]
    pub fields: Vec<String>,
}

#[derive(Debug, Args)]
pub struct SchemaListArgs {
    /// Schema store (YAML)
    #[arg(short, long)]
    pub store: PathBuf,
    /// Only list schemas owned by this owner
    #[arg(long)]
    pub owner: Option<String>,
}

#[derive(Debug, Args)]
pub struct SchemaIdArgs {
    /// Schema store (YAML)
    #[arg(short, long)]
    pub store: PathBuf,
    /// Schema id
    #[arg(long)]
    pub id: uuid::Uuid,
}

#[derive(Debug, Args)]
pub struct SchemaUpdateArgs {
    /// Schema store (YAML)
    #[arg(short, long)]
    pub store: PathBuf,
    /// Schema id
    #[arg(long)]
    pub id: uuid::Uuid,
    /// New ordered field names, comma-separated or repeated
    #[arg(short = 'f', long = "fields", required = true, action = clap::ArgAction::Append)]
    pub fields: Vec<String>,
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
