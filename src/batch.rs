//! Batch orchestration: one result per uploaded file, in upload order.
//!
//! Each file moves from pending to exactly one of [`FileStatus`]. A file's
//! failure is recorded in its own [`FileResult`] and never stops the rest
//! of the batch; only problems with the request as a whole (for example an
//! unreachable schema store) fail `process` itself.

use anyhow::{Context, Result, bail};
use itertools::Itertools;
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    adapter::{self, AdaptFailure, Adapted, PipelineContext, ReshapedFile},
    config::ShortfallPolicy,
    decision::{MappingDecision, WireDecision},
    error::FileError,
    io_utils::Emitted,
    metadata::{BatchFile, BatchMetadata},
    oracle::Oracle,
    reader::ReadOptions,
    schema::{OutputSchema, SchemaStore},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileStatus {
    Processed,
    Failed,
    MetadataMissing,
    SchemaUnresolved,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileResult {
    pub filename: String,
    pub status: FileStatus,
    pub outcome: Result<ReshapedFile, FileError>,
    pub decision: Option<MappingDecision>,
}

impl FileResult {
    fn processed(filename: &str, adapted: Adapted) -> Self {
        Self {
            filename: filename.to_string(),
            status: FileStatus::Processed,
            outcome: Ok(adapted.output),
            decision: Some(adapted.decision),
        }
    }

    fn failed(filename: &str, error: FileError, decision: Option<MappingDecision>) -> Self {
        let status = match error {
            FileError::MetadataMissing(_) => FileStatus::MetadataMissing,
            FileError::SchemaUnresolved(_) => FileStatus::SchemaUnresolved,
            FileError::Read(_) | FileError::Reshape(_) => FileStatus::Failed,
        };
        Self {
            filename: filename.to_string(),
            status,
            outcome: Err(error),
            decision,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn output(&self) -> Option<&ReshapedFile> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&FileError> {
        self.outcome.as_ref().err()
    }

    /// Serializable summary of what the caller wrote for this file, if
    /// anything: the paths and their content type.
    pub fn report_entry(&self, emitted: Option<Emitted>) -> ReportEntry {
        let (outputs, content_type) = match emitted {
            Some(emitted) => (
                emitted
                    .paths
                    .iter()
                    .map(|path| path.display().to_string())
                    .collect(),
                Some(emitted.content_type),
            ),
            None => (Vec::new(), None),
        };
        ReportEntry {
            filename: self.filename.clone(),
            status: self.status,
            content_type,
            rows: self
                .output()
                .map(|file| file.tables().iter().map(|t| t.row_count()).sum::<usize>()),
            outputs,
            decision: self.decision.clone().map(WireDecision::from),
            error: self.error().map(ToString::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub filename: String,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<String>,
    pub decision: Option<WireDecision>,
    pub error: Option<String>,
}

pub struct Orchestrator {
    oracle: Oracle,
    store: Box<dyn SchemaStore>,
    read: ReadOptions,
    shortfall: ShortfallPolicy,
    jobs: usize,
}

impl Orchestrator {
    pub fn new(oracle: Oracle, store: Box<dyn SchemaStore>) -> Self {
        Self {
            oracle,
            store,
            read: ReadOptions::default(),
            shortfall: ShortfallPolicy::default(),
            jobs: 1,
        }
    }

    pub fn with_read_options(mut self, read: ReadOptions) -> Self {
        self.read = read;
        self
    }

    pub fn with_shortfall(mut self, shortfall: ShortfallPolicy) -> Self {
        self.shortfall = shortfall;
        self
    }

    /// Files processed concurrently; 1 keeps the batch sequential.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn process(&self, files: &[BatchFile], metadata: &BatchMetadata) -> Result<Vec<FileResult>> {
        // Metadata and outputs are keyed by file name.
        let names = files.iter().map(|file| file.filename.as_str());
        if let Some(name) = names.duplicates().next() {
            bail!("File name '{name}' appears more than once in the batch");
        }
        let schemas = self
            .store
            .schemas_for_owner(&metadata.owner_id)
            .with_context(|| format!("Loading output schemas for owner '{}'", metadata.owner_id))?;
        info!(
            "Processing {} file(s) for owner '{}' against {} schema(s)",
            files.len(),
            metadata.owner_id,
            schemas.len()
        );

        let ctx = PipelineContext {
            oracle: &self.oracle,
            read: self.read,
            shortfall: self.shortfall,
        };
        let run = |file: &BatchFile| process_file(&ctx, file, metadata, &schemas);

        let results = if self.jobs <= 1 || files.len() <= 1 {
            files.iter().map(run).collect::<Vec<_>>()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.jobs)
                .build()
                .context("Building file worker pool")?;
            // Indexed parallel collect keeps upload order.
            pool.install(|| files.par_iter().map(run).collect::<Vec<_>>())
        };

        let processed = results.iter().filter(|r| r.is_success()).count();
        info!(
            "Batch finished: {} processed, {} failed",
            processed,
            results.len() - processed
        );
        Ok(results)
    }
}

fn process_file(
    ctx: &PipelineContext<'_>,
    file: &BatchFile,
    metadata: &BatchMetadata,
    schemas: &[OutputSchema],
) -> FileResult {
    let filename = file.filename.as_str();
    info!("Processing file '{filename}'");

    let Some(file_metadata) = metadata.for_file(filename) else {
        warn!("No metadata supplied for '{filename}'");
        return FileResult::failed(
            filename,
            FileError::MetadataMissing(filename.to_string()),
            None,
        );
    };
    let Some(schema) = resolve_schema(schemas, &file_metadata.schema_id) else {
        warn!(
            "Schema '{}' for '{filename}' is not owned by '{}'",
            file_metadata.schema_id, metadata.owner_id
        );
        return FileResult::failed(
            filename,
            FileError::SchemaUnresolved(file_metadata.schema_id.clone()),
            None,
        );
    };

    match adapter::adapt(
        ctx,
        filename,
        &file.bytes,
        &schema.fields,
        file_metadata.sheet_name.as_deref(),
    ) {
        Ok(adapted) => FileResult::processed(filename, adapted),
        Err(AdaptFailure { error, decision }) => {
            warn!("'{filename}' failed: {error}");
            FileResult::failed(filename, error, decision)
        }
    }
}

fn resolve_schema<'a>(schemas: &'a [OutputSchema], schema_id: &str) -> Option<&'a OutputSchema> {
    let id = Uuid::parse_str(schema_id.trim()).ok()?;
    schemas.iter().find(|schema| schema.id == id)
}
