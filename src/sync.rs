//! `sync` command: run a batch end to end and emit its results.

use std::{fs, fs::File, io::BufWriter};

use anyhow::{Context, Result, anyhow, ensure};
use log::{info, warn};

use crate::{
    batch::{FileResult, Orchestrator},
    cli::SyncArgs,
    client::ChatCompletionsClient,
    config::SyncConfig,
    io_utils::{self, Emitted},
    metadata::{BatchFile, BatchMetadata},
    oracle::Oracle,
    reader::ReadOptions,
    schema::YamlSchemaStore,
};

pub fn execute(args: &SyncArgs) -> Result<()> {
    let config = SyncConfig::from_args(&args.oracle)?;
    let input_encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let output_encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;

    ensure!(
        args.store.exists(),
        "Schema store {:?} does not exist",
        args.store
    );
    let store = YamlSchemaStore::open(&args.store)?;
    let metadata = BatchMetadata::load(&args.metadata)?;
    let files = args
        .inputs
        .iter()
        .map(|path| BatchFile::from_path(path))
        .collect::<Result<Vec<_>>>()?;

    let orchestrator = Orchestrator::new(build_oracle(&config)?, Box::new(store))
        .with_read_options(ReadOptions {
            delimiter: args.delimiter,
            encoding: input_encoding,
        })
        .with_shortfall(config.shortfall)
        .with_jobs(config.jobs);
    let results = orchestrator.process(&files, &metadata)?;

    if let Some(dir) = &args.output_dir {
        fs::create_dir_all(dir).with_context(|| format!("Creating output directory {dir:?}"))?;
    }

    let mut entries = Vec::with_capacity(results.len());
    for result in &results {
        let emitted = emit(args, result, output_encoding)?;
        match result.error() {
            Some(err) => warn!("✗ {}: {}", result.filename, err),
            None => info!("✓ {}", result.filename),
        }
        entries.push(result.report_entry(emitted));
    }

    if let Some(path) = &args.report {
        let file = File::create(path).with_context(|| format!("Creating report {path:?}"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &entries)
            .with_context(|| format!("Writing report {path:?}"))?;
        info!("Report for {} file(s) written to {:?}", entries.len(), path);
    }

    let failures = results.iter().filter(|r| !r.is_success()).count();
    if args.fail_on_error && failures > 0 {
        return Err(anyhow!(
            "{failures} of {} file(s) could not be reshaped",
            results.len()
        ));
    }
    Ok(())
}

fn build_oracle(config: &SyncConfig) -> Result<Oracle> {
    if config.offline {
        info!("Offline mode: columns are mapped by exact header match only");
        return Ok(Oracle::offline(config.oracle));
    }
    if config.client.api_key.is_none() {
        warn!("No API key configured for {}", config.client.endpoint);
    }
    let client = ChatCompletionsClient::new(config.client.clone())?;
    Ok(Oracle::new(Box::new(client), config.oracle))
}

fn emit(
    args: &SyncArgs,
    result: &FileResult,
    encoding: &'static encoding_rs::Encoding,
) -> Result<Option<Emitted>> {
    let Some(file) = result.output() else {
        return Ok(None);
    };
    match &args.output_dir {
        Some(dir) => {
            let delimiter = args.output_delimiter.or(args.delimiter);
            let emitted =
                io_utils::emit_reshaped(dir, &result.filename, file, delimiter, encoding)?;
            Ok(Some(emitted))
        }
        None => {
            for table in file.tables() {
                println!("== {} ==", table.origin());
                print!("{}", table.render(Some(args.rows)));
            }
            Ok(None)
        }
    }
}
