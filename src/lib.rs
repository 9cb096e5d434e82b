pub mod adapter;
pub mod batch;
pub mod cli;
pub mod client;
pub mod config;
pub mod decision;
pub mod error;
pub mod io_utils;
pub mod metadata;
pub mod oracle;
pub mod preview;
pub mod reader;
pub mod reshape;
pub mod schema;
pub mod schema_cmd;
pub mod sync;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("schema_sync", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Sync(args) => sync::execute(&args),
        Commands::Preview(args) => preview::execute(&args),
        Commands::Schema(command) => schema_cmd::execute(&command),
    }
}
