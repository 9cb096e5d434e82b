//! Runtime configuration for the oracle, its HTTP client, and the batch.
//!
//! Values come from CLI flags (with environment fallbacks declared in
//! [`crate::cli`]); this module only holds the resolved, clamped settings.

use std::time::Duration;

use anyhow::{Result, ensure};
use log::warn;

use crate::cli::OracleArgs;

pub const DEFAULT_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "openai/gpt-oss-20b";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Rows shown to the service: the header candidate plus 4 to 9 more.
pub const MIN_SAMPLE_ROWS: usize = 5;
pub const MAX_SAMPLE_ROWS: usize = 10;

/// Automatic retries after an unavailable service. Never more than one.
pub const MAX_RETRIES: u32 = 1;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub temperature: f32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleSettings {
    pub sample_rows: usize,
    pub max_retries: u32,
}

impl OracleSettings {
    pub fn new(sample_rows: usize, max_retries: u32) -> Self {
        Self {
            sample_rows: sample_rows.clamp(MIN_SAMPLE_ROWS, MAX_SAMPLE_ROWS),
            max_retries: max_retries.min(MAX_RETRIES),
        }
    }
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self::new(MAX_SAMPLE_ROWS, MAX_RETRIES)
    }
}

/// What to do when the mapping covers fewer columns than the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShortfallPolicy {
    /// Label the mapped columns positionally and log the unmapped fields.
    #[default]
    Warn,
    /// Treat the shortfall as a failed mapping.
    Fail,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub client: ClientConfig,
    pub oracle: OracleSettings,
    pub offline: bool,
    pub jobs: usize,
    pub shortfall: ShortfallPolicy,
}

impl SyncConfig {
    pub fn from_args(args: &OracleArgs) -> Result<Self> {
        ensure!(args.jobs > 0, "--jobs must be at least 1");
        ensure!(args.timeout_secs > 0, "--timeout-secs must be at least 1");
        ensure!(
            (0.0..=2.0).contains(&args.temperature),
            "--temperature must be between 0 and 2"
        );
        if args.retries > MAX_RETRIES {
            warn!(
                "--retries {} exceeds the limit; using {}",
                args.retries,
                MAX_RETRIES
            );
        }
        Ok(Self {
            client: ClientConfig {
                endpoint: args.endpoint.clone(),
                model: args.model.clone(),
                api_key: args
                    .api_key
                    .as_deref()
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .map(str::to_string),
                timeout: Duration::from_secs(args.timeout_secs),
                temperature: args.temperature,
            },
            oracle: OracleSettings::new(args.sample_rows, args.retries),
            offline: args.offline,
            jobs: args.jobs,
            shortfall: if args.strict_columns {
                ShortfallPolicy::Fail
            } else {
                ShortfallPolicy::Warn
            },
        })
    }
}
