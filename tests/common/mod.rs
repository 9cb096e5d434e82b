#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use schema_sync::{
    config::OracleSettings,
    error::ServiceError,
    oracle::{CompletionService, MappingRequest, Oracle},
    schema::{FieldOrder, OutputSchema, YamlSchemaStore},
};
use tempfile::{TempDir, tempdir};
use uuid::Uuid;

pub const OWNER: &str = "7f1c2d9e-owner";

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("write temp file");
        path
    }
}

pub fn fields(names: &[&str]) -> FieldOrder {
    FieldOrder::new(names.iter().copied()).expect("field order")
}

pub fn schema(owner: &str, names: &[&str]) -> OutputSchema {
    OutputSchema {
        id: Uuid::new_v4(),
        owner_id: owner.to_string(),
        name: None,
        fields: fields(names),
    }
}

pub fn store(schemas: Vec<OutputSchema>) -> Box<YamlSchemaStore> {
    Box::new(YamlSchemaStore::in_memory(schemas).expect("in-memory store"))
}

/// Completion service replaying a fixed script. Once the script runs out,
/// the last entry repeats.
pub struct ScriptedService {
    script: Vec<Result<String, ServiceError>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedService {
    pub fn new(script: Vec<Result<String, ServiceError>>) -> Self {
        assert!(!script.is_empty(), "script needs at least one reply");
        Self {
            script,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn replying(raw: &str) -> Self {
        Self::new(vec![Ok(raw.to_string())])
    }

    /// Handle on the call counter that survives handing the service over.
    pub fn call_counter(&self) -> CallCounter {
        CallCounter(Arc::clone(&self.calls))
    }
}

impl CompletionService for ScriptedService {
    fn complete(&self, _request: &MappingRequest) -> Result<String, ServiceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.script[call.min(self.script.len() - 1)].clone()
    }
}

#[derive(Clone)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Oracle backed by `service`, plus a counter of the calls it receives.
pub fn oracle_with(service: ScriptedService) -> (Oracle, CallCounter) {
    let counter = service.call_counter();
    (
        Oracle::new(Box::new(service), OracleSettings::default()),
        counter,
    )
}

/// Service that answers based on the request it sees.
pub struct FnService<F>(pub F);

impl<F> CompletionService for FnService<F>
where
    F: Fn(&MappingRequest) -> Result<String, ServiceError> + Send + Sync,
{
    fn complete(&self, request: &MappingRequest) -> Result<String, ServiceError> {
        (self.0)(request)
    }
}

pub fn mapped_reply(skip_rows: usize, order: &[usize]) -> String {
    format!(
        r#"{{"skip_rows": {skip_rows}, "column_order": {order:?}, "error": false, "error_message": null}}"#
    )
}

pub fn declined_reply(message: &str) -> String {
    format!(
        r#"{{"skip_rows": null, "column_order": null, "error": true, "error_message": "{message}"}}"#
    )
}
