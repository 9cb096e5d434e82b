//! Batch request metadata: who is asking and which schema applies to which
//! uploaded filename.
//!
//! ```yaml
//! owner_id: 5b2c...
//! files:
//!   invoices.csv: { schema_id: 0d9e... }
//!   ledger.xlsx: { schema_id: 0d9e..., sheet_name: Sheet1 }
//! ```
//!
//! JSON documents parse as well, and the legacy field names (`user_uuid`,
//! `file_metadatas`, `schema_uuid`) are accepted as aliases.

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    #[serde(alias = "schema_uuid")]
    pub schema_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMetadata {
    #[serde(alias = "user_uuid")]
    pub owner_id: String,
    #[serde(default, alias = "file_metadatas")]
    pub files: BTreeMap<String, FileMetadata>,
}

impl BatchMetadata {
    pub fn parse(raw: &str) -> Result<Self> {
        let metadata: BatchMetadata =
            serde_yaml::from_str(raw).context("Parsing batch metadata")?;
        ensure!(
            !metadata.owner_id.trim().is_empty(),
            "Batch metadata must name an owner_id"
        );
        Ok(metadata)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Opening batch metadata {path:?}"))?;
        Self::parse(&raw).with_context(|| format!("Loading batch metadata {path:?}"))
    }

    pub fn for_file(&self, filename: &str) -> Option<&FileMetadata> {
        self.files.get(filename)
    }
}

/// One uploaded file: its name as the caller knows it, and its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl BatchFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads `path`, naming the file after its final path component.
    pub fn from_path(path: &Path) -> Result<Self> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| format!("Input path {path:?} has no usable file name"))?;
        let bytes = fs::read(path).with_context(|| format!("Opening input file {path:?}"))?;
        Ok(Self::new(filename, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yaml_with_optional_sheet() {
        let metadata = BatchMetadata::parse(
            "owner_id: u1\nfiles:\n  a.csv: { schema_id: s1 }\n  b.xlsx: { schema_id: s2, sheet_name: Data }\n",
        )
        .expect("parse");
        assert_eq!(metadata.for_file("a.csv").expect("a").sheet_name, None);
        assert_eq!(
            metadata.for_file("b.xlsx").expect("b").sheet_name.as_deref(),
            Some("Data")
        );
        assert!(metadata.for_file("c.csv").is_none());
    }

    #[test]
    fn accepts_legacy_json_field_names() {
        let metadata = BatchMetadata::parse(
            r#"{"user_uuid": "u1", "file_metadatas": {"a.csv": {"schema_uuid": "s1"}}}"#,
        )
        .expect("parse");
        assert_eq!(metadata.owner_id, "u1");
        assert_eq!(metadata.for_file("a.csv").expect("a").schema_id, "s1");
    }

    #[test]
    fn rejects_missing_owner() {
        assert!(BatchMetadata::parse("files: {}\n").is_err());
        assert!(BatchMetadata::parse("owner_id: '  '\n").is_err());
    }
}
