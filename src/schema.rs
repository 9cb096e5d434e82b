//! Output schemas and the store that owns them.
//!
//! An [`OutputSchema`] is nothing more than an ordered list of canonical
//! field names plus identity. The pipeline only ever reads schemas through
//! the [`SchemaStore`] trait; [`YamlSchemaStore`] is the file-backed store
//! used by the CLI and also carries create/update/delete.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow, ensure};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SchemaError;

/// Ordered, duplicate-free list of canonical field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFields", into = "Vec<String>")]
pub struct FieldOrder(Vec<String>);

impl FieldOrder {
    pub fn new<I, S>(fields: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names = Vec::new();
        let mut seen = HashSet::new();
        for (idx, field) in fields.into_iter().enumerate() {
            let field = field.into().trim().to_string();
            if field.is_empty() {
                return Err(SchemaError::BlankField(idx));
            }
            if !seen.insert(field.clone()) {
                return Err(SchemaError::DuplicateField(field));
            }
            names.push(field);
        }
        if names.is_empty() {
            return Err(SchemaError::NoFields);
        }
        Ok(Self(names))
    }

    /// Parses a comma-separated list such as `Date, Vendor Name, Total`.
    pub fn parse_list(specs: &[String]) -> Result<Self, SchemaError> {
        Self::new(
            specs
                .iter()
                .flat_map(|spec| spec.split(','))
                .map(str::trim)
                .filter(|name| !name.is_empty()),
        )
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }
}

impl From<FieldOrder> for Vec<String> {
    fn from(value: FieldOrder) -> Self {
        value.0
    }
}

/// Stored documents may list fields directly or as the ordered keys of a
/// mapping (`{date: string, total: number}`).
#[derive(Deserialize)]
#[serde(untagged)]
enum RawFields {
    List(Vec<String>),
    Keys(serde_yaml::Mapping),
}

impl TryFrom<RawFields> for FieldOrder {
    type Error = SchemaError;

    fn try_from(value: RawFields) -> Result<Self, Self::Error> {
        match value {
            RawFields::List(fields) => FieldOrder::new(fields),
            RawFields::Keys(mapping) => FieldOrder::new(mapping.into_iter().map(|(key, _)| {
                match key {
                    serde_yaml::Value::String(name) => name,
                    other => serde_yaml::to_string(&other)
                        .map(|s| s.trim().to_string())
                        .unwrap_or_default(),
                }
            })),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSchema {
    #[serde(alias = "schema_uuid")]
    pub id: Uuid,
    #[serde(alias = "user_uuid")]
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "schema_name")]
    pub name: Option<String>,
    #[serde(alias = "schema")]
    pub fields: FieldOrder,
}

impl OutputSchema {
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{name} ({})", self.id),
            None => self.id.to_string(),
        }
    }
}

/// Read-only lookups the pipeline needs from persistence.
pub trait SchemaStore: Send + Sync {
    fn schema_by_id(&self, id: Uuid) -> Result<Option<OutputSchema>>;
    fn schemas_for_owner(&self, owner_id: &str) -> Result<Vec<OutputSchema>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    schemas: Vec<OutputSchema>,
}

/// Schema store persisted as a single YAML document.
#[derive(Debug, Default)]
pub struct YamlSchemaStore {
    path: Option<PathBuf>,
    document: StoreDocument,
}

impl YamlSchemaStore {
    /// Opens the store at `path`; a missing file yields an empty store.
    pub fn open(path: &Path) -> Result<Self> {
        let document = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Opening schema store {path:?}"))?;
            if raw.trim().is_empty() {
                StoreDocument::default()
            } else {
                serde_yaml::from_str(&raw)
                    .with_context(|| format!("Parsing schema store {path:?}"))?
            }
        } else {
            StoreDocument::default()
        };
        let store = Self {
            path: Some(path.to_path_buf()),
            document,
        };
        store.ensure_unique_ids()?;
        Ok(store)
    }

    pub fn in_memory(schemas: Vec<OutputSchema>) -> Result<Self> {
        let store = Self {
            path: None,
            document: StoreDocument { schemas },
        };
        store.ensure_unique_ids()?;
        Ok(store)
    }

    fn ensure_unique_ids(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for schema in &self.document.schemas {
            ensure!(
                seen.insert(schema.id),
                "Schema id {} appears more than once in the store",
                schema.id
            );
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| anyhow!("In-memory schema store has no backing file"))?;
        let serialized = serde_yaml::to_string(&self.document).context("Serializing schema store")?;
        fs::write(path, serialized).with_context(|| format!("Writing schema store {path:?}"))
    }

    pub fn all(&self) -> &[OutputSchema] {
        &self.document.schemas
    }

    pub fn insert(
        &mut self,
        owner_id: &str,
        name: Option<String>,
        fields: FieldOrder,
    ) -> OutputSchema {
        let schema = OutputSchema {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            name,
            fields,
        };
        self.document.schemas.push(schema.clone());
        schema
    }

    pub fn update_fields(&mut self, id: Uuid, fields: FieldOrder) -> Option<OutputSchema> {
        let schema = self.document.schemas.iter_mut().find(|s| s.id == id)?;
        schema.fields = fields;
        Some(schema.clone())
    }

    pub fn remove(&mut self, id: Uuid) -> Option<OutputSchema> {
        let position = self.document.schemas.iter().position(|s| s.id == id)?;
        Some(self.document.schemas.remove(position))
    }
}

impl SchemaStore for YamlSchemaStore {
    fn schema_by_id(&self, id: Uuid) -> Result<Option<OutputSchema>> {
        Ok(self.document.schemas.iter().find(|s| s.id == id).cloned())
    }

    fn schemas_for_owner(&self, owner_id: &str) -> Result<Vec<OutputSchema>> {
        Ok(self
            .document
            .schemas
            .iter()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect())
    }
}
