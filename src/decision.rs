//! Mapping decisions and the strict JSON contract they travel in.
//!
//! The inference service must answer with exactly one JSON object:
//!
//! ```json
//! {"skip_rows": 2, "column_order": [3, 0, 1], "error": false, "error_message": null}
//! ```
//!
//! `reordered_columns` is accepted in place of `column_order`. Anything else
//! (extra keys, missing keys, wrong types, prose around the object) is a
//! contract violation and never reaches the reshaper.

use itertools::Itertools;
use serde::Serialize;
use serde_json::{Map, Value};

/// Keys that must appear in every reply, with `column_order` resolved
/// separately because of its alias.
const REQUIRED_KEYS: &[&str] = &["skip_rows", "error", "error_message"];
const COLUMN_ORDER_KEYS: &[&str] = &["column_order", "reordered_columns"];

const DEFAULT_DECLINE_REASON: &str = "inference service could not map the columns";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMapping {
    pub skip_rows: usize,
    pub column_order: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The service answered that no confident mapping exists.
    Declined,
    /// Transport failures outlasted the retry budget.
    Unavailable,
    /// The service answered but refused the request (auth, bad model).
    Rejected,
    /// The reply was malformed or failed validation.
    ContractViolation,
    /// Nothing to map.
    EmptyInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "WireDecision")]
pub enum MappingDecision {
    Mapped(ColumnMapping),
    Failed { kind: FailureKind, reason: String },
}

impl MappingDecision {
    pub fn mapped(skip_rows: usize, column_order: Vec<usize>) -> Self {
        MappingDecision::Mapped(ColumnMapping {
            skip_rows,
            column_order,
        })
    }

    pub fn failed(kind: FailureKind, reason: impl Into<String>) -> Self {
        MappingDecision::Failed {
            kind,
            reason: reason.into(),
        }
    }

    /// Keeps every row and every column in place.
    pub fn identity(width: usize) -> Self {
        Self::mapped(0, (0..width).collect())
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, MappingDecision::Failed { .. })
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            MappingDecision::Failed { reason, .. } => Some(reason),
            MappingDecision::Mapped(_) => None,
        }
    }
}

/// Flat view used in reports: both mapping fields are null when failed.
#[derive(Debug, Clone, Serialize)]
pub struct WireDecision {
    pub skip_rows: Option<usize>,
    pub column_order: Option<Vec<usize>>,
    pub failed: bool,
    pub failure_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
}

impl From<MappingDecision> for WireDecision {
    fn from(value: MappingDecision) -> Self {
        match value {
            MappingDecision::Mapped(mapping) => WireDecision {
                skip_rows: Some(mapping.skip_rows),
                column_order: Some(mapping.column_order),
                failed: false,
                failure_reason: None,
                failure_kind: None,
            },
            MappingDecision::Failed { kind, reason } => WireDecision {
                skip_rows: None,
                column_order: None,
                failed: true,
                failure_reason: Some(reason),
                failure_kind: Some(kind),
            },
        }
    }
}

/// A reply that passed the shape check but not yet the range check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReply {
    pub skip_rows: Option<u64>,
    pub column_order: Option<Vec<u64>>,
    pub error: bool,
    pub error_message: Option<String>,
}

/// Bounds a reply must respect to be applied to a table.
#[derive(Debug, Clone, Copy)]
pub struct ReplyBounds {
    /// Rows shown to the service, header candidate included.
    pub sample_rows: usize,
    /// Column count of the table.
    pub width: usize,
    /// Number of target fields.
    pub field_count: usize,
}

/// Parses the raw reply text. Errors are human-readable violation reasons.
pub fn parse_reply(raw: &str) -> Result<ServiceReply, String> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|err| format!("reply is not a single JSON object: {err}"))?;
    let Value::Object(object) = value else {
        return Err("reply is not a JSON object".to_string());
    };

    for key in object.keys() {
        if !REQUIRED_KEYS.contains(&key.as_str()) && !COLUMN_ORDER_KEYS.contains(&key.as_str()) {
            return Err(format!("reply contains unexpected key '{key}'"));
        }
    }
    for key in REQUIRED_KEYS {
        if !object.contains_key(*key) {
            return Err(format!("reply is missing key '{key}'"));
        }
    }
    let order_keys = COLUMN_ORDER_KEYS
        .iter()
        .filter(|key| object.contains_key(**key))
        .collect::<Vec<_>>();
    let order_key = match order_keys.as_slice() {
        [key] => **key,
        [] => return Err("reply is missing key 'column_order'".to_string()),
        _ => return Err("reply carries both 'column_order' and 'reordered_columns'".to_string()),
    };

    Ok(ServiceReply {
        skip_rows: optional_index(&object, "skip_rows")?,
        column_order: optional_index_list(&object, order_key)?,
        error: object
            .get("error")
            .and_then(Value::as_bool)
            .ok_or_else(|| "'error' must be a boolean".to_string())?,
        error_message: match object.get("error_message") {
            Some(Value::Null) | None => None,
            Some(Value::String(message)) => Some(message.clone()),
            Some(_) => return Err("'error_message' must be a string or null".to_string()),
        },
    })
}

fn optional_index(object: &Map<String, Value>, key: &str) -> Result<Option<u64>, String> {
    match object.get(key) {
        Some(Value::Null) | None => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| format!("'{key}' must be a non-negative integer or null")),
    }
}

fn optional_index_list(object: &Map<String, Value>, key: &str) -> Result<Option<Vec<u64>>, String> {
    match object.get(key) {
        Some(Value::Null) | None => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .ok_or_else(|| format!("'{key}' must contain only non-negative integers"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => Err(format!("'{key}' must be an array of integers or null")),
    }
}

impl ServiceReply {
    /// Turns a shape-checked reply into a decision, enforcing index ranges.
    pub fn into_decision(self, bounds: ReplyBounds) -> Result<MappingDecision, String> {
        if self.error {
            let reason = self
                .error_message
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DECLINE_REASON.to_string());
            return Ok(MappingDecision::failed(FailureKind::Declined, reason));
        }

        let skip_rows = self
            .skip_rows
            .ok_or_else(|| "'skip_rows' is null although 'error' is false".to_string())?;
        let column_order = self
            .column_order
            .ok_or_else(|| "'column_order' is null although 'error' is false".to_string())?;

        let skip_rows = usize::try_from(skip_rows).map_err(|_| "'skip_rows' is too large")?;
        if skip_rows >= bounds.sample_rows {
            return Err(format!(
                "'skip_rows' {skip_rows} points past the {} sampled row(s)",
                bounds.sample_rows
            ));
        }
        if column_order.is_empty() {
            return Err("'column_order' is empty".to_string());
        }
        if column_order.len() > bounds.field_count {
            return Err(format!(
                "'column_order' has {} entries but the schema defines {} field(s)",
                column_order.len(),
                bounds.field_count
            ));
        }
        if let Some(index) = column_order.iter().duplicates().next() {
            return Err(format!("column index {index} appears more than once"));
        }
        let order = column_order
            .into_iter()
            .map(|index| {
                usize::try_from(index)
                    .ok()
                    .filter(|idx| *idx < bounds.width)
                    .ok_or_else(|| {
                        format!(
                            "column index {index} is out of range for {} column(s)",
                            bounds.width
                        )
                    })
            })
            .collect::<Result<Vec<_>, String>>()?;
        Ok(MappingDecision::mapped(skip_rows, order))
    }
}
