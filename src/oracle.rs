//! Schema mapping oracle.
//!
//! Shows a bounded sample of a table to a [`CompletionService`] and turns
//! the reply into a [`MappingDecision`]. Whatever happens on the wire, the
//! caller gets a decision back: transport errors and contract violations
//! become `Failed` decisions after the exact-match fallback has had a go.

use heck::ToSnakeCase;
use log::{debug, info, warn};
use serde_json::json;

use crate::{
    config::OracleSettings,
    decision::{ColumnMapping, FailureKind, MappingDecision, ReplyBounds, parse_reply},
    error::ServiceError,
    schema::FieldOrder,
    table::{EMPTY_LABEL, Table, header_label},
};

const SYSTEM_PROMPT: &str = "You are a data mapping expert. You receive the first rows of an \
uploaded spreadsheet and an ordered list of target fields. Work out how many rows precede the \
real header row and which input column holds each target field.

Reply with exactly one JSON object and nothing else, using these keys:
  \"skip_rows\": zero-based index of the real header row within the sample (0 when the first row is the header),
  \"column_order\": zero-based input column indexes, one per target field, in target field order,
  \"error\": false,
  \"error_message\": null

Rules:
1. Match columns on semantic meaning, not only exact names (\"fname\" matches \"first_name\").
2. Cells shown as \"<blank>\" are empty; rows of blanks or titles before the header count towards skip_rows.
3. Only include exact or very high confidence matches. Never reuse a column index.
4. If any target field cannot be matched, reply with
   {\"skip_rows\": null, \"column_order\": null, \"error\": true, \"error_message\": \"column <field> not found\"}";

/// Leading rows of a table as the service sees them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingSample {
    pub origin: String,
    /// Header candidate first, then up to `sample_rows - 1` rows.
    pub rows: Vec<Vec<String>>,
    pub width: usize,
}

impl MappingSample {
    pub fn from_table(table: &Table, sample_rows: usize) -> Self {
        let mut rows = Vec::with_capacity(sample_rows);
        if !table.is_empty() {
            rows.push(table.headers.clone());
            rows.extend(
                table
                    .rows
                    .iter()
                    .take(sample_rows.saturating_sub(1))
                    .map(|row| row.iter().map(header_label).collect()),
            );
        }
        Self {
            origin: table.origin(),
            rows,
            width: table.width(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.width == 0
    }
}

/// One chat-style request to the inference service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRequest {
    pub system: String,
    pub user: String,
}

impl MappingRequest {
    pub fn build(sample: &MappingSample, fields: &FieldOrder) -> Self {
        let rows = sample
            .rows
            .iter()
            .enumerate()
            .map(|(index, cells)| json!({ "row": index, "cells": cells }))
            .collect::<Vec<_>>();
        let payload = json!({
            "column_count": sample.width,
            "sample_rows": rows,
            "target_fields": fields.names(),
        });
        Self {
            system: SYSTEM_PROMPT.to_string(),
            user: format!(
                "Map this sample onto the target fields. Column indexes are positions within each \
                 `cells` array.\n{payload:#}"
            ),
        }
    }
}

/// Text-generation backend. Implementations return the raw reply text.
pub trait CompletionService: Send + Sync {
    fn complete(&self, request: &MappingRequest) -> Result<String, ServiceError>;
}

pub struct Oracle {
    service: Option<Box<dyn CompletionService>>,
    settings: OracleSettings,
}

impl Oracle {
    pub fn new(service: Box<dyn CompletionService>, settings: OracleSettings) -> Self {
        Self {
            service: Some(service),
            settings,
        }
    }

    /// Oracle that never calls out; only the exact-match fallback runs.
    pub fn offline(settings: OracleSettings) -> Self {
        Self {
            service: None,
            settings,
        }
    }

    pub fn settings(&self) -> OracleSettings {
        self.settings
    }

    pub fn map_table(&self, table: &Table, fields: &FieldOrder) -> MappingDecision {
        let sample = MappingSample::from_table(table, self.settings.sample_rows);
        self.infer_mapping(&sample, fields)
    }

    pub fn infer_mapping(&self, sample: &MappingSample, fields: &FieldOrder) -> MappingDecision {
        if sample.is_empty() {
            return MappingDecision::failed(
                FailureKind::EmptyInput,
                format!("{} contains no rows to map", sample.origin),
            );
        }

        let Some(service) = self.service.as_deref() else {
            return self.fall_back(
                sample,
                fields,
                FailureKind::Unavailable,
                "inference service disabled (offline mode)".to_string(),
            );
        };

        let request = MappingRequest::build(sample, fields);
        let bounds = ReplyBounds {
            sample_rows: sample.len(),
            width: sample.width,
            field_count: fields.len(),
        };
        let (kind, reason) = match self.ask(service, &request) {
            Ok(raw) => {
                debug!("Inference reply for {}: {}", sample.origin, raw);
                match parse_reply(&raw).and_then(|reply| reply.into_decision(bounds)) {
                    Ok(decision) => {
                        if let Some(reason) = decision.failure_reason() {
                            info!("Inference service declined {}: {}", sample.origin, reason);
                        }
                        return decision;
                    }
                    Err(violation) => (
                        FailureKind::ContractViolation,
                        format!("inference reply violated the mapping contract: {violation}"),
                    ),
                }
            }
            Err(err @ ServiceError::Unavailable(_)) => {
                (FailureKind::Unavailable, err.to_string())
            }
            Err(err @ ServiceError::Rejected(_)) => (FailureKind::Rejected, err.to_string()),
        };
        warn!("Mapping {} via inference failed: {}", sample.origin, reason);
        self.fall_back(sample, fields, kind, reason)
    }

    /// Calls the service, retrying unavailable errors within the budget.
    fn ask(
        &self,
        service: &dyn CompletionService,
        request: &MappingRequest,
    ) -> Result<String, ServiceError> {
        let mut attempt = 0u32;
        loop {
            match service.complete(request) {
                Err(ServiceError::Unavailable(reason)) if attempt < self.settings.max_retries => {
                    attempt += 1;
                    warn!(
                        "Inference service unavailable ({reason}); retry {attempt}/{}",
                        self.settings.max_retries
                    );
                }
                outcome => return outcome,
            }
        }
    }

    fn fall_back(
        &self,
        sample: &MappingSample,
        fields: &FieldOrder,
        kind: FailureKind,
        reason: String,
    ) -> MappingDecision {
        match exact_match(sample, fields) {
            Some(mapping) => {
                info!(
                    "Exact header match for {} at row {} ({} column(s))",
                    sample.origin,
                    mapping.skip_rows,
                    mapping.column_order.len()
                );
                MappingDecision::Mapped(mapping)
            }
            None => MappingDecision::failed(kind, reason),
        }
    }
}

/// Finds the first sample row whose labels name every target field exactly
/// once, ignoring case and punctuation.
pub fn exact_match(sample: &MappingSample, fields: &FieldOrder) -> Option<ColumnMapping> {
    let targets = fields.iter().map(|f| normalize_label(f)).collect::<Vec<_>>();
    'rows: for (row_index, row) in sample.rows.iter().enumerate() {
        let labels = row
            .iter()
            .map(|label| {
                if label == EMPTY_LABEL {
                    String::new()
                } else {
                    normalize_label(label)
                }
            })
            .collect::<Vec<_>>();
        let mut order = Vec::with_capacity(targets.len());
        for target in &targets {
            let mut hits = labels
                .iter()
                .enumerate()
                .filter(|(_, label)| !label.is_empty() && *label == target)
                .map(|(idx, _)| idx);
            match (hits.next(), hits.next()) {
                // Distinct fields may normalize to one label; a column feeds one field.
                (Some(idx), None) if !order.contains(&idx) => order.push(idx),
                _ => continue 'rows,
            }
        }
        return Some(ColumnMapping {
            skip_rows: row_index,
            column_order: order,
        });
    }
    None
}

fn normalize_label(label: &str) -> String {
    label
        .to_snake_case()
        .chars()
        .filter(|ch| ch.is_alphanumeric())
        .collect()
}
