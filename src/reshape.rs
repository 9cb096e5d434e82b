//! Applies a [`MappingDecision`] to a full table.
//!
//! The header candidate already sits in `Table::headers`, so skipping `n`
//! rows drops the decorative rows under it together with the real header.
//! Cells are moved across untouched; only labels change.

use log::warn;

use crate::{
    config::ShortfallPolicy,
    decision::MappingDecision,
    error::ReshapeError,
    schema::FieldOrder,
    table::Table,
};

pub fn reshape(
    table: &Table,
    decision: &MappingDecision,
    fields: &FieldOrder,
    policy: ShortfallPolicy,
) -> Result<Table, ReshapeError> {
    let mapping = match decision {
        MappingDecision::Failed { reason, .. } => {
            return Err(ReshapeError::MappingFailed(reason.clone()));
        }
        MappingDecision::Mapped(mapping) => mapping,
    };

    if mapping.skip_rows > table.row_count() {
        return Err(ReshapeError::MappingFailed(format!(
            "skip_rows {} exceeds the {} row(s) in {}",
            mapping.skip_rows,
            table.row_count(),
            table.origin()
        )));
    }

    let mut order = mapping.column_order.as_slice();
    if order.len() > fields.len() {
        warn!(
            "{}: mapping lists {} column(s) for {} field(s); extra columns dropped",
            table.origin(),
            order.len(),
            fields.len()
        );
        order = &order[..fields.len()];
    }

    if let Some(index) = order.iter().find(|idx| **idx >= table.width()) {
        return Err(ReshapeError::MappingFailed(format!(
            "index out of range: column {index} does not exist in {} ({} column(s))",
            table.origin(),
            table.width()
        )));
    }

    if order.len() < fields.len() {
        let missing = fields.names()[order.len()..].join(", ");
        match policy {
            ShortfallPolicy::Fail => {
                return Err(ReshapeError::MappingFailed(format!(
                    "no column mapped for field(s): {missing}"
                )));
            }
            ShortfallPolicy::Warn => warn!(
                "{}: no column mapped for field(s): {missing}",
                table.origin()
            ),
        }
    }

    let rows = table.rows[mapping.skip_rows..]
        .iter()
        .map(|row| order.iter().map(|&idx| row[idx].clone()).collect())
        .collect();

    Ok(Table {
        source: table.source.clone(),
        sheet: table.sheet.clone(),
        headers: fields.names()[..order.len()].to_vec(),
        rows,
    })
}
