//! Column projection for datapoint records.

use arrow::record_batch::RecordBatch;

use crate::error::{EtlError, Result};
use crate::schema::{DATAPOINT_COLUMNS, Provenance};
use crate::utils::arrow::{column_names, select_columns};

/// Restrict a raw table to the datapoint columns it actually has
///
/// The present subset of [`DATAPOINT_COLUMNS`] is kept in canonical order,
/// followed by whichever provenance columns exist. Columns listed in
/// `required` must be part of the projected result.
///
/// # Errors
/// Returns `MissingRequiredColumn` with the attempted and actual column lists
/// when a required column is absent.
pub fn project_datapoint_columns(
    indicator: &str,
    batch: &RecordBatch,
    required: &[String],
) -> Result<RecordBatch> {
    let actual = column_names(batch);
    let projection: Vec<&str> = DATAPOINT_COLUMNS
        .iter()
        .copied()
        .chain(Provenance::ALL.iter().map(|p| p.as_str()))
        .filter(|c| actual.iter().any(|a| a == c))
        .collect();

    let missing: Vec<String> = required
        .iter()
        .filter(|c| !projection.contains(&c.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(EtlError::MissingRequiredColumn {
            indicator: indicator.to_string(),
            attempted: missing,
            actual,
        });
    }

    select_columns(batch, &projection)
}
