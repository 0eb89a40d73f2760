//! Duplicate datapoint resolution.
//!
//! Several sources may report the same datapoint. Rows are resolved in
//! stages: per area only the best source survives, then the best
//! `note_source` per key, and as a last resort the first row per key in
//! current order. Duplicates are a data-quality condition, never an error.

use std::collections::BTreeMap;

use arrow::array::{Array, StringArray};
use arrow::record_batch::RecordBatch;
use arrow::row::Rows;
use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::error::{EtlError, Result};
use crate::metadata::{PriorityKey, SourcePriorities, SourcePriority};
use crate::schema::{Dimension, Provenance};
use crate::transform::IndicatorTable;
use crate::utils::arrow::{
    column_names, drop_columns, drop_non_finite, drop_nulls, has_column, key_rows, string_column,
    take_rows,
};
use crate::utils::logging::log_data_quality;

/// What deduplication did to one indicator table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DedupReport {
    pub rows_in: usize,
    /// Rows dropped per classification column for a missing value
    pub dropped_missing_classification: BTreeMap<String, usize>,
    pub dropped_missing_measure: usize,
    /// Rows whose key tuple repeats an earlier row, before resolution
    pub duplicate_rows: usize,
    pub removed_by_source: usize,
    pub removed_by_note_source: usize,
    pub removed_first_wins: usize,
    /// Duplicates left in place because no `source` column exists
    pub unresolved_duplicates: usize,
    pub rows_out: usize,
}

/// Remove incomplete rows and resolve duplicate key tuples
///
/// The returned table has no provenance columns.
///
/// # Errors
/// Returns `MissingMeasureColumn` when the measure column is absent.
pub fn deduplicate(
    table: IndicatorTable,
    priorities: &SourcePriorities,
) -> Result<(IndicatorTable, DedupReport)> {
    let IndicatorTable { mut batch, mut schema } = table;
    let measure = schema.measure.clone();

    if !has_column(&batch, &measure) {
        return Err(EtlError::MissingMeasureColumn {
            actual: column_names(&batch),
            measure,
        });
    }

    let mut report = DedupReport {
        rows_in: batch.num_rows(),
        ..DedupReport::default()
    };

    for dim in schema
        .by
        .iter()
        .copied()
        .filter(|d| d.is_mandatory_classification())
    {
        let (filtered, dropped) = drop_nulls(&batch, dim.as_str())?;
        if dropped > 0 {
            log_data_quality(
                &measure,
                &format!("{dropped} missing values in column {dim}, dropping them"),
            );
            report
                .dropped_missing_classification
                .insert(dim.as_str().to_string(), dropped);
        }
        batch = filtered;
    }

    let (filtered, dropped) = drop_non_finite(&batch, &measure)?;
    if dropped > 0 {
        log_data_quality(
            &measure,
            &format!("{dropped} missing or non-finite values, dropping them"),
        );
    }
    report.dropped_missing_measure = dropped;
    batch = filtered;

    let keys = schema.key_columns();
    let rows = key_rows(&batch, &keys)?;
    let all: Vec<u32> = (0..batch.num_rows() as u32).collect();
    report.duplicate_rows = count_duplicates(&rows, &all);

    if report.duplicate_rows > 0 {
        if schema.has_provenance(Provenance::Source) {
            let indices = resolve_by_priority(&batch, &rows, priorities, &measure, &mut report)?;
            batch = take_rows(&batch, &indices)?;
        } else {
            log_data_quality(
                &measure,
                &format!(
                    "{} duplicated datapoints but no source column to resolve them",
                    report.duplicate_rows
                ),
            );
            report.unresolved_duplicates = report.duplicate_rows;
        }
    }

    let provenance: Vec<&str> = schema.provenance.iter().map(|p| p.as_str()).collect();
    batch = drop_columns(&batch, &provenance)?;
    schema.provenance.clear();
    report.rows_out = batch.num_rows();

    debug!("{measure}: {report:?}");
    Ok((IndicatorTable { batch, schema }, report))
}

/// Apply the source, note_source and first-wins rules, returning kept row indices
fn resolve_by_priority(
    batch: &RecordBatch,
    rows: &Rows,
    priorities: &SourcePriorities,
    measure: &str,
    report: &mut DedupReport,
) -> Result<Vec<u32>> {
    let sources = string_column(batch, Provenance::Source.as_str())?.ok_or_else(|| {
        EtlError::MissingRequiredColumn {
            indicator: measure.to_string(),
            attempted: vec![Provenance::Source.as_str().to_string()],
            actual: column_names(batch),
        }
    })?;
    let areas = string_column(batch, Dimension::RefArea.as_str())?;

    let mut indices = best_source_per_area(sources, areas, &priorities.source);
    report.removed_by_source = batch.num_rows() - indices.len();

    if let Some(notes) = string_column(batch, Provenance::NoteSource.as_str())? {
        indices.sort_by_key(|&i| priorities.note_source.key(value_at(notes, i as usize)));
        let kept = first_per_key(rows, &indices);
        report.removed_by_note_source = indices.len() - kept.len();
        indices = kept;
    }

    let remaining = count_duplicates(rows, &indices);
    if remaining > 0 {
        log_data_quality(
            measure,
            &format!(
                "{remaining} duplicated datapoints remain after selecting source/note_source, keeping the first value"
            ),
        );
        let kept = first_per_key(rows, &indices);
        report.removed_first_wins = indices.len() - kept.len();
        indices = kept;
    }

    Ok(indices)
}

fn value_at(array: &StringArray, i: usize) -> Option<&str> {
    array.is_valid(i).then(|| array.value(i))
}

/// Rows whose source is the best source present for their area, in row order
///
/// Without an area column the whole table forms one group.
fn best_source_per_area(
    sources: &StringArray,
    areas: Option<&StringArray>,
    priority: &SourcePriority,
) -> Vec<u32> {
    let area_of = |i: usize| areas.and_then(|a| value_at(a, i));
    let key_of = |i: usize| priority.key(value_at(sources, i));

    let mut best: FxHashMap<Option<&str>, PriorityKey<'_>> = FxHashMap::default();
    for i in 0..sources.len() {
        let key = key_of(i);
        best.entry(area_of(i))
            .and_modify(|b| {
                if key < *b {
                    *b = key;
                }
            })
            .or_insert(key);
    }

    (0..sources.len())
        .filter(|&i| best.get(&area_of(i)) == Some(&key_of(i)))
        .map(|i| i as u32)
        .collect()
}

/// Keep the first occurrence of each key tuple, preserving order
fn first_per_key(rows: &Rows, indices: &[u32]) -> Vec<u32> {
    let mut seen = FxHashSet::default();
    indices
        .iter()
        .copied()
        .filter(|&i| seen.insert(rows.row(i as usize)))
        .collect()
}

/// Number of rows whose key tuple already appeared earlier in `indices`
fn count_duplicates(rows: &Rows, indices: &[u32]) -> usize {
    let mut seen = FxHashSet::default();
    indices
        .iter()
        .filter(|&&i| !seen.insert(rows.row(i as usize)))
        .count()
}
