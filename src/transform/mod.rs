//! Reshaping of a projected indicator table into datapoint form.
//!
//! The `indicator` column collapses into the name of a single measure column,
//! identifier-valued dimensions are normalized, and the key columns are
//! recorded in an explicit [`DatapointSchema`].

pub mod concept;

use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use log::{debug, warn};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::{EtlError, Result};
use crate::schema::{DatapointSchema, Dimension, INDICATOR_COLUMN, OBS_VALUE_COLUMN, Provenance};
use crate::utils::arrow::{column_names, drop_columns, rename_column, replace_column, string_column};

pub use concept::{format_float_digits, to_concept_id};

/// A datapoint table together with its schema descriptor
#[derive(Debug, Clone)]
pub struct IndicatorTable {
    pub batch: RecordBatch,
    pub schema: DatapointSchema,
}

impl IndicatorTable {
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }
}

/// Transform one indicator's projected table
///
/// # Arguments
/// * `indicator_id` - Catalog id, used for diagnostics only
/// * `batch` - Output of the column projector
///
/// # Errors
/// Returns `EmptyTable` when no row carries an indicator value, and
/// `MissingRequiredColumn` when the table has no key dimension at all.
pub fn transform_indicator(indicator_id: &str, batch: &RecordBatch) -> Result<IndicatorTable> {
    let indicators = string_column(batch, INDICATOR_COLUMN)?.ok_or_else(|| {
        EtlError::MissingRequiredColumn {
            indicator: indicator_id.to_string(),
            attempted: vec![INDICATOR_COLUMN.to_string()],
            actual: column_names(batch),
        }
    })?;

    let distinct: Vec<&str> = indicators.iter().flatten().unique().collect();
    let Some(first) = distinct.first() else {
        return Err(EtlError::EmptyTable {
            indicator: indicator_id.to_string(),
        });
    };
    if distinct.len() > 1 {
        warn!(
            "{indicator_id}: {} distinct indicator values, using '{first}'",
            distinct.len()
        );
    }
    let measure = to_concept_id(first);

    let mut batch = drop_columns(batch, &[INDICATOR_COLUMN])?;
    batch = rename_column(&batch, OBS_VALUE_COLUMN, &measure)?;

    let names = column_names(&batch);
    let by: SmallVec<[Dimension; 5]> = names
        .iter()
        .filter_map(|c| Dimension::from_column(c))
        .collect();
    let provenance: SmallVec<[Provenance; 4]> = names
        .iter()
        .filter_map(|c| Provenance::from_column(c))
        .collect();

    if by.is_empty() {
        return Err(EtlError::MissingRequiredColumn {
            indicator: indicator_id.to_string(),
            attempted: Dimension::ALL.iter().map(ToString::to_string).collect(),
            actual: names,
        });
    }

    for dim in by.iter().filter(|d| d.is_identifier()) {
        let Some(values) = string_column(&batch, dim.as_str())? else {
            continue;
        };
        let normalized = normalize_identifiers(values);
        batch = replace_column(&batch, dim.as_str(), dim.as_str(), normalized)?;
    }

    debug!(
        "{indicator_id}: measure '{measure}' keyed by {:?}",
        by.iter().map(|d| d.as_str()).collect::<Vec<_>>()
    );

    Ok(IndicatorTable {
        batch,
        schema: DatapointSchema {
            measure,
            by,
            provenance,
        },
    })
}

/// Map every value of a string column to identifier form, keeping nulls
fn normalize_identifiers(values: &StringArray) -> ArrayRef {
    let mut cache: FxHashMap<&str, String> = FxHashMap::default();
    let normalized: StringArray = values
        .iter()
        .map(|v| v.map(|s| cache.entry(s).or_insert_with(|| to_concept_id(s)).clone()))
        .collect();
    Arc::new(normalized)
}
