//! Utilities for working with Arrow arrays and record batches.
//!
//! Small, fallible helpers for column lookup, projection and row selection so
//! the pipeline stages can stay focused on their own rules.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, StringArray, UInt32Array,
};
use arrow::compute::{filter_record_batch, is_not_null, take_record_batch};
use arrow::datatypes::{DataType, Float64Type};
use arrow::record_batch::RecordBatch;
use arrow::row::{RowConverter, Rows, SortField};
use arrow_schema::{Field, Schema};

use crate::error::{EtlError, Result, ResultExt};

/// Names of all columns in a batch, in order
#[must_use]
pub fn column_names(batch: &RecordBatch) -> Vec<String> {
    batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect()
}

/// Whether a batch has a column with the given name
#[must_use]
pub fn has_column(batch: &RecordBatch, name: &str) -> bool {
    batch.schema().index_of(name).is_ok()
}

fn column_index(batch: &RecordBatch, name: &str) -> Result<usize> {
    batch.schema().index_of(name).map_err(|_| EtlError::MissingRequiredColumn {
        indicator: String::new(),
        attempted: vec![name.to_string()],
        actual: column_names(batch),
    })
}

/// Keep only the named columns, in the given order
pub fn select_columns(batch: &RecordBatch, columns: &[&str]) -> Result<RecordBatch> {
    let indices = columns
        .iter()
        .map(|c| column_index(batch, c))
        .collect::<Result<Vec<_>>>()?;
    batch
        .project(&indices)
        .with_context(|| format!("failed to project columns {columns:?}"))
}

/// Remove the named columns; names that are not present are ignored
pub fn drop_columns(batch: &RecordBatch, columns: &[&str]) -> Result<RecordBatch> {
    let schema = batch.schema();
    let indices: Vec<usize> = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| !columns.contains(&f.name().as_str()))
        .map(|(i, _)| i)
        .collect();
    batch
        .project(&indices)
        .with_context(|| format!("failed to drop columns {columns:?}"))
}

/// Replace (or rename) a column, keeping its position
///
/// # Arguments
/// * `name` - Existing column to replace
/// * `new_name` - Name of the replacement column
/// * `array` - Replacement values; must have the batch's row count
pub fn replace_column(
    batch: &RecordBatch,
    name: &str,
    new_name: &str,
    array: ArrayRef,
) -> Result<RecordBatch> {
    let idx = column_index(batch, name)?;
    let schema = batch.schema();

    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(i, f)| {
            if i == idx {
                Field::new(new_name, array.data_type().clone(), true)
            } else {
                f.as_ref().clone()
            }
        })
        .collect();

    let mut columns = batch.columns().to_vec();
    columns[idx] = array;

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .with_context(|| format!("failed to replace column '{name}'"))
}

/// Rename a column without touching its values
pub fn rename_column(batch: &RecordBatch, from: &str, to: &str) -> Result<RecordBatch> {
    let idx = column_index(batch, from)?;
    replace_column(batch, from, to, batch.column(idx).clone())
}

/// Get a string column by name, `None` if the column does not exist
pub fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<Option<&'a StringArray>> {
    let Ok(idx) = batch.schema().index_of(name) else {
        return Ok(None);
    };
    batch
        .column(idx)
        .as_string_opt::<i32>()
        .map(Some)
        .ok_or_else(|| EtlError::Arrow {
            context: format!("column '{name}' is not a string array"),
            source: arrow::error::ArrowError::InvalidArgumentError(format!(
                "expected Utf8, found {}",
                batch.column(idx).data_type()
            )),
        })
}

/// Get a float column by name
pub fn float_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array> {
    let idx = column_index(batch, name)?;
    batch
        .column(idx)
        .as_primitive_opt::<Float64Type>()
        .ok_or_else(|| EtlError::Arrow {
            context: format!("column '{name}' is not a float array"),
            source: arrow::error::ArrowError::InvalidArgumentError(format!(
                "expected Float64, found {}",
                batch.column(idx).data_type()
            )),
        })
}

/// Drop rows where the named column is null, returning the number dropped
pub fn drop_nulls(batch: &RecordBatch, name: &str) -> Result<(RecordBatch, usize)> {
    let idx = column_index(batch, name)?;
    let nulls = batch.column(idx).null_count();
    if nulls == 0 {
        return Ok((batch.clone(), 0));
    }
    let mask = is_not_null(batch.column(idx).as_ref())
        .with_context(|| format!("failed to build null mask for '{name}'"))?;
    let filtered = filter_record_batch(batch, &mask)
        .with_context(|| format!("failed to drop nulls in '{name}'"))?;
    Ok((filtered, nulls))
}

/// Drop rows where the named float column is null, NaN or infinite,
/// returning the number dropped
pub fn drop_non_finite(batch: &RecordBatch, name: &str) -> Result<(RecordBatch, usize)> {
    let values = float_column(batch, name)?;
    let mask: BooleanArray = values
        .iter()
        .map(|v| Some(v.is_some_and(f64::is_finite)))
        .collect();
    let dropped = mask.false_count();
    if dropped == 0 {
        return Ok((batch.clone(), 0));
    }
    let filtered = filter_record_batch(batch, &mask)
        .with_context(|| format!("failed to drop missing values in '{name}'"))?;
    Ok((filtered, dropped))
}

/// Select rows by index, in the given order
pub fn take_rows(batch: &RecordBatch, indices: &[u32]) -> Result<RecordBatch> {
    let indices = UInt32Array::from(indices.to_vec());
    take_record_batch(batch, &indices).with_context(|| "failed to select rows".to_string())
}

/// Row-format encoding of the named columns, comparable and hashable per row
///
/// Ordering of the encoded rows matches ascending order of the columns in
/// the given sequence, with nulls first.
pub fn key_rows(batch: &RecordBatch, columns: &[&str]) -> Result<Rows> {
    let arrays = columns
        .iter()
        .map(|c| column_index(batch, c).map(|i| batch.column(i).clone()))
        .collect::<Result<Vec<ArrayRef>>>()?;
    let fields = arrays
        .iter()
        .map(|a| SortField::new(a.data_type().clone()))
        .collect();
    let converter =
        RowConverter::new(fields).with_context(|| format!("unsupported key columns {columns:?}"))?;
    converter
        .convert_columns(&arrays)
        .with_context(|| format!("failed to encode key columns {columns:?}"))
}

/// Build an all-string batch from named columns of optional values
pub fn string_batch(columns: &[(&str, Vec<Option<&str>>)]) -> Result<RecordBatch> {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, _)| Field::new(*name, DataType::Utf8, true))
        .collect();
    let arrays: Vec<ArrayRef> = columns
        .iter()
        .map(|(_, values)| Arc::new(StringArray::from(values.clone())) as ArrayRef)
        .collect();
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
        .with_context(|| "string columns must have equal lengths".to_string())
}
