//! Module for reading CSV tables (plain or gzip-compressed) into Arrow.
//!
//! Raw indicator tables are read whole into a single `RecordBatch`. Column
//! types are decided by name before reading, so the same reader serves raw
//! sources, metadata tables and previously written outputs.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use arrow::compute::concat_batches;
use arrow::csv::ReaderBuilder;
use arrow::csv::reader::Format;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use arrow_schema::{Field, Schema};
use flate2::read::GzDecoder;

use crate::error::{Result, ResultExt, safe_open_file};
use crate::schema::OBS_VALUE_COLUMN;
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// Default number of CSV rows decoded per Arrow batch
pub const DEFAULT_BATCH_SIZE: usize = 16384;

/// Batch size from the `DDF_BATCH_SIZE` environment variable, if set
#[must_use]
pub fn get_batch_size() -> Option<usize> {
    std::env::var("DDF_BATCH_SIZE")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|n| *n > 0)
}

/// Open a table file, transparently decompressing `.gz`
pub fn open_table(path: &Path) -> Result<Box<dyn Read>> {
    let file = safe_open_file(path, "reading table")?;
    let is_gzip = path.extension().is_some_and(|ext| ext == "gz");
    if is_gzip {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn csv_format() -> Format {
    Format::default().with_header(true)
}

/// Column names of a table, reading only its header and first record
pub fn read_column_names(path: &Path) -> Result<Vec<String>> {
    let reader = open_table(path)?;
    let (schema, _) = csv_format()
        .infer_schema(reader, Some(1))
        .with_context(|| format!("failed to read header of {}", path.display()))?;
    Ok(schema.fields().iter().map(|f| f.name().clone()).collect())
}

/// Read a whole table, typing each column with `column_type`
///
/// # Arguments
/// * `path` - CSV or CSV.gz file with a header row
/// * `column_type` - Arrow type for a column, given its name
pub fn read_table<F>(path: &Path, column_type: F) -> Result<RecordBatch>
where
    F: Fn(&str) -> DataType,
{
    let start = Instant::now();
    log_operation_start("Reading table", path);

    let fields: Vec<Field> = read_column_names(path)?
        .into_iter()
        .map(|name| {
            let data_type = column_type(&name);
            Field::new(name, data_type, true)
        })
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let reader = ReaderBuilder::new(schema.clone())
        .with_format(csv_format())
        .with_batch_size(get_batch_size().unwrap_or(DEFAULT_BATCH_SIZE))
        .build(open_table(path)?)
        .with_context(|| format!("failed to build CSV reader for {}", path.display()))?;

    let batches = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("failed to parse {}", path.display()))?;
    let batch = concat_batches(&schema, &batches)
        .with_context(|| format!("failed to combine batches of {}", path.display()))?;

    log_operation_complete("read", path, batch.num_rows(), start.elapsed());
    Ok(batch)
}

/// Read a raw indicator table: `obs_value` as float, everything else as text
pub fn read_indicator_table(path: &Path) -> Result<RecordBatch> {
    read_table(path, |name| {
        if name == OBS_VALUE_COLUMN {
            DataType::Float64
        } else {
            DataType::Utf8
        }
    })
}

/// Read a table with every column as text
pub fn read_string_table(path: &Path) -> Result<RecordBatch> {
    read_table(path, |_| DataType::Utf8)
}
