//! Writing datapoint tables as sorted CSV partitions.
//!
//! A table becomes a single file, or, above the split threshold, a directory
//! with one shard per value of a single split dimension. Names are derived
//! from the prefix, the measure and the key columns, so re-running the
//! pipeline replaces the same paths wholesale.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use arrow::array::{Array, ArrayRef, StringArray};
use arrow::compute::{CastOptions, cast_with_options};
use arrow::csv::WriterBuilder;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use log::info;
use serde::Serialize;

use crate::config::EtlConfig;
use crate::error::{EtlError, Result, ResultExt, ensure_directory};
use crate::schema::Dimension;
use crate::transform::{IndicatorTable, format_float_digits};
use crate::utils::arrow::{float_column, key_rows, replace_column, select_columns, take_rows};
use crate::utils::logging::log_data_quality;

/// Shard value used for rows whose split dimension is missing
pub const MISSING_SHARD_VALUE: &str = "_missing";

/// How an oversized table is laid out on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PartitionLayout {
    /// Always a single file
    Single,
    /// One shard per value of the dimension once the table is too large
    Sharded(Dimension),
}

impl PartitionLayout {
    /// Layout for a list of requested split dimensions
    ///
    /// # Errors
    /// Returns `UnsupportedSplit` for more than one dimension.
    pub fn from_dimensions(dims: &[Dimension]) -> Result<Self> {
        match dims {
            [] => Ok(Self::Single),
            [dim] => Ok(Self::Sharded(*dim)),
            _ => Err(EtlError::UnsupportedSplit(format!(
                "only one split dimension is supported, got {dims:?}"
            ))),
        }
    }
}

/// File name stem shared by a single-file output and a shard directory
#[must_use]
pub fn datapoint_stem(prefix: &str, measure: &str, by: &[&str]) -> String {
    format!("{prefix}--{measure}--by--{}", by.join("--"))
}

/// One written shard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardSummary {
    pub value: String,
    pub path: PathBuf,
    pub rows: usize,
}

/// What a partition write produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionSummary {
    pub measure: String,
    pub by: Vec<String>,
    pub rows: usize,
    /// The CSV file, or the shard directory
    pub path: PathBuf,
    /// Empty for single-file outputs
    pub shards: Vec<ShardSummary>,
}

/// Writes datapoint tables under an output directory
#[derive(Debug, Clone)]
pub struct PartitionWriter {
    output_dir: PathBuf,
    prefix: String,
    split_threshold: usize,
    float_digits: usize,
}

impl PartitionWriter {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        split_threshold: usize,
        float_digits: usize,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: prefix.into(),
            split_threshold,
            float_digits,
        }
    }

    #[must_use]
    pub fn from_config(config: &EtlConfig) -> Self {
        Self::new(
            &config.output_dir,
            &config.prefix,
            config.split_threshold,
            config.float_digits,
        )
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Format, sort and write a deduplicated table
    ///
    /// # Errors
    /// Returns `UnsupportedSplit` when the table exceeds the threshold and the
    /// layout names no usable split dimension.
    pub fn write(&self, table: &IndicatorTable, layout: PartitionLayout) -> Result<PartitionSummary> {
        let start = Instant::now();
        let by = table.schema.key_columns();
        let measure = table.schema.measure.as_str();
        let batch = self.prepare(table)?;

        ensure_directory(&self.output_dir, true)?;
        let stem = datapoint_stem(&self.prefix, measure, &by);
        let dir_path = self.output_dir.join(&stem);
        let file_path = self.output_dir.join(format!("{stem}.csv"));

        let summary = if batch.num_rows() <= self.split_threshold {
            if dir_path.is_dir() {
                fs::remove_dir_all(&dir_path)
                    .with_context(|| format!("failed to remove stale {}", dir_path.display()))?;
            }
            write_csv(&file_path, &batch)?;
            PartitionSummary {
                measure: measure.to_string(),
                by: by.iter().map(ToString::to_string).collect(),
                rows: batch.num_rows(),
                path: file_path,
                shards: Vec::new(),
            }
        } else {
            let PartitionLayout::Sharded(dim) = layout else {
                return Err(EtlError::UnsupportedSplit(format!(
                    "{measure} has {} rows, above the threshold of {}, but no split dimension is configured",
                    batch.num_rows(),
                    self.split_threshold
                )));
            };
            let Some(position) = by.iter().position(|c| *c == dim.as_str()) else {
                return Err(EtlError::UnsupportedSplit(format!(
                    "split dimension {dim} is not a key of {measure} ({by:?})"
                )));
            };
            if file_path.is_file() {
                fs::remove_file(&file_path)
                    .with_context(|| format!("failed to remove stale {}", file_path.display()))?;
            }
            if dir_path.is_dir() {
                fs::remove_dir_all(&dir_path)
                    .with_context(|| format!("failed to remove stale {}", dir_path.display()))?;
            }
            let shards = self.write_shards(&batch, &by, measure, dim, position, &dir_path)?;
            PartitionSummary {
                measure: measure.to_string(),
                by: by.iter().map(ToString::to_string).collect(),
                rows: batch.num_rows(),
                path: dir_path,
                shards,
            }
        };

        info!(
            "wrote {} rows of {measure} to {} in {:?}",
            summary.rows,
            summary.path.display(),
            start.elapsed()
        );
        Ok(summary)
    }

    /// Output form of a table: keys then formatted measure, sorted by keys
    pub fn prepare(&self, table: &IndicatorTable) -> Result<RecordBatch> {
        let by = table.schema.key_columns();
        let measure = table.schema.measure.as_str();
        let mut batch = table.batch.clone();

        let values = float_column(&batch, measure)?;
        let mut non_finite = 0usize;
        let formatted: StringArray = values
            .iter()
            .map(|v| {
                v.and_then(|x| {
                    let text = format_float_digits(x, self.float_digits);
                    if text.is_none() {
                        non_finite += 1;
                    }
                    text
                })
            })
            .collect();
        if non_finite > 0 {
            log_data_quality(
                measure,
                &format!("{non_finite} non-finite values written as empty"),
            );
        }
        batch = replace_column(&batch, measure, measure, Arc::new(formatted))?;

        if table.schema.has_dimension(Dimension::Time) {
            let time = Dimension::Time.as_str();
            let column = batch.column(batch.schema().index_of(time)?).clone();
            let options = CastOptions {
                safe: false,
                ..Default::default()
            };
            let years: ArrayRef = cast_with_options(&column, &DataType::Int16, &options)
                .with_context(|| format!("{measure}: time values are not integers"))?;
            batch = replace_column(&batch, time, time, years)?;
        }

        let mut columns: Vec<&str> = by.clone();
        columns.push(measure);
        batch = select_columns(&batch, &columns)?;

        let rows = key_rows(&batch, &by)?;
        let mut order: Vec<u32> = (0..batch.num_rows() as u32).collect();
        order.sort_by(|&a, &b| rows.row(a as usize).cmp(&rows.row(b as usize)));
        take_rows(&batch, &order)
    }

    fn write_shards(
        &self,
        batch: &RecordBatch,
        by: &[&str],
        measure: &str,
        dim: Dimension,
        position: usize,
        dir_path: &Path,
    ) -> Result<Vec<ShardSummary>> {
        let column = batch.column(batch.schema().index_of(dim.as_str())?);

        let mut groups: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        for i in 0..batch.num_rows() {
            let value = if column.is_null(i) {
                MISSING_SHARD_VALUE.to_string()
            } else {
                array_value_to_string(column, i)
                    .with_context(|| format!("failed to render {dim} value"))?
            };
            groups.entry(value).or_default().push(i as u32);
        }
        if let Some(missing) = groups.get(MISSING_SHARD_VALUE) {
            log_data_quality(
                measure,
                &format!(
                    "{} rows without {dim} written to the '{MISSING_SHARD_VALUE}' shard",
                    missing.len()
                ),
            );
        }

        fs::create_dir_all(dir_path)
            .with_context(|| format!("failed to create {}", dir_path.display()))?;

        let mut shards = Vec::with_capacity(groups.len());
        for (value, indices) in groups {
            let mut shard_by: Vec<String> = by.iter().map(ToString::to_string).collect();
            shard_by[position] = format!("{dim}-{value}");
            let shard_by: Vec<&str> = shard_by.iter().map(String::as_str).collect();
            let path = dir_path.join(format!(
                "{}.csv",
                datapoint_stem(&self.prefix, measure, &shard_by)
            ));

            let shard = take_rows(batch, &indices)?;
            write_csv(&path, &shard)?;
            shards.push(ShardSummary {
                value,
                path,
                rows: shard.num_rows(),
            });
        }
        Ok(shards)
    }
}

/// Write a batch as CSV with a header row, replacing any existing file
pub fn write_csv(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = WriterBuilder::new()
        .with_header(true)
        .build(BufWriter::new(file));
    writer
        .write(batch)
        .with_context(|| format!("failed to write {}", path.display()))?;
    writer
        .into_inner()
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))
}
