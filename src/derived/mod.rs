//! Ratio indicators computed from two already-written datapoint outputs.
//!
//! Both inputs are read back from disk, restricted to one `classif1` value,
//! aligned on `(ref_area, sex, time)` and divided. The result is split by sex
//! into one single-file output per configured sex value.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int16Array, StringArray,
};
use arrow::compute::{concat_batches, filter_record_batch};
use arrow::datatypes::{DataType, Int16Type};
use arrow::record_batch::RecordBatch;
use arrow_schema::{Field, Schema};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use smallvec::smallvec;

use crate::error::{EtlError, Result, ResultExt};
use crate::output::{PartitionLayout, PartitionSummary, PartitionWriter, datapoint_stem};
use crate::reader::read_table;
use crate::schema::{DatapointSchema, Dimension};
use crate::transform::IndicatorTable;
use crate::utils::arrow::{column_names, drop_columns, float_column, string_column};
use crate::utils::logging::log_data_quality;

/// Key columns both inputs are written with
pub const INPUT_KEYS: [&str; 4] = ["ref_area", "sex", "classif1", "time"];

/// Alignment key: area, sex, year
type RatioKey = (Option<String>, Option<String>, Option<i16>);

/// A ratio of two datapoint outputs, split by sex
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DerivedRatio {
    pub numerator: String,
    pub denominator: String,
    /// `classif1` value both inputs are restricted to
    pub classif1: String,
    /// Multiplier applied to the quotient
    pub scale: f64,
    /// Sex value to output measure name
    pub outputs: BTreeMap<String, String>,
}

impl Default for DerivedRatio {
    /// Share of paid employees in non-agricultural employment
    fn default() -> Self {
        Self {
            numerator: "ees_tees_sex_eco_nb".to_string(),
            denominator: "emp_temp_sex_eco_nb".to_string(),
            classif1: "eco_sector_nag".to_string(),
            scale: 100.0,
            outputs: BTreeMap::from([
                ("sex_m".to_string(), "ees_mnag_noc_rt".to_string()),
                ("sex_f".to_string(), "ees_fnag_noc_rt".to_string()),
                ("sex_t".to_string(), "ees_tnag_noc_rt".to_string()),
            ]),
        }
    }
}

impl DerivedRatio {
    /// Read both inputs from the writer's output directory, compute the
    /// ratio and write one file per output measure
    ///
    /// # Errors
    /// Returns `MissingDependency` when either input is absent or empty.
    pub fn run(&self, writer: &PartitionWriter) -> Result<Vec<PartitionSummary>> {
        let start = Instant::now();
        let numerator = read_partition(writer.output_dir(), writer.prefix(), &self.numerator)?;
        let denominator = read_partition(writer.output_dir(), writer.prefix(), &self.denominator)?;

        let tables = self.compute(&numerator, &denominator)?;
        let summaries = tables
            .iter()
            .map(|table| writer.write(table, PartitionLayout::Single))
            .collect::<Result<Vec<_>>>()?;

        info!(
            "derived {} outputs from {} / {} in {:?}",
            summaries.len(),
            self.numerator,
            self.denominator,
            start.elapsed()
        );
        Ok(summaries)
    }

    /// Ratio tables for each configured sex value, keyed `ref_area, time`
    ///
    /// Inputs must carry the columns in [`INPUT_KEYS`] and their measure.
    /// Every configured sex value yields a table; one with no aligned rows is
    /// empty and is written as a header-only file.
    pub fn compute(
        &self,
        numerator: &RecordBatch,
        denominator: &RecordBatch,
    ) -> Result<Vec<IndicatorTable>> {
        let numerator = self.restrict(numerator, &self.numerator)?;
        let denominator = self.restrict(denominator, &self.denominator)?;

        let mut aligned: BTreeMap<RatioKey, (Option<f64>, Option<f64>)> = BTreeMap::new();
        for (key, value) in keyed_values(&numerator, &self.numerator)? {
            aligned.entry(key).or_default().0 = value;
        }
        for (key, value) in keyed_values(&denominator, &self.denominator)? {
            aligned.entry(key).or_default().1 = value;
        }

        let mut unmatched = 0usize;
        let mut non_finite = 0usize;
        let mut by_sex: BTreeMap<Option<String>, Vec<(Option<String>, Option<i16>, f64)>> =
            BTreeMap::new();
        for ((area, sex, time), pair) in aligned {
            let (Some(num), Some(den)) = pair else {
                unmatched += 1;
                continue;
            };
            let ratio = num / den * self.scale;
            if !ratio.is_finite() {
                non_finite += 1;
                continue;
            }
            by_sex.entry(sex).or_default().push((area, time, ratio));
        }
        if unmatched > 0 {
            debug!(
                "{} / {}: {unmatched} keys present on one side only",
                self.numerator, self.denominator
            );
        }
        if non_finite > 0 {
            log_data_quality(
                &self.numerator,
                &format!("{non_finite} non-finite ratios against {} dropped", self.denominator),
            );
        }

        let mut tables = Vec::with_capacity(self.outputs.len());
        for (sex, measure) in &self.outputs {
            let rows = by_sex.remove(&Some(sex.clone())).unwrap_or_default();
            if rows.is_empty() {
                warn!("{measure}: no aligned rows for {sex}, writing header only");
            }
            tables.push(ratio_table(measure, &rows)?);
        }
        Ok(tables)
    }

    /// Keep rows of the configured `classif1` value, then drop the column
    fn restrict(&self, batch: &RecordBatch, measure: &str) -> Result<RecordBatch> {
        let classif = string_column(batch, Dimension::Classif1.as_str())?.ok_or_else(|| {
            EtlError::MissingRequiredColumn {
                indicator: measure.to_string(),
                attempted: vec![Dimension::Classif1.as_str().to_string()],
                actual: column_names(batch),
            }
        })?;
        let mask: BooleanArray = classif
            .iter()
            .map(|v| Some(v == Some(self.classif1.as_str())))
            .collect();
        let filtered = filter_record_batch(batch, &mask)
            .with_context(|| format!("failed to filter {measure} by {}", self.classif1))?;
        if filtered.num_rows() == 0 {
            warn!("{measure}: no rows with classif1 = {}", self.classif1);
        }
        drop_columns(&filtered, &[Dimension::Classif1.as_str()])
    }
}

fn keyed_values(batch: &RecordBatch, measure: &str) -> Result<Vec<(RatioKey, Option<f64>)>> {
    let missing = |column: &str| EtlError::MissingRequiredColumn {
        indicator: measure.to_string(),
        attempted: vec![column.to_string()],
        actual: column_names(batch),
    };
    let areas = string_column(batch, Dimension::RefArea.as_str())?
        .ok_or_else(|| missing(Dimension::RefArea.as_str()))?;
    let sexes = string_column(batch, Dimension::Sex.as_str())?
        .ok_or_else(|| missing(Dimension::Sex.as_str()))?;
    let time_idx = batch
        .schema()
        .index_of(Dimension::Time.as_str())
        .map_err(|_| missing(Dimension::Time.as_str()))?;
    let times = batch
        .column(time_idx)
        .as_primitive_opt::<Int16Type>()
        .ok_or_else(|| missing(Dimension::Time.as_str()))?;
    let values = float_column(batch, measure)?;

    Ok((0..batch.num_rows())
        .map(|i| {
            let key = (
                areas.is_valid(i).then(|| areas.value(i).to_string()),
                sexes.is_valid(i).then(|| sexes.value(i).to_string()),
                times.is_valid(i).then(|| times.value(i)),
            );
            (key, values.is_valid(i).then(|| values.value(i)))
        })
        .collect())
}

fn ratio_table(measure: &str, rows: &[(Option<String>, Option<i16>, f64)]) -> Result<IndicatorTable> {
    let areas: StringArray = rows.iter().map(|(a, _, _)| a.as_deref()).collect();
    let times: Int16Array = rows.iter().map(|(_, t, _)| *t).collect();
    let values: Float64Array = rows.iter().map(|(_, _, v)| Some(*v)).collect();

    let schema = Arc::new(Schema::new(vec![
        Field::new(Dimension::RefArea.as_str(), DataType::Utf8, true),
        Field::new(Dimension::Time.as_str(), DataType::Int16, true),
        Field::new(measure, DataType::Float64, true),
    ]));
    let columns: Vec<ArrayRef> = vec![Arc::new(areas), Arc::new(times), Arc::new(values)];
    let batch = RecordBatch::try_new(schema, columns)
        .with_context(|| format!("failed to build {measure} table"))?;

    Ok(IndicatorTable {
        batch,
        schema: DatapointSchema {
            measure: measure.to_string(),
            by: smallvec![Dimension::RefArea, Dimension::Time],
            provenance: smallvec![],
        },
    })
}

/// Files making up a written datapoint output: the single file, or every
/// shard of the directory in name order
fn partition_files(output_dir: &Path, prefix: &str, measure: &str) -> Result<Vec<PathBuf>> {
    let stem = datapoint_stem(prefix, measure, &INPUT_KEYS);
    let file = output_dir.join(format!("{stem}.csv"));
    if file.is_file() {
        return Ok(vec![file]);
    }
    let dir = output_dir.join(&stem);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(&dir)
        .with_context(|| format!("failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    files.sort();
    Ok(files)
}

/// Read a written datapoint output back into one batch
///
/// # Errors
/// Returns `MissingDependency` when the output is absent or has no rows.
pub fn read_partition(output_dir: &Path, prefix: &str, measure: &str) -> Result<RecordBatch> {
    let files = partition_files(output_dir, prefix, measure)?;
    if files.is_empty() {
        return Err(EtlError::MissingDependency {
            dataset: measure.to_string(),
        });
    }

    let column_type = |name: &str| {
        if name == Dimension::Time.as_str() {
            DataType::Int16
        } else if name == measure {
            DataType::Float64
        } else {
            DataType::Utf8
        }
    };
    let batches = files
        .iter()
        .map(|path| read_table(path, column_type))
        .collect::<Result<Vec<_>>>()?;

    let schema = batches[0].schema();
    let batch = concat_batches(&schema, &batches)
        .with_context(|| format!("shards of {measure} have different columns"))?;
    if batch.num_rows() == 0 {
        return Err(EtlError::MissingDependency {
            dataset: measure.to_string(),
        });
    }
    Ok(batch)
}
