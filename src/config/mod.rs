//! Configuration for the datapoint pipeline.

use std::path::{Path, PathBuf};

use log::info;
use serde::Deserialize;

use crate::derived::DerivedRatio;
use crate::error::{EtlError, Result, ResultExt};
use crate::output::PartitionLayout;
use crate::schema::{Dimension, INDICATOR_COLUMN, OBS_VALUE_COLUMN};

/// Row count above which an output is split into shards
pub const DEFAULT_SPLIT_THRESHOLD: usize = 150_000;

/// Significant digits kept when formatting measures
pub const DEFAULT_FLOAT_DIGITS: usize = 5;

/// Configuration for a pipeline run
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EtlConfig {
    /// Directory holding `<indicator-id><source_extension>` raw tables
    pub source_dir: PathBuf,
    /// Directory holding the catalog and classification tables
    pub metadata_dir: PathBuf,
    /// Directory receiving the datapoint files
    pub output_dir: PathBuf,
    /// Extension appended to an indicator id to locate its raw table
    pub source_extension: String,
    /// File name prefix of every datapoint output
    pub prefix: String,
    /// Catalog frequency code to process
    pub frequency: String,
    /// Outputs with more rows than this are sharded
    pub split_threshold: usize,
    /// Significant digits for formatted measures
    pub float_digits: usize,
    /// Dimension to shard oversized outputs by; at most one
    pub split_dimensions: Vec<Dimension>,
    /// Columns that must survive projection
    pub required_columns: Vec<String>,
    /// Validate every raw header before processing and abort on violations
    pub strict_schema: bool,
    /// Worker threads for indicator processing, `None` for one per CPU
    pub num_threads: Option<usize>,
    /// Show a progress bar
    pub show_progress: bool,
    /// Run report written under `output_dir`, `None` to skip it
    pub report_file: Option<String>,
    /// Derived ratio indicators computed after the datapoints
    pub derived: Vec<DerivedRatio>,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("source"),
            metadata_dir: PathBuf::from("metadata"),
            output_dir: PathBuf::from("."),
            source_extension: ".csv.gz".to_string(),
            prefix: "ddf--datapoints".to_string(),
            frequency: "A".to_string(),
            split_threshold: DEFAULT_SPLIT_THRESHOLD,
            float_digits: DEFAULT_FLOAT_DIGITS,
            split_dimensions: vec![Dimension::RefArea],
            required_columns: vec![INDICATOR_COLUMN.to_string(), OBS_VALUE_COLUMN.to_string()],
            strict_schema: true,
            num_threads: None,
            show_progress: false,
            report_file: Some("etl-report.json".to_string()),
            derived: vec![DerivedRatio::default()],
        }
    }
}

impl EtlConfig {
    /// Load a configuration from a JSON file; absent fields take defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .map_err(|e| EtlError::Config(format!("invalid config {}: {e}", path.display())))
    }

    /// Apply `DDF_SPLIT_THRESHOLD` and `DDF_FLOAT_DIGITS` when set
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(threshold) = env_usize("DDF_SPLIT_THRESHOLD")? {
            info!("split threshold overridden to {threshold}");
            self.split_threshold = threshold;
        }
        if let Some(digits) = env_usize("DDF_FLOAT_DIGITS")? {
            info!("float digits overridden to {digits}");
            self.float_digits = digits;
        }
        Ok(())
    }

    /// Check the configuration and derive the partition layout
    ///
    /// # Errors
    /// Returns `Config` for zero thresholds or digits and `UnsupportedSplit`
    /// for more than one split dimension.
    pub fn validate(&self) -> Result<PartitionLayout> {
        if self.split_threshold == 0 {
            return Err(EtlError::Config("split_threshold must be positive".to_string()));
        }
        if self.float_digits == 0 || self.float_digits > 17 {
            return Err(EtlError::Config(format!(
                "float_digits must be between 1 and 17, got {}",
                self.float_digits
            )));
        }
        if self.prefix.is_empty() {
            return Err(EtlError::Config("prefix must not be empty".to_string()));
        }
        if self.num_threads == Some(0) {
            return Err(EtlError::Config("num_threads must be positive".to_string()));
        }
        PartitionLayout::from_dimensions(&self.split_dimensions)
    }

    /// Location of an indicator's raw table
    #[must_use]
    pub fn source_path(&self, indicator_id: &str) -> PathBuf {
        self.source_dir
            .join(format!("{indicator_id}{}", self.source_extension))
    }

    /// Worker thread count
    #[must_use]
    pub fn threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get)
    }
}

fn env_usize(name: &str) -> Result<Option<usize>> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|e| EtlError::Config(format!("{name}='{value}' is not a count: {e}"))),
        Err(_) => Ok(None),
    }
}
