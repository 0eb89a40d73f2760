//! Run orchestration.
//!
//! Selects indicators from the catalog, optionally surveys every raw header
//! up front, processes indicators in parallel and finally computes the
//! derived ratios. Errors that only concern one indicator skip it; schema
//! errors in strict mode, configuration and metadata errors abort the run.

pub mod report;

use std::path::PathBuf;
use std::time::Instant;

use log::{info, warn};
use rayon::prelude::*;

use crate::config::EtlConfig;
use crate::dedup::deduplicate;
use crate::error::{EtlError, Result, ensure_directory};
use crate::metadata::{CatalogEntry, MetadataSource, SourcePriorities};
use crate::output::{PartitionLayout, PartitionWriter};
use crate::reader::{read_column_names, read_indicator_table};
use crate::schema::{project_datapoint_columns, survey_columns, validate_columns};
use crate::transform::transform_indicator;
use crate::utils::logging::{create_main_progress_bar, finish_progress_bar, log_skipped};

pub use report::{IndicatorOutcome, RunReport, SkippedItem};

/// The datapoint pipeline over one metadata source
pub struct Pipeline {
    config: EtlConfig,
    metadata: Box<dyn MetadataSource>,
    layout: PartitionLayout,
    writer: PartitionWriter,
}

impl Pipeline {
    /// Create a pipeline, validating the configuration
    ///
    /// # Errors
    /// Returns `Config` or `UnsupportedSplit` for an invalid configuration.
    pub fn new(config: EtlConfig, metadata: Box<dyn MetadataSource>) -> Result<Self> {
        let layout = config.validate()?;
        let writer = PartitionWriter::from_config(&config);
        Ok(Self {
            config,
            metadata,
            layout,
            writer,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &EtlConfig {
        &self.config
    }

    /// Run every selected indicator and the derived step
    ///
    /// # Errors
    /// Returns the first fatal error; non-fatal failures are recorded in the
    /// report instead.
    pub fn run(&self) -> Result<RunReport> {
        let start = Instant::now();
        let strict = self.config.strict_schema;

        let catalog = self.metadata.load_catalog()?;
        let entries = catalog.with_frequency(&self.config.frequency);
        info!(
            "{} of {} catalog indicators have frequency {}",
            entries.len(),
            catalog.len(),
            self.config.frequency
        );
        let priorities = SourcePriorities::load(self.metadata.as_ref())?;
        ensure_directory(&self.config.output_dir, true)?;

        if strict {
            self.survey(&entries)?;
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads())
            .build()
            .map_err(|e| EtlError::Config(format!("failed to build thread pool: {e}")))?;
        let pb = create_main_progress_bar(entries.len() as u64, self.config.show_progress);

        let results: Vec<(&CatalogEntry, Result<IndicatorOutcome>)> = pool.install(|| {
            entries
                .par_iter()
                .map(|entry| {
                    let result = self.process_indicator(entry, &priorities);
                    pb.inc(1);
                    (*entry, result)
                })
                .collect()
        });
        finish_progress_bar(&pb, Some("indicators done"));

        let mut report = RunReport {
            selected: entries.len(),
            ..RunReport::default()
        };
        for (entry, result) in results {
            match result {
                Ok(outcome) => report.processed.push(outcome),
                Err(e) if e.is_fatal(strict) => return Err(e),
                Err(e) => {
                    log_skipped(&entry.id, &e);
                    report.skipped.push(SkippedItem::new(&entry.id, &e));
                }
            }
        }

        for ratio in &self.config.derived {
            match ratio.run(&self.writer) {
                Ok(summaries) => report.derived.extend(summaries),
                Err(e) if e.is_fatal(strict) => return Err(e),
                Err(e) => {
                    warn!("derived step {} / {} failed: {e}", ratio.numerator, ratio.denominator);
                    let id = format!("{}/{}", ratio.numerator, ratio.denominator);
                    report.derived_failures.push(SkippedItem::new(id, &e));
                }
            }
        }

        if let Some(name) = &self.config.report_file {
            report.write_json(&self.config.output_dir.join(name))?;
        }
        info!(
            "processed {} indicators, skipped {}, derived {} outputs in {:?}",
            report.processed.len(),
            report.skipped.len(),
            report.derived.len(),
            start.elapsed()
        );
        Ok(report)
    }

    /// Validate the union of all raw headers before touching any data
    fn survey(&self, entries: &[&CatalogEntry]) -> Result<()> {
        let paths: Vec<PathBuf> = entries
            .iter()
            .filter_map(|e| self.locate_source(&e.id).ok())
            .collect();
        let columns: Vec<String> = survey_columns(&paths).into_iter().collect();
        info!(
            "surveyed {} raw headers, {} distinct columns",
            paths.len(),
            columns.len()
        );
        validate_columns(&format!("{} raw tables", paths.len()), &columns)
    }

    /// Raw table of an indicator, falling back to plain `.csv`
    ///
    /// # Errors
    /// Returns `SourceMissing` naming the configured path when neither exists.
    pub fn locate_source(&self, indicator_id: &str) -> Result<PathBuf> {
        let path = self.config.source_path(indicator_id);
        if path.is_file() {
            return Ok(path);
        }
        let plain = self.config.source_dir.join(format!("{indicator_id}.csv"));
        if plain.is_file() {
            return Ok(plain);
        }
        Err(EtlError::SourceMissing { path })
    }

    /// Validate, project, transform, deduplicate and write one indicator
    pub fn process_indicator(
        &self,
        entry: &CatalogEntry,
        priorities: &SourcePriorities,
    ) -> Result<IndicatorOutcome> {
        let path = self.locate_source(&entry.id)?;
        validate_columns(&entry.id, &read_column_names(&path)?)?;

        let raw = read_indicator_table(&path)?;
        let projected =
            project_datapoint_columns(&entry.id, &raw, &self.config.required_columns)?;
        let table = transform_indicator(&entry.id, &projected)?;
        let (table, dedup) = deduplicate(table, priorities)?;
        let partition = self.writer.write(&table, self.layout)?;

        Ok(IndicatorOutcome {
            id: entry.id.clone(),
            partition,
            dedup,
        })
    }
}
