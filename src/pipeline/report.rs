//! Run report written after every pipeline run.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::dedup::DedupReport;
use crate::error::{EtlError, Result, ResultExt};
use crate::output::PartitionSummary;

/// One indicator written to disk
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorOutcome {
    pub id: String,
    pub partition: PartitionSummary,
    pub dedup: DedupReport,
}

/// An indicator or derived step that did not produce output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    pub id: String,
    /// Error kind, see [`EtlError::kind`]
    pub kind: String,
    pub reason: String,
}

impl SkippedItem {
    #[must_use]
    pub fn new(id: impl Into<String>, error: &EtlError) -> Self {
        Self {
            id: id.into(),
            kind: error.kind().to_string(),
            reason: error.to_string(),
        }
    }
}

/// Everything a run produced or skipped, in catalog order
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Catalog entries matching the configured frequency
    pub selected: usize,
    pub processed: Vec<IndicatorOutcome>,
    pub skipped: Vec<SkippedItem>,
    pub derived: Vec<PartitionSummary>,
    pub derived_failures: Vec<SkippedItem>,
}

impl RunReport {
    /// Total rows written across indicator outputs
    #[must_use]
    pub fn rows_written(&self) -> usize {
        self.processed.iter().map(|o| o.partition.rows).sum()
    }

    /// Indicators whose duplicates could not be resolved
    #[must_use]
    pub fn unresolved(&self) -> Vec<&str> {
        self.processed
            .iter()
            .filter(|o| o.dedup.unresolved_duplicates > 0 || o.dedup.removed_first_wins > 0)
            .map(|o| o.id.as_str())
            .collect()
    }

    /// Write the report as pretty-printed JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(io::Error::from)
            .with_context(|| format!("failed to serialize report to {}", path.display()))?;
        writer
            .write_all(b"\n")
            .and_then(|()| writer.flush())
            .with_context(|| format!("failed to flush {}", path.display()))
    }
}
