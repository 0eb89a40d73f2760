//! Indicator catalog.

use arrow::array::{Array, StringArray};
use arrow::record_batch::RecordBatch;
use serde::Serialize;

use crate::error::{EtlError, Result};
use crate::utils::arrow::{column_names, string_column};

/// One indicator known to the data provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    /// File stem of the raw table
    pub id: String,
    /// Observation frequency code, `A` for annual
    pub freq: String,
    pub indicator: String,
    pub indicator_label: String,
    pub n_records: Option<u64>,
}

/// The indicator catalog, in provider order
#[derive(Debug, Clone, Default)]
pub struct IndicatorCatalog {
    pub entries: Vec<CatalogEntry>,
}

impl IndicatorCatalog {
    /// Build a catalog from an all-string table
    ///
    /// # Errors
    /// Returns a `Metadata` error when a catalog column is missing or a row
    /// has no id.
    pub fn from_batch(batch: &RecordBatch) -> Result<Self> {
        let column = |name: &str| -> Result<&StringArray> {
            string_column(batch, name)?.ok_or_else(|| {
                EtlError::Metadata(format!(
                    "catalog column '{name}' missing, found {:?}",
                    column_names(batch)
                ))
            })
        };
        let ids = column("id")?;
        let freqs = column("freq")?;
        let indicators = column("indicator")?;
        let labels = column("indicator_label")?;
        let counts = column("n_records")?;

        let text = |array: &StringArray, i: usize| -> String {
            if array.is_null(i) {
                String::new()
            } else {
                array.value(i).to_string()
            }
        };

        let mut entries = Vec::with_capacity(batch.num_rows());
        for i in 0..batch.num_rows() {
            if ids.is_null(i) {
                return Err(EtlError::Metadata(format!("catalog row {i} has no id")));
            }
            let n_records = if counts.is_null(i) {
                None
            } else {
                Some(counts.value(i).trim().parse::<u64>().map_err(|e| {
                    EtlError::Metadata(format!(
                        "catalog row {i}: invalid n_records '{}': {e}",
                        counts.value(i)
                    ))
                })?)
            };
            entries.push(CatalogEntry {
                id: ids.value(i).to_string(),
                freq: text(freqs, i),
                indicator: text(indicators, i),
                indicator_label: text(labels, i),
                n_records,
            });
        }
        Ok(Self { entries })
    }

    /// Entries observed at the given frequency, in catalog order
    #[must_use]
    pub fn with_frequency(&self, freq: &str) -> Vec<&CatalogEntry> {
        self.entries.iter().filter(|e| e.freq == freq).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
