//! Metadata served from a local directory of CSV files.

use std::path::PathBuf;

use arrow::record_batch::RecordBatch;
use log::debug;

use crate::error::{EtlError, Result};
use crate::metadata::{IndicatorCatalog, METADATA_TABLES, MetadataSource};
use crate::reader::read_string_table;

/// File stem of the catalog table
pub const CATALOG_TABLE: &str = "indicators";

/// Reads `<dir>/indicators.csv` and `<dir>/<table>.csv`
#[derive(Debug, Clone)]
pub struct LocalMetadata {
    dir: PathBuf,
}

impl LocalMetadata {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.csv"))
    }

    fn read(&self, table: &str) -> Result<RecordBatch> {
        let path = self.table_path(table);
        if !path.is_file() {
            return Err(EtlError::Metadata(format!(
                "metadata table '{table}' not found at {}",
                path.display()
            )));
        }
        debug!("loading metadata table {table}");
        read_string_table(&path)
    }
}

impl MetadataSource for LocalMetadata {
    fn load_catalog(&self) -> Result<IndicatorCatalog> {
        IndicatorCatalog::from_batch(&self.read(CATALOG_TABLE)?)
    }

    fn load_table(&self, table: &str) -> Result<RecordBatch> {
        if !METADATA_TABLES.contains(&table) {
            return Err(EtlError::Metadata(format!(
                "unknown metadata table '{table}', expected one of {METADATA_TABLES:?}"
            )));
        }
        self.read(table)
    }
}
