//! The metadata collaborator contract.
//!
//! Catalog and classification tables come from outside the pipeline. The
//! [`MetadataSource`] trait is the narrow seam through which they arrive;
//! [`LocalMetadata`] serves them from a directory of CSV files.

pub mod catalog;
pub mod local;
pub mod priority;

use arrow::record_batch::RecordBatch;

use crate::error::Result;

pub use catalog::{CatalogEntry, IndicatorCatalog};
pub use local::LocalMetadata;
pub use priority::{PriorityKey, SourcePriorities, SourcePriority};

/// Tables the metadata collaborator can serve besides the catalog
pub const METADATA_TABLES: [&str; 6] = [
    "classif1",
    "classif2",
    "ref_area",
    "sex",
    "source",
    "note_source",
];

/// Provider of the indicator catalog and classification tables
pub trait MetadataSource: Send + Sync {
    /// Load the indicator catalog
    fn load_catalog(&self) -> Result<IndicatorCatalog>;

    /// Load a named classification or entity table
    ///
    /// Row order is meaningful: for `source` and `note_source` it is the
    /// priority order, best first.
    fn load_table(&self, table: &str) -> Result<RecordBatch>;
}
