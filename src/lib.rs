//! Normalization, deduplication and partitioning of statistical indicator
//! tables into DDF datapoint files, plus derived ratio indicators.

pub mod config;
pub mod dedup;
pub mod derived;
pub mod error;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod reader;
pub mod schema;
pub mod transform;
pub mod utils;

// Core types
pub use config::EtlConfig;
pub use error::{EtlError, Result};
pub use pipeline::{Pipeline, RunReport};

// Pipeline stages
pub use dedup::{DedupReport, deduplicate};
pub use derived::DerivedRatio;
pub use output::{PartitionLayout, PartitionSummary, PartitionWriter};
pub use schema::{DatapointSchema, Dimension, Provenance};
pub use transform::{IndicatorTable, transform_indicator};

// Metadata
pub use metadata::{IndicatorCatalog, LocalMetadata, MetadataSource, SourcePriorities, SourcePriority};

// Arrow types
pub use arrow::record_batch::RecordBatch;
