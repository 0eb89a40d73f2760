//! Error handling for the datapoint pipeline.

pub mod util;

use std::io;
use std::path::PathBuf;

use arrow::error::ArrowError;

pub use util::{ResultExt, ensure_directory, safe_open_file};

/// Specialized error type for the datapoint pipeline
#[derive(Debug, thiserror::Error)]
pub enum EtlError {
    /// Raw input contains columns outside the permitted set
    #[error(
        "unexpected columns in {indicator}: expected a subset of {expected:?}, found {actual:?}"
    )]
    SchemaViolation {
        indicator: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// A column the caller asked for is absent after projection
    #[error("{indicator}: missing required column(s) {attempted:?}, available columns {actual:?}")]
    MissingRequiredColumn {
        indicator: String,
        attempted: Vec<String>,
        actual: Vec<String>,
    },

    /// The measure column is absent after transformation
    #[error("measure column '{measure}' not found, available columns {actual:?}")]
    MissingMeasureColumn { measure: String, actual: Vec<String> },

    /// The indicator table carries no indicator value at all
    #[error("{indicator}: table has no rows with an indicator value")]
    EmptyTable { indicator: String },

    /// The raw source file for an indicator does not exist
    #[error("source file not found: {}", .path.display())]
    SourceMissing { path: PathBuf },

    /// A prerequisite output dataset is absent or empty
    #[error("missing dependency: dataset '{dataset}' is absent or empty")]
    MissingDependency { dataset: String },

    /// Invalid split request for the output partitioner
    #[error("unsupported split: {0}")]
    UnsupportedSplit(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// The metadata collaborator returned something unusable
    #[error("metadata error: {0}")]
    Metadata(String),

    /// Error opening, reading or writing a file
    #[error("IO error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// Error processing Arrow data
    #[error("Arrow error: {context}: {source}")]
    Arrow {
        context: String,
        #[source]
        source: ArrowError,
    },
}

impl From<io::Error> for EtlError {
    fn from(source: io::Error) -> Self {
        Self::Io {
            context: "I/O operation failed".to_string(),
            source,
        }
    }
}

impl From<ArrowError> for EtlError {
    fn from(source: ArrowError) -> Self {
        Self::Arrow {
            context: "Arrow operation failed".to_string(),
            source,
        }
    }
}

impl EtlError {
    /// Whether this error aborts the whole run rather than a single indicator.
    ///
    /// Schema violations are fatal only in strict mode; configuration and
    /// metadata problems are always fatal.
    #[must_use]
    pub const fn is_fatal(&self, strict: bool) -> bool {
        match self {
            Self::SchemaViolation { .. } => strict,
            Self::UnsupportedSplit(_) | Self::Config(_) | Self::Metadata(_) => true,
            _ => false,
        }
    }

    /// Short machine-friendly name of the error kind, used in the run report.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SchemaViolation { .. } => "schema_violation",
            Self::MissingRequiredColumn { .. } => "missing_required_column",
            Self::MissingMeasureColumn { .. } => "missing_measure_column",
            Self::EmptyTable { .. } => "empty_table",
            Self::SourceMissing { .. } => "source_missing",
            Self::MissingDependency { .. } => "missing_dependency",
            Self::UnsupportedSplit(_) => "unsupported_split",
            Self::Config(_) => "config",
            Self::Metadata(_) => "metadata",
            Self::Io { .. } => "io",
            Self::Arrow { .. } => "arrow",
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality_policy() {
        let schema = EtlError::SchemaViolation {
            indicator: "x".to_string(),
            expected: vec![],
            actual: vec![],
        };
        assert!(schema.is_fatal(true));
        assert!(!schema.is_fatal(false));
        assert!(EtlError::UnsupportedSplit("two".to_string()).is_fatal(false));
        assert!(
            !EtlError::MissingDependency {
                dataset: "emp".to_string()
            }
            .is_fatal(true)
        );
        assert!(
            !EtlError::SourceMissing {
                path: PathBuf::from("a.csv.gz")
            }
            .is_fatal(true)
        );
    }

    #[test]
    fn test_required_column_message_lists_columns() {
        let err = EtlError::MissingRequiredColumn {
            indicator: "emp".to_string(),
            attempted: vec!["obs_value".to_string()],
            actual: vec!["ref_area".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("obs_value"));
        assert!(msg.contains("ref_area"));
        assert_eq!(err.kind(), "missing_required_column");
    }
}
