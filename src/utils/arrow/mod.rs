//! Arrow data handling utilities
//!
//! Column lookup, projection and row-key helpers shared by the pipeline
//! stages.

pub mod array_utils;

// Re-export commonly used functions for convenience
pub use array_utils::{
    column_names, drop_columns, drop_non_finite, drop_nulls, float_column, has_column, key_rows,
    rename_column, replace_column, select_columns, string_batch, string_column, take_rows,
};
