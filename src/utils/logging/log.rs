//! Logging helpers
//!
//! Consistent messages for file operations and per-indicator diagnostics.

use std::fmt::Display;
use std::path::Path;
use std::time::Duration;

/// Log the start of a file operation
pub fn log_operation_start(operation: &str, path: &Path) {
    log::debug!("{operation} {}", path.display());
}

/// Log a finished file operation
///
/// # Arguments
/// * `verb` - Past-tense description, e.g. "read"
/// * `path` - File that was operated on
/// * `rows` - Rows handled
/// * `elapsed` - Time taken
pub fn log_operation_complete(verb: &str, path: &Path, rows: usize, elapsed: Duration) {
    log::debug!("{verb} {rows} rows from {} in {elapsed:?}", path.display());
}

/// Log a data-quality diagnostic for one indicator
///
/// Data-quality conditions never fail the run; they are surfaced here so
/// operators can audit them.
pub fn log_data_quality(indicator: &str, message: &str) {
    log::warn!("{indicator}: {message}");
}

/// Log an indicator that was skipped, with the reason
pub fn log_skipped(indicator: &str, reason: &dyn Display) {
    log::warn!("skipping {indicator}: {reason}");
}
