//! Schema gate for raw indicator tables.

use std::collections::BTreeSet;
use std::path::PathBuf;

use log::{debug, warn};

use crate::error::{EtlError, Result};
use crate::reader::read_column_names;
use crate::schema::PERMITTED_COLUMNS;

/// Check that every column lies inside the permitted vocabulary
///
/// # Arguments
/// * `indicator` - Name used in the error report
/// * `columns` - Column names of the raw table
///
/// # Errors
/// Returns `SchemaViolation` with the expected and actual column sets when
/// any column is unknown.
pub fn validate_columns<S: AsRef<str>>(indicator: &str, columns: &[S]) -> Result<()> {
    let unexpected = columns
        .iter()
        .map(AsRef::as_ref)
        .any(|c| !PERMITTED_COLUMNS.contains(&c));

    if unexpected {
        return Err(EtlError::SchemaViolation {
            indicator: indicator.to_string(),
            expected: PERMITTED_COLUMNS.iter().map(ToString::to_string).collect(),
            actual: columns.iter().map(|c| c.as_ref().to_string()).collect(),
        });
    }
    Ok(())
}

/// Union of the column names of many raw files, reading only their headers
///
/// Files that do not exist or whose header cannot be read are skipped; they
/// are reported later when the indicator itself is processed.
#[must_use]
pub fn survey_columns(paths: &[PathBuf]) -> BTreeSet<String> {
    let mut columns = BTreeSet::new();
    for path in paths {
        if !path.is_file() {
            continue;
        }
        match read_column_names(path) {
            Ok(names) => {
                debug!("{}: {} columns", path.display(), names.len());
                columns.extend(names);
            }
            Err(e) => warn!("survey skips {}: {e}", path.display()),
        }
    }
    columns
}
