//! Utility functions for error handling
//!
//! Helpers that attach file and operation context to I/O and Arrow failures.

use std::fs;
use std::io;
use std::path::Path;

use arrow::error::ArrowError;

use crate::error::{EtlError, Result};

/// Extension trait adding operation context to I/O and Arrow results
pub trait ResultExt<T> {
    /// Attach a context message, evaluated only on failure
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T> ResultExt<T> for std::result::Result<T, io::Error> {
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|source| EtlError::Io {
            context: f(),
            source,
        })
    }
}

impl<T> ResultExt<T> for std::result::Result<T, ArrowError> {
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|source| EtlError::Arrow {
            context: f(),
            source,
        })
    }
}

/// Open a file with rich error information
///
/// # Arguments
/// * `path` - The path to the file to open
/// * `purpose` - Why the file is being opened (for error context)
pub fn safe_open_file(path: &Path, purpose: &str) -> Result<fs::File> {
    if !path.is_file() {
        return Err(EtlError::SourceMissing {
            path: path.to_path_buf(),
        });
    }

    fs::File::open(path).map_err(|e| {
        let context = match e.kind() {
            io::ErrorKind::PermissionDenied => {
                format!("permission denied opening {} for {purpose}", path.display())
            }
            _ => format!("failed to open {} for {purpose}", path.display()),
        };
        EtlError::Io { context, source: e }
    })
}

/// Check that a directory exists, creating it when `create` is set
pub fn ensure_directory(path: &Path, create: bool) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    if path.exists() {
        return Err(EtlError::Config(format!(
            "{} exists but is not a directory",
            path.display()
        )));
    }
    if create {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory {}", path.display()))
    } else {
        Err(EtlError::Config(format!(
            "directory not found: {}",
            path.display()
        )))
    }
}
