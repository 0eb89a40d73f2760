//! Logging utilities for output and progress tracking
//!
//! This module provides utilities for logging, console output, and progress tracking.

pub mod console;
pub mod log;
pub mod progress;

// Re-export commonly used functions for convenience
pub use console::print_run_summary;
pub use log::{log_data_quality, log_operation_complete, log_operation_start, log_skipped};
pub use progress::{create_main_progress_bar, finish_progress_bar};
