//! Shared helpers for Arrow tables and logging.

pub mod arrow;
pub mod logging;
