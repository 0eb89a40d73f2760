//! Console output utilities
//!
//! Human-readable end-of-run summary printed by the binary.

use std::time::Duration;

use crate::pipeline::RunReport;

/// Print a summary of a finished run
pub fn print_run_summary(report: &RunReport, elapsed: Duration) {
    println!(
        "Processed {}/{} indicators in {:?}",
        report.processed.len(),
        report.selected,
        elapsed
    );
    println!("Rows written: {}", report.rows_written());

    let sharded = report
        .processed
        .iter()
        .filter(|o| !o.partition.shards.is_empty())
        .count();
    if sharded > 0 {
        println!("Sharded outputs: {sharded}");
    }

    let unresolved = report.unresolved();
    if !unresolved.is_empty() {
        println!("Duplicates resolved by fallback or left in place:");
        for id in unresolved {
            println!("  - {id}");
        }
    }

    if !report.skipped.is_empty() {
        println!("Skipped indicators:");
        for item in &report.skipped {
            println!("  - {} ({}): {}", item.id, item.kind, item.reason);
        }
    }

    println!("Derived outputs: {}", report.derived.len());
    for item in &report.derived_failures {
        println!("  ! {} ({}): {}", item.id, item.kind, item.reason);
    }
}
