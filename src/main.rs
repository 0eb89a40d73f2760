use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use ddf_datapoints::utils::logging::print_run_summary;
use ddf_datapoints::{EtlConfig, LocalMetadata, Pipeline};
use log::info;

#[global_allocator]
static ALLOC: snmalloc_rs::SnMalloc = snmalloc_rs::SnMalloc;

#[derive(Parser, Debug)]
#[command(about = "Normalize indicator tables into sorted, deduplicated DDF datapoints")]
struct Args {
    /// JSON configuration file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of raw `<indicator-id>.csv.gz` tables
    #[arg(long)]
    source_dir: Option<PathBuf>,

    /// Directory of the indicator catalog and classification tables
    #[arg(long)]
    metadata_dir: Option<PathBuf>,

    /// Directory receiving the datapoint files
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Rows above which an output is sharded
    #[arg(long)]
    split_threshold: Option<usize>,

    /// Worker threads, defaults to one per CPU
    #[arg(long)]
    threads: Option<usize>,

    /// Skip indicators with unexpected columns instead of aborting
    #[arg(long, default_value_t = false)]
    lenient: bool,

    /// Hide the progress bar
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EtlConfig::from_json_file(path)?,
        None => EtlConfig::default(),
    };
    config.apply_env_overrides()?;
    if let Some(dir) = args.source_dir {
        config.source_dir = dir;
    }
    if let Some(dir) = args.metadata_dir {
        config.metadata_dir = dir;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(threshold) = args.split_threshold {
        config.split_threshold = threshold;
    }
    if args.threads.is_some() {
        config.num_threads = args.threads;
    }
    if args.lenient {
        config.strict_schema = false;
    }
    config.show_progress = !args.quiet;

    let start = Instant::now();
    let metadata = LocalMetadata::new(&config.metadata_dir);
    let pipeline = Pipeline::new(config, Box::new(metadata))?;
    let config = pipeline.config();
    info!(
        "reading {} with metadata from {}, writing to {} on {} threads",
        config.source_dir.display(),
        config.metadata_dir.display(),
        config.output_dir.display(),
        config.threads()
    );

    let report = pipeline.run().context("pipeline run failed")?;
    print_run_summary(&report, start.elapsed());
    if let Some(name) = &config.report_file {
        info!("run report written to {}", config.output_dir.join(name).display());
    }
    Ok(())
}
