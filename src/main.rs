//! consolidator: merges per-period delimited extracts into one file set per group.
//!
//! Reads group keys from a prefix sheet, collects every matching file from
//! the six-digit period folders under the source root and writes each
//! group as size-bounded pipe-delimited parts plus audit logs.

use clap::Parser;
use snafu::prelude::*;
use std::path::PathBuf;
use tracing::info;

use consolidator::config::{Config, MB};
use consolidator::error::{ConfigSnafu, CreateOutputDirSnafu, PipelineError};
use consolidator::logging::{init_logging, run_log_path};
use consolidator::pipeline::{Pipeline, timestamp_now};

/// Consolidate per-period extracts into one output per group.
#[derive(Parser, Debug)]
#[command(name = "consolidator")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root folder containing the period folders (overrides the config file).
    #[arg(long)]
    source_root: Option<PathBuf>,

    /// File with the `prefix` column of group keys (overrides the config file).
    #[arg(long)]
    prefix_file: Option<PathBuf>,

    /// Output directory (overrides the config file).
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Maximum output part size in MiB (overrides the config file).
    #[arg(long)]
    max_part_size_mb: Option<u64>,

    /// Load and reconcile every group but write no output parts.
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[snafu::report]
fn main() -> Result<(), PipelineError> {
    let args = Args::parse();
    let config = build_config(&args)?;

    let run_stamp = timestamp_now();
    let output_dir = &config.sink.output_dir;
    std::fs::create_dir_all(output_dir).context(CreateOutputDirSnafu { path: output_dir })?;
    let run_log = run_log_path(output_dir, &run_stamp);
    init_logging(&args.log_level, Some(run_log.as_path()))?;

    info!("consolidator starting");
    info!("Source root: {}", config.source.root.display());
    info!("Prefix file: {}", config.source.prefix_file.display());
    info!("Output directory: {}", output_dir.display());

    let report = Pipeline::new(config)?.with_run_stamp(run_stamp).run()?;
    let stats = &report.stats;

    info!("Consolidation completed");
    info!(
        "  Groups: {} consolidated, {} skipped, {} failed of {}",
        stats.groups_consolidated, stats.groups_skipped, stats.groups_failed, stats.groups_total
    );
    info!(
        "  Files: {} loaded, {} failed of {} matched",
        stats.files_loaded, stats.files_failed, stats.files_matched
    );
    info!("  Rows consolidated: {}", stats.rows_consolidated);
    info!("  Parts written: {}", stats.parts_written);
    info!("  Bytes written: {}", stats.bytes_written);
    if let Some(path) = &report.failure_log {
        info!("  Failure log: {}", path.display());
    }

    Ok(())
}

/// Build configuration from the optional file and command-line overrides.
fn build_config(args: &Args) -> Result<Config, PipelineError> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path).context(ConfigSnafu)?,
        None => Config::new(PathBuf::new(), PathBuf::new(), PathBuf::new()),
    };

    if let Some(root) = &args.source_root {
        config.source.root = root.clone();
    }
    if let Some(prefix_file) = &args.prefix_file {
        config.source.prefix_file = prefix_file.clone();
    }
    if let Some(output_dir) = &args.output_dir {
        config.sink.output_dir = output_dir.clone();
    }
    if let Some(mb) = args.max_part_size_mb {
        config.sink.max_part_size_bytes = mb.saturating_mul(MB);
    }
    if args.dry_run {
        config.dry_run = true;
    }

    config.validate().context(ConfigSnafu)?;
    Ok(config)
}
