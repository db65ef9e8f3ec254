//! Logging setup.
//!
//! Logs go to stdout and, when a path is given, to the run log in the
//! output directory. `RUST_LOG` overrides the configured level.

use snafu::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::error::{PipelineError, RunLogSnafu};

/// Path of the free-text run log for a run.
pub fn run_log_path(dir: &Path, run_stamp: &str) -> PathBuf {
    dir.join(format!("run_log_{run_stamp}.log"))
}

/// Install the global subscriber.
pub fn init_logging(level: &str, run_log: Option<&Path>) -> Result<(), PipelineError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = match run_log {
        Some(path) => {
            let file = File::create(path).context(RunLogSnafu { path })?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    Ok(())
}
