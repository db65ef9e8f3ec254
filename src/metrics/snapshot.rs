//! Prometheus metrics recorder and snapshot export.
//!
//! A consolidation run is a batch job, so instead of serving `/metrics`
//! the recorder's rendering is written once to the output directory when
//! the run ends.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use snafu::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::error::{MetricsError, PrometheusInitSnafu, WriteSnapshotSnafu};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder, or return the one this process
/// already installed.
///
/// Counters are process-wide, so later runs in the same process render
/// cumulative totals.
pub fn init() -> Result<PrometheusHandle, MetricsError> {
    if let Some(handle) = HANDLE.get() {
        debug!("Reusing installed Prometheus recorder");
        return Ok(handle.clone());
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Ok(HANDLE.get_or_init(|| handle).clone()),
        // Another thread won the install race.
        Err(e) => match HANDLE.get() {
            Some(handle) => Ok(handle.clone()),
            None => Err(e).context(PrometheusInitSnafu),
        },
    }
}

/// Render the recorder and write it as `metrics_<run_stamp>.prom`.
pub fn write_snapshot(
    handle: &PrometheusHandle,
    dir: &Path,
    run_stamp: &str,
) -> Result<PathBuf, MetricsError> {
    let path = dir.join(format!("metrics_{run_stamp}.prom"));
    std::fs::write(&path, handle.render()).context(WriteSnapshotSnafu { path: &path })?;
    info!("Metrics snapshot written to {}", path.display());
    Ok(path)
}
