//! Dead Letter Queue implementation.
//!
//! Buffers failed file records during a run and writes them as NDJSON to
//! the output directory when the run ends.

use snafu::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::ErrorHandlingConfig;
use crate::error::{DlqError, DlqSerializeSnafu, DlqWriteSnafu};

use super::types::FailedFile;

/// Dead Letter Queue for recording failed files.
///
/// Each run writes its own `failures_<timestamp>.ndjson`.
#[derive(Debug)]
pub struct DeadLetterQueue {
    path: PathBuf,
    buffer: Vec<FailedFile>,
}

impl DeadLetterQueue {
    /// Create a new DLQ from configuration.
    ///
    /// Returns `None` if the failure log is disabled.
    pub fn from_config(config: &ErrorHandlingConfig, dir: &Path, run_stamp: &str) -> Option<Self> {
        if !config.failure_log {
            return None;
        }

        let path = dir.join(format!("failures_{run_stamp}.ndjson"));
        debug!("DLQ enabled: {}", path.display());

        Some(Self {
            path,
            buffer: Vec::new(),
        })
    }

    /// Record a failure.
    pub fn record(&mut self, failed: FailedFile) {
        debug!(
            "Recording DLQ failure: {} at stage {}",
            failed.path,
            failed.stage.as_str()
        );
        self.buffer.push(failed);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Write buffered records, returning the file path.
    ///
    /// Nothing is written when no failure was recorded.
    pub fn finalize(self) -> Result<Option<PathBuf>, DlqError> {
        if self.buffer.is_empty() {
            debug!("No failures recorded, skipping DLQ file");
            return Ok(None);
        }

        let mut ndjson = String::new();
        for record in &self.buffer {
            let line = serde_json::to_string(record).context(DlqSerializeSnafu)?;
            ndjson.push_str(&line);
            ndjson.push('\n');
        }

        let mut file =
            std::fs::File::create(&self.path).context(DlqWriteSnafu { path: &self.path })?;
        file.write_all(ndjson.as_bytes())
            .context(DlqWriteSnafu { path: &self.path })?;

        info!(
            "Wrote {} failure records to {}",
            self.buffer.len(),
            self.path.display()
        );
        Ok(Some(self.path))
    }
}
