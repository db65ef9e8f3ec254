//! Failure tracking with DLQ integration.
//!
//! Provides a single place where per-file and per-group failures are
//! logged, counted, emitted as metrics and, when enabled, recorded in the
//! DLQ.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::emit;
use crate::error::DlqError;
use crate::metrics::events::{FailureStage, FileFailed};

use super::DeadLetterQueue;
use super::types::{FailedFile, FailureStats};

/// Tracks failures and handles DLQ recording.
#[derive(Debug, Default)]
pub struct FailureTracker {
    stats: FailureStats,
    dlq: Option<DeadLetterQueue>,
}

impl FailureTracker {
    /// Create a new failure tracker.
    pub fn new(dlq: Option<DeadLetterQueue>) -> Self {
        Self {
            stats: FailureStats::default(),
            dlq,
        }
    }

    /// Record a failure for `path`, optionally while processing `group`.
    pub fn record_failure(
        &mut self,
        path: &Path,
        group: Option<&str>,
        error: &dyn std::error::Error,
        stage: FailureStage,
    ) {
        match group {
            Some(group) => warn!(
                "Skipping {} for prefix '{}' ({} stage): {}",
                path.display(),
                group,
                stage.as_str(),
                error
            ),
            None => warn!(
                "Skipping {} ({} stage): {}",
                path.display(),
                stage.as_str(),
                error
            ),
        }

        self.stats.increment(stage);
        emit!(FileFailed { stage });

        if let Some(dlq) = &mut self.dlq {
            dlq.record(FailedFile {
                path: path.display().to_string(),
                group: group.map(str::to_string),
                error: error_chain(error),
                stage,
                timestamp: Utc::now(),
            });
        }
    }

    /// Returns true if any failures were recorded.
    pub fn has_failures(&self) -> bool {
        self.stats.total() > 0
    }

    /// Returns the failure count.
    pub fn count(&self) -> usize {
        self.stats.total()
    }

    pub fn stats(&self) -> &FailureStats {
        &self.stats
    }

    /// Write the DLQ, returning the final statistics and the DLQ path if one was written.
    pub fn finalize(self) -> Result<(FailureStats, Option<PathBuf>), DlqError> {
        let path = match self.dlq {
            Some(dlq) => dlq.finalize()?,
            None => None,
        };
        if self.stats.total() > 0 {
            info!(
                "{} total failures (list={}, read={}, empty={}, write={})",
                self.stats.total(),
                self.stats.list,
                self.stats.read,
                self.stats.empty,
                self.stats.write
            );
        }
        Ok((self.stats, path))
    }
}

/// Render an error and its sources as one line.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
