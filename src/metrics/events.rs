//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in a consolidation
//! run. Events implement the `InternalEvent` trait which emits the
//! corresponding Prometheus metric.

use metrics::{counter, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when the source root has been indexed.
pub struct SourceFilesDiscovered {
    pub count: u64,
}

impl InternalEvent for SourceFilesDiscovered {
    fn emit(self) {
        trace!(count = self.count, "Source files discovered");
        counter!("consolidator_source_files_discovered_total").increment(self.count);
    }
}

/// Event emitted when raw bytes are read from a source file.
pub struct BytesRead {
    pub bytes: u64,
}

impl InternalEvent for BytesRead {
    fn emit(self) {
        trace!(bytes = self.bytes, "Bytes read");
        counter!("consolidator_bytes_read_total").increment(self.bytes);
    }
}

/// Event emitted when bytes are appended to an output part.
pub struct BytesWritten {
    pub bytes: u64,
}

impl InternalEvent for BytesWritten {
    fn emit(self) {
        trace!(bytes = self.bytes, "Bytes written");
        counter!("consolidator_bytes_written_total").increment(self.bytes);
    }
}

/// Event emitted when rows are merged into a group table.
pub struct RowsMerged {
    pub count: u64,
}

impl InternalEvent for RowsMerged {
    fn emit(self) {
        trace!(count = self.count, "Rows merged");
        counter!("consolidator_rows_merged_total").increment(self.count);
    }
}

/// Event emitted when a source file loads successfully.
pub struct FileLoaded;

impl InternalEvent for FileLoaded {
    fn emit(self) {
        trace!("File loaded");
        counter!("consolidator_files_loaded_total").increment(1);
    }
}

/// Stage at which a file or group failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    /// Part of a period folder could not be listed.
    List,
    /// A matched file could not be decoded or parsed.
    Read,
    /// A matched file had no data rows.
    Empty,
    /// A group's output parts could not be written.
    Write,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::List => "list",
            FailureStage::Read => "read",
            FailureStage::Empty => "empty",
            FailureStage::Write => "write",
        }
    }
}

/// Event emitted when a file or group fails.
pub struct FileFailed {
    pub stage: FailureStage,
}

impl InternalEvent for FileFailed {
    fn emit(self) {
        trace!(stage = self.stage.as_str(), "File failed");
        counter!("consolidator_files_failed_total", "stage" => self.stage.as_str()).increment(1);
    }
}

/// Outcome of processing one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStatus {
    /// Parts were written (or would have been, in a dry run).
    Consolidated,
    /// No files matched or every matched file failed.
    Skipped,
    /// Writing the group's parts failed.
    Failed,
}

impl GroupStatus {
    fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::Consolidated => "consolidated",
            GroupStatus::Skipped => "skipped",
            GroupStatus::Failed => "failed",
        }
    }
}

/// Event emitted when a group finishes processing.
pub struct GroupProcessed {
    pub status: GroupStatus,
}

impl InternalEvent for GroupProcessed {
    fn emit(self) {
        trace!(status = self.status.as_str(), "Group processed");
        counter!("consolidator_groups_processed_total", "status" => self.status.as_str())
            .increment(1);
    }
}

/// Event emitted when a group's files disagree on their column lists.
pub struct ColumnMismatchDetected;

impl InternalEvent for ColumnMismatchDetected {
    fn emit(self) {
        trace!("Column mismatch detected");
        counter!("consolidator_column_mismatches_total").increment(1);
    }
}

/// Event emitted when an output part is closed.
pub struct PartWritten {
    pub bytes: u64,
    pub rows: u64,
}

impl InternalEvent for PartWritten {
    fn emit(self) {
        trace!(bytes = self.bytes, rows = self.rows, "Part written");
        counter!("consolidator_parts_written_total").increment(1);
        histogram!("consolidator_part_size_bytes").record(self.bytes as f64);
    }
}

/// Event emitted when a chunk forces a new output part.
pub struct PartRolled;

impl InternalEvent for PartRolled {
    fn emit(self) {
        trace!("Part rolled");
        counter!("consolidator_part_rollovers_total").increment(1);
    }
}

// ============================================================================
// Histogram events for timing
// ============================================================================

/// Event emitted when a source file has been read and parsed.
pub struct FileReadCompleted {
    pub duration: Duration,
}

impl InternalEvent for FileReadCompleted {
    fn emit(self) {
        trace!(
            duration_ms = self.duration.as_millis(),
            "File read completed"
        );
        histogram!("consolidator_file_read_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted when a group's parts have all been written.
pub struct GroupWriteCompleted {
    pub duration: Duration,
}

impl InternalEvent for GroupWriteCompleted {
    fn emit(self) {
        trace!(
            duration_ms = self.duration.as_millis(),
            "Group write completed"
        );
        histogram!("consolidator_group_write_duration_seconds")
            .record(self.duration.as_secs_f64());
    }
}
