//! Per-file and per-group audit logs.
//!
//! Records are accumulated in memory while groups are processed and
//! persisted once, as two pipe-delimited files, after every group is done:
//!
//! - `master_log_<timestamp>.csv`: one row per successfully loaded file
//! - `summary_log_<timestamp>.csv`: one row per consolidated group

use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use snafu::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{AuditError, CreateLogSnafu, FlushLogSnafu, WriteLogSnafu};
use crate::source::{LoadedFile, SourcePeriod};

/// Format of [`FileRecord::discovery_timestamp`].
pub const DISCOVERY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Format of [`GroupSummary`] start and end times.
pub const GROUP_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const LOG_DELIMITER: u8 = b'|';

/// One successfully loaded source file.
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub file_name: String,
    /// Display form of the path, so non-UTF-8 names still serialize.
    #[serde(rename = "file_location")]
    pub absolute_path: String,
    #[serde(rename = "month", serialize_with = "serialize_period")]
    pub period: SourcePeriod,
    pub row_count: usize,
    #[serde(rename = "col_count")]
    pub column_count: usize,
    #[serde(rename = "file_size_KB")]
    pub size_kb: f64,
    #[serde(rename = "timestamp", serialize_with = "serialize_discovery_time")]
    pub discovery_timestamp: DateTime<Local>,
}

impl FileRecord {
    /// Build the record for a file that has just been loaded.
    pub fn from_loaded(file: &LoadedFile, period: &SourcePeriod) -> Self {
        Self {
            file_name: file.file_name(),
            absolute_path: file.path.display().to_string(),
            period: period.clone(),
            row_count: file.table.row_count(),
            column_count: file.table.column_count(),
            size_kb: kilobytes(file.size_bytes),
            discovery_timestamp: Local::now(),
        }
    }
}

/// Outcome of one consolidated group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    #[serde(rename = "prefix")]
    pub group_key: String,
    #[serde(rename = "total_files")]
    pub total_matched_files: usize,
    pub total_rows: usize,
    #[serde(rename = "total_cols")]
    pub total_columns: usize,
    #[serde(rename = "column_mismatch_flag")]
    pub column_mismatch: bool,
    #[serde(serialize_with = "serialize_group_time")]
    pub start_time: DateTime<Local>,
    #[serde(serialize_with = "serialize_group_time")]
    pub end_time: DateTime<Local>,
    #[serde(rename = "periods")]
    pub periods_covered: String,
}

/// Paths of the audit logs that were written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditOutcome {
    pub file_log: Option<PathBuf>,
    pub summary_log: Option<PathBuf>,
}

/// Append-only accumulator for both audit logs.
#[derive(Debug, Default)]
pub struct AuditLog {
    files: Vec<FileRecord>,
    groups: Vec<GroupSummary>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_file(&mut self, record: FileRecord) {
        self.files.push(record);
    }

    pub fn record_group(&mut self, summary: GroupSummary) {
        self.groups.push(summary);
    }

    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    pub fn groups(&self) -> &[GroupSummary] {
        &self.groups
    }

    /// Write both logs into `dir`. An empty log is skipped with a warning.
    pub fn persist(&self, dir: &Path, run_stamp: &str) -> Result<AuditOutcome, AuditError> {
        let file_log = if self.files.is_empty() {
            warn!("No files were loaded, master log not written");
            None
        } else {
            let path = dir.join(format!("master_log_{run_stamp}.csv"));
            write_log(&path, &self.files)?;
            info!("Master log saved: {}", path.display());
            Some(path)
        };

        let summary_log = if self.groups.is_empty() {
            warn!("No groups were consolidated, summary log not written");
            None
        } else {
            let path = dir.join(format!("summary_log_{run_stamp}.csv"));
            write_log(&path, &self.groups)?;
            info!("Summary log saved: {}", path.display());
            Some(path)
        };

        Ok(AuditOutcome {
            file_log,
            summary_log,
        })
    }
}

fn write_log<T: Serialize>(path: &Path, records: &[T]) -> Result<(), AuditError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(LOG_DELIMITER)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(path)
        .context(CreateLogSnafu { path })?;
    for record in records {
        writer.serialize(record).context(WriteLogSnafu { path })?;
    }
    writer.flush().context(FlushLogSnafu { path })
}

/// Size in kilobytes, rounded to two decimals.
pub fn kilobytes(bytes: u64) -> f64 {
    (bytes as f64 / 1024.0 * 100.0).round() / 100.0
}

/// Sorted unique periods joined with commas.
pub fn join_periods<'a>(periods: impl IntoIterator<Item = &'a SourcePeriod>) -> String {
    periods
        .into_iter()
        .map(SourcePeriod::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

fn serialize_period<S: Serializer>(period: &SourcePeriod, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(period.as_str())
}

fn serialize_discovery_time<S: Serializer>(
    time: &DateTime<Local>,
    s: S,
) -> Result<S::Ok, S::Error> {
    s.collect_str(&time.format(DISCOVERY_TIMESTAMP_FORMAT))
}

fn serialize_group_time<S: Serializer>(time: &DateTime<Local>, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&time.format(GROUP_TIMESTAMP_FORMAT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 15, h, m, s).unwrap()
    }

    fn file_record(name: &str, rows: usize) -> FileRecord {
        FileRecord {
            file_name: name.to_string(),
            absolute_path: format!("/data/202401/{name}"),
            period: SourcePeriod::parse("202401").unwrap(),
            row_count: rows,
            column_count: 2,
            size_kb: kilobytes(2048),
            discovery_timestamp: at(9, 30, 0),
        }
    }

    #[test]
    fn test_kilobytes_rounding() {
        assert_eq!(kilobytes(1024), 1.0);
        assert_eq!(kilobytes(16), 0.02);
        assert_eq!(kilobytes(1536), 1.5);
        assert_eq!(kilobytes(0), 0.0);
    }

    #[test]
    fn test_master_log_format() {
        let temp = TempDir::new().unwrap();
        let mut log = AuditLog::new();
        log.record_file(file_record("abc_x.csv", 3));

        let outcome = log.persist(temp.path(), "20240115_093000").unwrap();
        let path = outcome.file_log.unwrap();
        assert!(path.ends_with("master_log_20240115_093000.csv"));
        assert!(outcome.summary_log.is_none());

        let content = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "file_name|file_location|month|row_count|col_count|file_size_KB|timestamp"
        );
        assert_eq!(
            lines[1],
            "abc_x.csv|/data/202401/abc_x.csv|202401|3|2|2.0|2024-01-15 09:30:00.000000"
        );
    }

    #[test]
    fn test_summary_log_format() {
        let temp = TempDir::new().unwrap();
        let mut log = AuditLog::new();
        log.record_group(GroupSummary {
            group_key: "abc".to_string(),
            total_matched_files: 2,
            total_rows: 5,
            total_columns: 4,
            column_mismatch: true,
            start_time: at(9, 30, 0),
            end_time: at(9, 31, 5),
            periods_covered: "202401,202402".to_string(),
        });

        let outcome = log.persist(temp.path(), "t").unwrap();
        assert!(outcome.file_log.is_none());

        let content = fs::read_to_string(outcome.summary_log.unwrap()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "prefix|total_files|total_rows|total_cols|column_mismatch_flag|start_time|end_time|periods"
        );
        assert_eq!(
            lines[1],
            "abc|2|5|4|true|2024-01-15 09:30:00|2024-01-15 09:31:05|202401,202402"
        );
    }

    #[test]
    fn test_empty_logs_not_written() {
        let temp = TempDir::new().unwrap();
        let outcome = AuditLog::new().persist(temp.path(), "t").unwrap();

        assert_eq!(outcome, AuditOutcome::default());
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_join_periods() {
        let periods = [
            SourcePeriod::parse("202401").unwrap(),
            SourcePeriod::parse("202403").unwrap(),
        ];
        assert_eq!(join_periods(&periods), "202401,202403");
        assert_eq!(join_periods(&[]), "");
    }
}
