//! Main processing pipeline.
//!
//! Connects the group resolver, table loader, schema reconciler, part
//! writer and audit recorder into one sequential run.
//!
//! # Flow
//!
//! 1. Read the group keys and index the source tree once.
//! 2. For each group, in key order: resolve its files, load them period by
//!    period, merge them into one table and write it as size-bounded parts.
//! 3. Persist the audit logs, the failure log and the metrics snapshot.
//!
//! Per-file and per-group failures are recorded and skipped; only
//! configuration and source-root errors abort the run.

use chrono::Local;
use snafu::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::audit::{AuditLog, AuditOutcome, FileRecord, GroupSummary, join_periods};
use crate::config::Config;
use crate::dlq::{DeadLetterQueue, FailureStats, FailureTracker};
use crate::emit;
use crate::error::{
    AuditSnafu, ConfigSnafu, CreateOutputDirSnafu, DlqSnafu, MetricsSnafu, PipelineError,
    ResolverSnafu,
};
use crate::metrics::events::{FailureStage, FileLoaded, GroupProcessed, GroupStatus};
use crate::schema::GroupAccumulator;
use crate::sink::{FinishedPart, OutputBase, PartWriterConfig, write_table};
use crate::source::{GroupKey, SourceIndex, TableReader, read_group_keys};

/// Format of the timestamp embedded in every output file name.
pub const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Current local time formatted for file names.
pub fn timestamp_now() -> String {
    Local::now().format(RUN_TIMESTAMP_FORMAT).to_string()
}

/// Statistics about the pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub groups_total: usize,
    pub groups_consolidated: usize,
    pub groups_skipped: usize,
    pub groups_failed: usize,
    pub files_matched: usize,
    pub files_loaded: usize,
    pub files_failed: usize,
    pub rows_consolidated: usize,
    pub parts_written: usize,
    pub bytes_written: u64,
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Timestamp shared by the run's log files.
    pub run_stamp: String,
    pub stats: PipelineStats,
    pub failures: FailureStats,
    pub audit: AuditOutcome,
    /// Output parts, in the order they were written.
    pub parts: Vec<FinishedPart>,
    pub failure_log: Option<PathBuf>,
    pub metrics_snapshot: Option<PathBuf>,
}

/// Main processing pipeline.
pub struct Pipeline {
    config: Config,
    run_stamp: String,
    reader: TableReader,
    audit: AuditLog,
    failures: FailureTracker,
    stats: PipelineStats,
    parts: Vec<FinishedPart>,
}

impl Pipeline {
    /// Create a new pipeline from a validated configuration.
    pub fn new(config: Config) -> Result<Self, PipelineError> {
        config.validate().context(ConfigSnafu)?;
        Ok(Self {
            config,
            run_stamp: timestamp_now(),
            reader: TableReader::new(),
            audit: AuditLog::new(),
            failures: FailureTracker::default(),
            stats: PipelineStats::default(),
            parts: Vec::new(),
        })
    }

    /// Use a caller-chosen timestamp for the run's log files.
    pub fn with_run_stamp(mut self, run_stamp: impl Into<String>) -> Self {
        self.run_stamp = run_stamp.into();
        self
    }

    pub fn run_stamp(&self) -> &str {
        &self.run_stamp
    }

    /// Run the pipeline to completion.
    pub fn run(mut self) -> Result<RunReport, PipelineError> {
        let output_dir = self.config.sink.output_dir.clone();
        std::fs::create_dir_all(&output_dir).context(CreateOutputDirSnafu {
            path: &output_dir,
        })?;

        let metrics = if self.config.metrics.enabled {
            Some(crate::metrics::init().context(MetricsSnafu)?)
        } else {
            None
        };

        self.failures = FailureTracker::new(DeadLetterQueue::from_config(
            &self.config.error_handling,
            &output_dir,
            &self.run_stamp,
        ));

        info!(
            "Starting consolidation run {}{}",
            self.run_stamp,
            if self.config.dry_run { " (dry run)" } else { "" }
        );

        let keys = read_group_keys(&self.config.source.prefix_file).context(ConfigSnafu)?;
        info!("Loaded {} group keys", keys.len());

        let index = SourceIndex::scan(&self.config.source.root).context(ResolverSnafu)?;
        for folder in index.folders() {
            for error in &folder.unreadable {
                let path = error.path().unwrap_or(&folder.path);
                self.failures
                    .record_failure(path, None, error, FailureStage::List);
            }
        }

        self.stats.groups_total = keys.len();
        for key in &keys {
            self.process_group(&index, key, &output_dir);
        }

        let audit = self
            .audit
            .persist(&output_dir, &self.run_stamp)
            .context(AuditSnafu)?;
        let (failures, failure_log) = self.failures.finalize().context(DlqSnafu)?;
        let metrics_snapshot = match &metrics {
            Some(handle) => Some(
                crate::metrics::write_snapshot(handle, &output_dir, &self.run_stamp)
                    .context(MetricsSnafu)?,
            ),
            None => None,
        };

        info!("Pipeline completed: {:?}", self.stats);
        Ok(RunReport {
            run_stamp: self.run_stamp,
            stats: self.stats,
            failures,
            audit,
            parts: self.parts,
            failure_log,
            metrics_snapshot,
        })
    }

    /// Resolve, load, merge and write one group.
    ///
    /// Never fails: problems are logged, recorded and the group is skipped.
    fn process_group(&mut self, index: &SourceIndex, key: &GroupKey, output_dir: &Path) {
        let start_time = Local::now();
        info!("Processing prefix '{}'", key);

        let files = index.resolve(key);
        if files.is_empty() {
            warn!("No matching files for prefix '{}', skipping", key);
            self.skip_group();
            return;
        }
        self.stats.files_matched += files.file_count();

        let mut accumulator = GroupAccumulator::new(key.clone());
        for (period, path) in files.iter() {
            match self.reader.read(path) {
                Ok(loaded) => {
                    debug!(
                        "Loaded {} ({} rows, {} columns, {})",
                        path.display(),
                        loaded.table.row_count(),
                        loaded.table.column_count(),
                        loaded.encoding
                    );
                    self.audit.record_file(FileRecord::from_loaded(&loaded, period));
                    accumulator.append(period, loaded.table);
                    self.stats.files_loaded += 1;
                    emit!(FileLoaded);
                }
                Err(e) => {
                    let stage = if e.is_empty_file() {
                        FailureStage::Empty
                    } else {
                        FailureStage::Read
                    };
                    self.failures
                        .record_failure(path, Some(key.as_str()), &e, stage);
                    self.stats.files_failed += 1;
                }
            }
        }

        if accumulator.is_empty() {
            warn!("No rows loaded for prefix '{}', skipping", key);
            self.skip_group();
            return;
        }

        let group = accumulator.finish();
        let row_count = group.table.row_count();

        if self.config.dry_run {
            info!(
                "Dry run: prefix '{}' would write {} rows x {} columns",
                key,
                row_count,
                group.table.column_count()
            );
        } else {
            let base = OutputBase::for_group(
                output_dir,
                key.as_str(),
                &timestamp_now(),
                &self.config.sink.extension,
            )
            .first_unused();
            let fallback_path = base.dir().join(base.stem());
            match write_table(&group.table, base, PartWriterConfig::from(&self.config.sink)) {
                Ok(parts) => {
                    self.stats.parts_written += parts.len();
                    self.stats.bytes_written += parts.iter().map(|p| p.size).sum::<u64>();
                    self.parts.extend(parts);
                }
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or(fallback_path);
                    self.failures
                        .record_failure(&path, Some(key.as_str()), &e, FailureStage::Write);
                    self.stats.groups_failed += 1;
                    emit!(GroupProcessed {
                        status: GroupStatus::Failed
                    });
                    return;
                }
            }
        }

        let periods_covered = join_periods(group.table.periods_covered());
        info!(
            "Consolidated prefix '{}': {} files, {} rows, periods {}{}",
            key,
            group.files_loaded,
            row_count,
            periods_covered,
            if group.column_mismatch {
                " (column mismatch)"
            } else {
                ""
            }
        );

        self.audit.record_group(GroupSummary {
            group_key: key.as_str().to_string(),
            total_matched_files: group.files_loaded,
            total_rows: row_count,
            total_columns: group.table.column_count(),
            column_mismatch: group.column_mismatch,
            start_time,
            end_time: Local::now(),
            periods_covered,
        });
        self.stats.groups_consolidated += 1;
        self.stats.rows_consolidated += row_count;
        emit!(GroupProcessed {
            status: GroupStatus::Consolidated
        });
    }

    fn skip_group(&mut self) {
        self.stats.groups_skipped += 1;
        emit!(GroupProcessed {
            status: GroupStatus::Skipped
        });
    }
}

/// Run the pipeline with the given configuration.
pub fn run_pipeline(config: Config) -> Result<RunReport, PipelineError> {
    Pipeline::new(config)?.run()
}
