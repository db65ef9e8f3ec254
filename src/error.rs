//! Error types for the consolidator using snafu.
//!
//! Each layer of the pipeline has its own error enum with context
//! selectors. Only [`ConfigError`] and environment-wide [`ResolverError`]s
//! abort a run; reader and writer errors are recovered per file or per group.

use snafu::prelude::*;
use std::path::PathBuf;

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Source root is empty.
    #[snafu(display("Source root cannot be empty"))]
    EmptySourceRoot,

    /// Prefix file path is empty.
    #[snafu(display("Prefix file path cannot be empty"))]
    EmptyPrefixFile,

    /// Output directory is empty.
    #[snafu(display("Output directory cannot be empty"))]
    EmptyOutputDir,

    /// Maximum part size is zero or above the hard limit.
    #[snafu(display("Maximum part size must be between 1 and {max} bytes, got {bytes}"))]
    InvalidPartSize { bytes: u64, max: u64 },

    /// Chunk size is zero.
    #[snafu(display("Chunk size must be at least one row"))]
    InvalidChunkRows,

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file {}", path.display()))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The group-key source has no `prefix` column.
    #[snafu(display("Prefix sheet {} must contain a 'prefix' column", path.display()))]
    MissingPrefixColumn { path: PathBuf },

    /// The group-key workbook could not be opened or read.
    #[snafu(display("Failed to read prefix workbook {}", path.display()))]
    PrefixWorkbook {
        path: PathBuf,
        source: calamine::Error,
    },

    /// The group-key workbook has no worksheet.
    #[snafu(display("Prefix workbook {} has no worksheets", path.display()))]
    PrefixEmptyWorkbook { path: PathBuf },

    /// The group-key delimited file could not be parsed.
    #[snafu(display("Failed to read prefix file {}", path.display()))]
    PrefixCsv { path: PathBuf, source: csv::Error },
}

// ============ Resolver Errors ============

/// Filesystem errors raised while discovering period folders and files.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ResolverError {
    /// The source root does not exist or is not a directory.
    #[snafu(display("Source root not found: {}", path.display()))]
    RootNotFound { path: PathBuf },

    /// Listing a directory failed.
    #[snafu(display("Failed to list directory {}", path.display()))]
    ListDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Walking a period folder failed at its top level.
    #[snafu(display("Failed to walk period folder {}", path.display()))]
    WalkDirectory {
        path: PathBuf,
        source: walkdir::Error,
    },
}

// ============ Reader Errors ============

/// Errors that can occur while loading one delimited source file.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReaderError {
    /// The file could not be opened or read.
    #[snafu(display("Error reading {}: {source}", path.display()))]
    OpenSource {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The delimited content could not be parsed.
    #[snafu(display("Error parsing {}: {source}", path.display()))]
    ParseTable { path: PathBuf, source: csv::Error },

    /// A data row has more fields than the header.
    #[snafu(display(
        "Error parsing {} at line {line}: expected {expected} fields, saw {found}",
        path.display()
    ))]
    RaggedRow {
        path: PathBuf,
        line: u64,
        expected: usize,
        found: usize,
    },

    /// The file has no data rows.
    #[snafu(display("File is empty: {}", path.display()))]
    EmptyFile { path: PathBuf },
}

impl ReaderError {
    /// Check if this error represents a file with no data rows.
    pub fn is_empty_file(&self) -> bool {
        matches!(self, ReaderError::EmptyFile { .. })
    }
}

// ============ Writer Errors ============

/// Errors that can occur while writing output parts.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WriterError {
    /// Creating an output part failed.
    #[snafu(display("Failed to create output part {}", path.display()))]
    CreatePart {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Appending to an output part failed.
    #[snafu(display("Failed to write output part {}", path.display()))]
    WritePart {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Serializing a chunk to delimited text failed.
    #[snafu(display("Failed to serialize chunk"))]
    SerializeChunk { source: csv::Error },

    /// Recovering the serialized chunk buffer failed.
    #[snafu(display("Failed to finish chunk buffer"))]
    FinishChunk { source: std::io::Error },
}

impl WriterError {
    /// The part file involved, if the error concerns one.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            WriterError::CreatePart { path, .. } | WriterError::WritePart { path, .. } => {
                Some(path)
            }
            _ => None,
        }
    }
}

// ============ Audit Errors ============

/// Errors that can occur while persisting the audit logs.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum AuditError {
    /// Creating an audit log file failed.
    #[snafu(display("Failed to create audit log {}", path.display()))]
    CreateLog { path: PathBuf, source: csv::Error },

    /// Writing an audit record failed.
    #[snafu(display("Failed to write audit log {}", path.display()))]
    WriteLog { path: PathBuf, source: csv::Error },

    /// Flushing an audit log failed.
    #[snafu(display("Failed to flush audit log {}", path.display()))]
    FlushLog {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization and export.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },

    /// Failed to write the metrics snapshot.
    #[snafu(display("Failed to write metrics snapshot {}", path.display()))]
    WriteSnapshot {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ============ DLQ Errors ============

/// Errors that can occur while persisting the failure log.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
// Prefix is intentional to avoid snafu selector conflicts (e.g., WritePartSnafu)
#[allow(clippy::enum_variant_names)]
pub enum DlqError {
    /// Failed to serialize a failed file record.
    #[snafu(display("Failed to serialize DLQ record"))]
    DlqSerialize { source: serde_json::Error },

    /// Failed to write the failure log.
    #[snafu(display("Failed to write DLQ file {}", path.display()))]
    DlqWrite {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ============ Pipeline Error (top-level) ============

/// Top-level pipeline errors that abort a run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Configuration error.
    #[snafu(display("Configuration error"))]
    Config { source: ConfigError },

    /// Source discovery error.
    #[snafu(display("Source discovery error"))]
    Resolver { source: ResolverError },

    /// Output directory could not be created.
    #[snafu(display("Failed to create output directory {}", path.display()))]
    CreateOutputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Run log could not be opened.
    #[snafu(display("Failed to open run log {}", path.display()))]
    RunLog {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Audit log error.
    #[snafu(display("Audit log error"))]
    Audit { source: AuditError },

    /// Metrics error.
    #[snafu(display("Metrics error"))]
    Metrics { source: MetricsError },

    /// DLQ error.
    #[snafu(display("DLQ error"))]
    Dlq { source: DlqError },
}

impl PipelineError {
    /// Check if this error was raised before any group was processed.
    pub fn is_configuration(&self) -> bool {
        matches!(self, PipelineError::Config { .. })
    }
}
