//! Configuration parsing and validation.
//!
//! Handles loading configuration from YAML files. Command-line flags are
//! layered on top by the binary; the pipeline only ever sees a validated
//! [`Config`] value.

mod vars;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::path::{Path, PathBuf};

use crate::error::{
    ConfigError, EmptyOutputDirSnafu, EmptyPrefixFileSnafu, EmptySourceRootSnafu,
    EnvInterpolationSnafu, InvalidChunkRowsSnafu, InvalidPartSizeSnafu, ReadFileSnafu,
    YamlParseSnafu,
};

pub use vars::{Interpolated, interpolate};

/// Byte size constants (binary/IEC units).
pub const KB: u64 = 1024;
pub const MB: u64 = 1024 * KB;
pub const GB: u64 = 1024 * MB;

/// Hard upper bound on the size of a single output part.
pub const MAX_PART_SIZE_BYTES: u64 = 20 * GB;

/// Rows serialized together; the unit of part placement.
pub const DEFAULT_CHUNK_ROWS: usize = 10_000;

/// Main configuration structure for a consolidation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub sink: SinkConfig,
    /// Error handling configuration (optional).
    #[serde(default)]
    pub error_handling: ErrorHandlingConfig,
    /// Metrics configuration (optional, disabled by default).
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Match, load and reconcile, but write no group output parts.
    #[serde(default)]
    pub dry_run: bool,
}

/// Where the source files and group keys come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Root folder containing the six-digit period folders.
    pub root: PathBuf,
    /// Tabular file with a `prefix` column listing the group keys.
    pub prefix_file: PathBuf,
}

/// Where and how consolidated output is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Directory receiving parts, audit logs and the run log.
    pub output_dir: PathBuf,

    /// Maximum size of one output part in bytes (default and cap: 20 GiB).
    #[serde(default = "default_max_part_size_bytes")]
    pub max_part_size_bytes: u64,

    /// Rows per serialized chunk (default: 10000).
    #[serde(default = "default_chunk_rows")]
    pub chunk_rows: usize,

    /// Extension of the output parts, without the dot (default: "csv").
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Text written for cells a source file did not have (default: empty).
    #[serde(default)]
    pub placeholder: String,
}

fn default_max_part_size_bytes() -> u64 {
    MAX_PART_SIZE_BYTES
}

fn default_chunk_rows() -> usize {
    DEFAULT_CHUNK_ROWS
}

fn default_extension() -> String {
    "csv".to_string()
}

impl SinkConfig {
    /// Create a sink configuration with defaults for everything but the directory.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            max_part_size_bytes: default_max_part_size_bytes(),
            chunk_rows: default_chunk_rows(),
            extension: default_extension(),
            placeholder: String::new(),
        }
    }
}

/// Error handling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorHandlingConfig {
    /// Write failed files and groups to `failures_<timestamp>.ndjson` (default: true).
    #[serde(default = "default_failure_log")]
    pub failure_log: bool,
}

impl Default for ErrorHandlingConfig {
    fn default() -> Self {
        Self {
            failure_log: default_failure_log(),
        }
    }
}

fn default_failure_log() -> bool {
    true
}

/// Metrics configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Install a Prometheus recorder and write a snapshot at the end of the run.
    #[serde(default)]
    pub enabled: bool,
}

impl Config {
    /// Create a configuration with default sink, error handling and metrics settings.
    pub fn new(
        root: impl Into<PathBuf>,
        prefix_file: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source: SourceConfig {
                root: root.into(),
                prefix_file: prefix_file.into(),
            },
            sink: SinkConfig::new(output_dir),
            error_handling: ErrorHandlingConfig::default(),
            metrics: MetricsConfig::default(),
            dry_run: false,
        }
    }

    /// Load configuration from a YAML file, interpolating `${VAR}` references.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let result = interpolate(content);
        if !result.is_ok() {
            return EnvInterpolationSnafu {
                message: result.error_message(),
            }
            .fail();
        }

        let config: Config = serde_yaml::from_str(&result.text).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(
            !self.source.root.as_os_str().is_empty(),
            EmptySourceRootSnafu
        );
        ensure!(
            !self.source.prefix_file.as_os_str().is_empty(),
            EmptyPrefixFileSnafu
        );
        ensure!(
            !self.sink.output_dir.as_os_str().is_empty(),
            EmptyOutputDirSnafu
        );
        ensure!(
            self.sink.max_part_size_bytes > 0
                && self.sink.max_part_size_bytes <= MAX_PART_SIZE_BYTES,
            InvalidPartSizeSnafu {
                bytes: self.sink.max_part_size_bytes,
                max: MAX_PART_SIZE_BYTES,
            }
        );
        ensure!(self.sink.chunk_rows > 0, InvalidChunkRowsSnafu);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_yaml_parsing() {
        let yaml = r#"
source:
  root: "/data/exports/2024"
  prefix_file: "/data/prefix_file.xlsx"

sink:
  output_dir: "/data/output"
  max_part_size_bytes: 1048576
  chunk_rows: 500
  extension: txt

dry_run: true
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.source.root, PathBuf::from("/data/exports/2024"));
        assert_eq!(config.sink.max_part_size_bytes, MB);
        assert_eq!(config.sink.chunk_rows, 500);
        assert_eq!(config.sink.extension, "txt");
        assert!(config.dry_run);
    }

    #[test]
    fn test_config_defaults() {
        let yaml = r#"
source:
  root: "/in"
  prefix_file: "/prefixes.csv"
sink:
  output_dir: "/out"
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.sink.max_part_size_bytes, 20 * GB);
        assert_eq!(config.sink.chunk_rows, 10_000);
        assert_eq!(config.sink.extension, "csv");
        assert_eq!(config.sink.placeholder, "");
        assert!(config.error_handling.failure_log);
        assert!(!config.metrics.enabled);
        assert!(!config.dry_run);
    }

    #[test]
    fn test_part_size_above_hard_limit_rejected() {
        let mut config = Config::new("/in", "/prefixes.csv", "/out");
        config.sink.max_part_size_bytes = MAX_PART_SIZE_BYTES + 1;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPartSize { .. }));

        config.sink.max_part_size_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_chunk_rows_rejected() {
        let mut config = Config::new("/in", "/prefixes.csv", "/out");
        config.sink.chunk_rows = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidChunkRows)
        ));
    }

    #[test]
    fn test_empty_paths_rejected() {
        let config = Config::new("", "/prefixes.csv", "/out");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptySourceRoot)
        ));
    }
}
