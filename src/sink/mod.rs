//! Sink for consolidated group output.
//!
//! Provides the size-bounded part writer and output file naming.

pub mod writer;

use std::path::{Path, PathBuf};
use tracing::warn;

pub use writer::{PartWriter, PartWriterConfig, write_table};

/// Information about a completed output part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedPart {
    /// Full path of the part file.
    pub path: PathBuf,
    /// Part number, starting at 1.
    pub part_number: usize,
    /// The size of the file in bytes, header included.
    pub size: u64,
    /// Number of data rows in the file.
    pub row_count: usize,
}

/// Naming scheme for one group's output parts.
///
/// Parts are named `<stem>_part<N>.<extension>` inside `dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBase {
    dir: PathBuf,
    stem: String,
    extension: String,
}

impl OutputBase {
    /// Base for a group's parts: `consolidated_<group>_<timestamp>`.
    pub fn for_group(dir: &Path, group: &str, timestamp: &str, extension: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            stem: format!("consolidated_{}_{}", sanitize_file_component(group), timestamp),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// This base, or the first `<stem>_<n>` variant (n >= 2) whose first
    /// part is not already on disk.
    ///
    /// Distinct group keys can sanitize to the same stem within one second.
    pub fn first_unused(self) -> Self {
        if !self.part_path(1).exists() {
            return self;
        }
        let mut n = 2;
        loop {
            let candidate = Self {
                stem: format!("{}_{}", self.stem, n),
                ..self.clone()
            };
            if !candidate.part_path(1).exists() {
                warn!(
                    "Output stem {} already in use, writing as {}",
                    self.stem, candidate.stem
                );
                return candidate;
            }
            n += 1;
        }
    }

    /// Path of part `number`.
    pub fn part_path(&self, number: usize) -> PathBuf {
        let name = if self.extension.is_empty() {
            format!("{}_part{}", self.stem, number)
        } else {
            format!("{}_part{}.{}", self.stem, number, self.extension)
        };
        self.dir.join(name)
    }
}

/// Replace characters that cannot appear in a single path component.
pub fn sanitize_file_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => format!("{}_", cleaned.replace('.', "_")),
        _ => cleaned,
    }
}
