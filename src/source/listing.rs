//! Period folder discovery and group file resolution.
//!
//! The source root holds one folder per period, named with exactly six
//! digits. Files may sit at any depth beneath a period folder. The tree is
//! walked once per run into a [`SourceIndex`]; every group then resolves
//! its files against that index by case-insensitive filename prefix.

use regex::Regex;
use snafu::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::prefix::GroupKey;
use crate::emit;
use crate::error::{ListDirectorySnafu, ResolverError, RootNotFoundSnafu, WalkDirectorySnafu};
use crate::metrics::events::SourceFilesDiscovered;

static PERIOD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{6}$").expect("Invalid period pattern"));

/// A six-digit period folder name, conventionally `YYYYMM`.
///
/// Ordering is lexicographic, which for fixed-width digits is chronological.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourcePeriod(String);

impl SourcePeriod {
    /// Parse a folder name, returning `None` unless it is exactly six digits.
    pub fn parse(name: &str) -> Option<Self> {
        PERIOD_PATTERN
            .is_match(name)
            .then(|| Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourcePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One period folder and every file found beneath it.
#[derive(Debug)]
pub struct PeriodFolder {
    pub period: SourcePeriod,
    pub path: PathBuf,
    /// Files in discovery order (depth-first, names sorted within a directory).
    pub files: Vec<PathBuf>,
    /// Entries beneath the folder that could not be read.
    pub unreadable: Vec<walkdir::Error>,
}

/// Result of walking one directory.
#[derive(Debug, Default)]
pub struct FileListing {
    pub files: Vec<PathBuf>,
    pub unreadable: Vec<walkdir::Error>,
}

/// Files matched for one group within one period.
#[derive(Debug, Clone)]
pub struct PeriodMatch {
    pub period: SourcePeriod,
    pub files: Vec<PathBuf>,
}

/// Files matched for one group across all periods, ordered by period.
#[derive(Debug, Clone)]
pub struct GroupFiles {
    pub key: GroupKey,
    pub periods: Vec<PeriodMatch>,
}

impl GroupFiles {
    /// Total number of matched files across all periods.
    pub fn file_count(&self) -> usize {
        self.periods.iter().map(|p| p.files.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.file_count() == 0
    }

    /// Iterate `(period, path)` pairs in processing order.
    pub fn iter(&self) -> impl Iterator<Item = (&SourcePeriod, &Path)> {
        self.periods
            .iter()
            .flat_map(|p| p.files.iter().map(move |f| (&p.period, f.as_path())))
    }
}

/// Snapshot of the source tree taken once per run.
#[derive(Debug)]
pub struct SourceIndex {
    root: PathBuf,
    folders: Vec<PeriodFolder>,
}

impl SourceIndex {
    /// Walk the root and every period folder beneath it.
    pub fn scan(root: &Path) -> Result<Self, ResolverError> {
        let root = std::path::absolute(root).context(ListDirectorySnafu { path: root })?;
        let mut folders = Vec::new();

        for (period, path) in list_periods(&root)? {
            let FileListing { files, unreadable } = list_files(&path)?;
            debug!("Period {}: {} files", period, files.len());
            folders.push(PeriodFolder {
                period,
                path,
                files,
                unreadable,
            });
        }

        let index = Self { root, folders };
        emit!(SourceFilesDiscovered {
            count: index.file_count() as u64
        });
        info!(
            "Found {} period folders with {} files under {}",
            index.folders.len(),
            index.file_count(),
            index.root.display()
        );
        Ok(index)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn folders(&self) -> &[PeriodFolder] {
        &self.folders
    }

    /// Total number of files across all period folders.
    pub fn file_count(&self) -> usize {
        self.folders.iter().map(|f| f.files.len()).sum()
    }

    /// Select the files belonging to a group, period by period.
    ///
    /// A period without a match is logged and omitted; it is not an error.
    pub fn resolve(&self, key: &GroupKey) -> GroupFiles {
        let mut periods = Vec::new();

        for folder in &self.folders {
            let files: Vec<PathBuf> = folder
                .files
                .iter()
                .filter(|path| matches_group(path, key))
                .cloned()
                .collect();

            if files.is_empty() {
                info!(
                    "No files for prefix '{}' in folder '{}'",
                    key, folder.period
                );
                continue;
            }

            periods.push(PeriodMatch {
                period: folder.period.clone(),
                files,
            });
        }

        GroupFiles {
            key: key.clone(),
            periods,
        }
    }
}

/// List the period folders directly under `root`, sorted ascending.
pub fn list_periods(root: &Path) -> Result<Vec<(SourcePeriod, PathBuf)>, ResolverError> {
    ensure!(root.is_dir(), RootNotFoundSnafu { path: root });

    let entries = std::fs::read_dir(root).context(ListDirectorySnafu { path: root })?;
    let mut periods = Vec::new();

    for entry in entries {
        let entry = entry.context(ListDirectorySnafu { path: root })?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(period) = entry.file_name().to_str().and_then(SourcePeriod::parse) else {
            continue;
        };
        periods.push((period, path));
    }

    periods.sort();
    Ok(periods)
}

/// List every regular file beneath `dir`, recursively, in a stable order.
///
/// Symbolic links are followed, so a link to a file is listed under the
/// link's own path. Broken links and link cycles count as unreadable.
/// Failing to open `dir` itself is an error; unreadable entries deeper in
/// the tree are logged and returned alongside the files.
pub fn list_files(dir: &Path) -> Result<FileListing, ResolverError> {
    let mut listing = FileListing::default();

    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        match entry {
            Ok(entry) if entry.file_type().is_file() => listing.files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) if e.depth() == 0 => {
                return Err(e).context(WalkDirectorySnafu { path: dir });
            }
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", dir.display(), e);
                listing.unreadable.push(e);
            }
        }
    }

    Ok(listing)
}

/// Whether the base file name of `path` starts with the group key, ignoring case.
pub fn matches_group(path: &Path, key: &GroupKey) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| key.matches(name))
}
