//! Group keys and the prefix sheet that supplies them.
//!
//! The prefix sheet is any table with a `prefix` column: a spreadsheet
//! workbook (first worksheet, first row as header) or a delimited text
//! file. Each non-blank cell in that column is one group key.

use calamine::{DataType, Reader, open_workbook_auto};
use snafu::prelude::*;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{
    ConfigError, MissingPrefixColumnSnafu, PrefixCsvSnafu, PrefixEmptyWorkbookSnafu,
    PrefixWorkbookSnafu,
};

/// Header of the column holding the group keys.
pub const PREFIX_COLUMN: &str = "prefix";

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// A case-insensitive filename prefix identifying one consolidation group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    raw: String,
    folded: String,
}

impl GroupKey {
    /// Create a key from raw sheet text, returning `None` if it is blank.
    pub fn new(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(Self {
            raw: raw.to_string(),
            folded: raw.to_lowercase(),
        })
    }

    /// The key as written in the prefix sheet.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether `file_name` starts with this key, ignoring case.
    pub fn matches(&self, file_name: &str) -> bool {
        file_name.to_lowercase().starts_with(&self.folded)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Read the group keys from a prefix sheet.
///
/// Blank cells are skipped. Keys repeated (ignoring case) are kept once,
/// in first-seen order.
pub fn read_group_keys(path: &Path) -> Result<Vec<GroupKey>, ConfigError> {
    let cells = if is_workbook(path) {
        read_workbook_column(path)?
    } else {
        read_delimited_column(path)?
    };

    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for (row, cell) in cells.into_iter().enumerate() {
        let Some(key) = GroupKey::new(&cell) else {
            warn!("Skipping blank prefix at data row {}", row + 1);
            continue;
        };
        if !seen.insert(key.folded.clone()) {
            warn!("Skipping duplicate prefix '{}'", key);
            continue;
        }
        keys.push(key);
    }

    info!("Loaded {} group keys from {}", keys.len(), path.display());
    Ok(keys)
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            WORKBOOK_EXTENSIONS
                .iter()
                .any(|w| ext.eq_ignore_ascii_case(w))
        })
}

fn delimiter_for(path: &Path) -> u8 {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("csv") => b',',
        Some("tsv") | Some("txt") => b'\t',
        _ => b'|',
    }
}

fn read_workbook_column(path: &Path) -> Result<Vec<String>, ConfigError> {
    let mut workbook = open_workbook_auto(path).context(PrefixWorkbookSnafu { path })?;
    let range = workbook
        .worksheet_range_at(0)
        .context(PrefixEmptyWorkbookSnafu { path })?
        .context(PrefixWorkbookSnafu { path })?;

    let mut rows = range.rows();
    let header = rows.next().unwrap_or_default();
    let column = header
        .iter()
        .position(|cell| cell_text(cell) == PREFIX_COLUMN)
        .context(MissingPrefixColumnSnafu { path })?;

    Ok(rows
        .map(|row| row.get(column).map(cell_text).unwrap_or_default())
        .collect())
}

fn read_delimited_column(path: &Path) -> Result<Vec<String>, ConfigError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_for(path))
        .flexible(true)
        .from_path(path)
        .context(PrefixCsvSnafu { path })?;

    let column = reader
        .headers()
        .context(PrefixCsvSnafu { path })?
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}') == PREFIX_COLUMN)
        .context(MissingPrefixColumnSnafu { path })?;

    let mut cells = Vec::new();
    for record in reader.records() {
        let record = record.context(PrefixCsvSnafu { path })?;
        cells.push(record.get(column).unwrap_or_default().to_string());
    }
    Ok(cells)
}

/// Render a workbook cell the way it reads in the sheet.
///
/// Whole numbers lose their trailing `.0` so that a numeric prefix such as
/// `1001` matches file names starting with `1001`.
fn cell_text(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.clone(),
        DataType::Int(v) => v.to_string(),
        DataType::Float(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", *v as i64),
        DataType::Float(v) => v.to_string(),
        DataType::Bool(b) => if *b { "True" } else { "False" }.to_string(),
        DataType::DateTime(v) | DataType::Duration(v) => v.to_string(),
        DataType::DateTimeIso(s) | DataType::DurationIso(s) => s.clone(),
        DataType::Error(e) => format!("#{e:?}"),
        DataType::Empty => String::new(),
    }
}
