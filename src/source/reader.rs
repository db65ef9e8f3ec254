//! Delimited table loader.
//!
//! Reads one source file into a [`LoadedTable`]. The delimiter follows the
//! file extension (tab for `.txt`, pipe otherwise). Content is decoded as
//! UTF-8 and, if that fails, re-decoded as Windows-1252, which accepts
//! every byte sequence.

use encoding_rs::WINDOWS_1252;
use snafu::prelude::*;
use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

use crate::emit;
use crate::error::{
    EmptyFileSnafu, OpenSourceSnafu, ParseTableSnafu, RaggedRowSnafu, ReaderError,
};
use crate::metrics::events::{BytesRead, FileReadCompleted};

/// Extension (compared case-insensitively) of tab-delimited source files.
pub const TAB_DELIMITED_EXTENSION: &str = "txt";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Field delimiter of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Tab,
    Pipe,
}

impl Delimiter {
    /// Pick the delimiter for a path from its extension.
    pub fn for_path(path: &Path) -> Self {
        let is_tab = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(TAB_DELIMITED_EXTENSION));
        if is_tab { Delimiter::Tab } else { Delimiter::Pipe }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Delimiter::Tab => b'\t',
            Delimiter::Pipe => b'|',
        }
    }
}

/// Text encoding a source file was decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    Windows1252,
}

impl SourceEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceEncoding::Utf8 => "utf-8",
            SourceEncoding::Windows1252 => "cp1252",
        }
    }
}

impl fmt::Display for SourceEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed source table: a header and its data rows.
///
/// Every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl LoadedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// A successfully loaded source file.
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub path: PathBuf,
    pub table: LoadedTable,
    /// Size of the file on disk in bytes.
    pub size_bytes: u64,
    pub encoding: SourceEncoding,
}

impl LoadedFile {
    /// The file's base name, for logging and the file log.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Loader for delimited source files.
#[derive(Debug, Clone, Default)]
pub struct TableReader;

impl TableReader {
    pub fn new() -> Self {
        Self
    }

    /// Read and parse one file.
    ///
    /// Fails with [`ReaderError::EmptyFile`] when the file has no data rows.
    pub fn read(&self, path: &Path) -> Result<LoadedFile, ReaderError> {
        let start = Instant::now();
        let bytes = std::fs::read(path).context(OpenSourceSnafu { path })?;
        emit!(BytesRead {
            bytes: bytes.len() as u64
        });

        let (text, encoding) = decode(&bytes);
        if encoding == SourceEncoding::Windows1252 {
            warn!(
                "{} is not valid UTF-8, decoded as {}",
                path.display(),
                encoding
            );
        }

        let table = parse_table(&text, Delimiter::for_path(path), path)?;
        ensure!(!table.rows.is_empty(), EmptyFileSnafu { path });

        emit!(FileReadCompleted {
            duration: start.elapsed()
        });
        debug!(
            "Parsed {} rows x {} columns from {}",
            table.row_count(),
            table.column_count(),
            path.display()
        );

        Ok(LoadedFile {
            path: path.to_path_buf(),
            table,
            size_bytes: bytes.len() as u64,
            encoding,
        })
    }
}

/// Decode raw bytes as UTF-8, falling back to Windows-1252.
pub fn decode(bytes: &[u8]) -> (Cow<'_, str>, SourceEncoding) {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => (Cow::Borrowed(text), SourceEncoding::Utf8),
        Err(_) => {
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            (text, SourceEncoding::Windows1252)
        }
    }
}

/// Parse decoded text into a table.
///
/// Short rows are padded with empty cells; rows longer than the header
/// are rejected. Duplicate header names get `.1`, `.2`, ... suffixes and
/// blank ones become `Unnamed: <index>`.
pub fn parse_table(
    text: &str,
    delimiter: Delimiter,
    path: &Path,
) -> Result<LoadedTable, ReaderError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter.as_byte())
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers().context(ParseTableSnafu { path })?;
    let columns = dedupe_columns(headers.iter());
    let width = columns.len();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context(ParseTableSnafu { path })?;
        ensure!(
            record.len() <= width,
            RaggedRowSnafu {
                path,
                line: record.position().map(|p| p.line()).unwrap_or_default(),
                expected: width,
                found: record.len(),
            }
        );
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(width, String::new());
        rows.push(row);
    }

    Ok(LoadedTable { columns, rows })
}

fn dedupe_columns<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for (index, header) in headers.enumerate() {
        let base = if header.is_empty() {
            format!("Unnamed: {index}")
        } else {
            header.to_string()
        };
        let mut name = base.clone();
        let mut suffix = 1;
        while columns.contains(&name) {
            name = format!("{base}.{suffix}");
            suffix += 1;
        }
        columns.push(name);
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_delimiter_for_path() {
        assert_eq!(Delimiter::for_path(Path::new("a.txt")), Delimiter::Tab);
        assert_eq!(Delimiter::for_path(Path::new("a.TXT")), Delimiter::Tab);
        assert_eq!(Delimiter::for_path(Path::new("a.csv")), Delimiter::Pipe);
        assert_eq!(Delimiter::for_path(Path::new("noext")), Delimiter::Pipe);
    }

    #[test]
    fn test_read_pipe_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("abc_x.csv");
        fs::write(&path, "a|b\n1|2\n3|4\n5|6\n").unwrap();

        let loaded = TableReader::new().read(&path).unwrap();
        assert_eq!(loaded.table.columns, vec!["a", "b"]);
        assert_eq!(loaded.table.row_count(), 3);
        assert_eq!(loaded.table.rows[2], vec!["5", "6"]);
        assert_eq!(loaded.size_bytes, 16);
        assert_eq!(loaded.encoding, SourceEncoding::Utf8);
        assert_eq!(loaded.file_name(), "abc_x.csv");
    }

    #[test]
    fn test_read_tab_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("abc.txt");
        fs::write(&path, "a\tb|c\nx\ty|z\n").unwrap();

        let loaded = TableReader::new().read(&path).unwrap();
        assert_eq!(loaded.table.columns, vec!["a", "b|c"]);
        assert_eq!(loaded.table.rows[0], vec!["x", "y|z"]);
    }

    #[test]
    fn test_windows_1252_fallback() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("legacy.csv");
        // 0xE9 is 'é' in Windows-1252 and invalid as standalone UTF-8.
        fs::write(&path, b"name|city\nRen\xE9|Z\xFCrich\n").unwrap();

        let loaded = TableReader::new().read(&path).unwrap();
        assert_eq!(loaded.encoding, SourceEncoding::Windows1252);
        assert_eq!(loaded.table.rows[0], vec!["René", "Zürich"]);
    }

    #[test]
    fn test_utf8_bom_stripped() {
        let (text, encoding) = decode(b"\xEF\xBB\xBFa|b\n");
        assert_eq!(encoding, SourceEncoding::Utf8);
        assert_eq!(text, "a|b\n");
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty.csv");
        fs::write(&path, "a|b\n").unwrap();

        let err = TableReader::new().read(&path).unwrap_err();
        assert!(err.is_empty_file());
    }

    #[test]
    fn test_zero_byte_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("zero.csv");
        fs::write(&path, "").unwrap();

        let err = TableReader::new().read(&path).unwrap_err();
        assert!(err.is_empty_file());
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let temp = TempDir::new().unwrap();
        let err = TableReader::new()
            .read(&temp.path().join("absent.csv"))
            .unwrap_err();
        assert!(matches!(err, ReaderError::OpenSource { .. }));
        assert!(!err.is_empty_file());
    }

    #[test]
    fn test_short_rows_padded_long_rows_rejected() {
        let path = Path::new("t.csv");
        let table = parse_table("a|b|c\n1|2\n", Delimiter::Pipe, path).unwrap();
        assert_eq!(table.rows[0], vec!["1", "2", ""]);

        let err = parse_table("a|b\n1|2\n1|2|3\n", Delimiter::Pipe, path).unwrap_err();
        match err {
            ReaderError::RaggedRow {
                line,
                expected,
                found,
                ..
            } => {
                assert_eq!(line, 3);
                assert_eq!(expected, 2);
                assert_eq!(found, 3);
            }
            other => panic!("Expected RaggedRow, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_and_blank_headers() {
        let table = parse_table("id|id||id\n1|2|3|4\n", Delimiter::Pipe, Path::new("t")).unwrap();
        assert_eq!(table.columns, vec!["id", "id.1", "Unnamed: 2", "id.2"]);
    }

    #[test]
    fn test_quoted_fields() {
        let table = parse_table(
            "a|b\n\"x|y\"|\"line\nbreak\"\n",
            Delimiter::Pipe,
            Path::new("t"),
        )
        .unwrap();
        assert_eq!(table.rows[0], vec!["x|y", "line\nbreak"]);
    }
}
