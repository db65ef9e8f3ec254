//! Size-bounded part writer.
//!
//! Serializes a group table chunk by chunk into pipe-delimited parts.
//! Chunks are never split: when appending the next chunk would push a part
//! past the size limit, the part is closed and the chunk starts a new one.
//! Every part begins with the header row.

use snafu::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

use super::{FinishedPart, OutputBase};
use crate::config::{DEFAULT_CHUNK_ROWS, MAX_PART_SIZE_BYTES, SinkConfig};
use crate::emit;
use crate::error::{
    CreatePartSnafu, FinishChunkSnafu, SerializeChunkSnafu, WritePartSnafu, WriterError,
};
use crate::metrics::events::{BytesWritten, GroupWriteCompleted, PartRolled, PartWritten};
use crate::schema::{ColumnRef, GroupTable, PERIOD_COLUMN, TableChunk};

/// Output field delimiter.
pub const OUTPUT_DELIMITER: u8 = b'|';

/// Configuration for the part writer.
#[derive(Debug, Clone)]
pub struct PartWriterConfig {
    /// Size limit of one part in bytes, header included.
    pub max_part_size: u64,
    /// Rows per chunk.
    pub chunk_rows: usize,
    /// Text written for missing cells.
    pub placeholder: String,
}

impl Default for PartWriterConfig {
    fn default() -> Self {
        Self {
            max_part_size: MAX_PART_SIZE_BYTES,
            chunk_rows: DEFAULT_CHUNK_ROWS,
            placeholder: String::new(),
        }
    }
}

impl From<&SinkConfig> for PartWriterConfig {
    fn from(config: &SinkConfig) -> Self {
        Self {
            max_part_size: config.max_part_size_bytes,
            chunk_rows: config.chunk_rows,
            placeholder: config.placeholder.clone(),
        }
    }
}

impl PartWriterConfig {
    /// Set the part size limit in bytes.
    pub fn with_max_part_size(mut self, bytes: u64) -> Self {
        self.max_part_size = bytes;
        self
    }

    /// Set the rows per chunk.
    pub fn with_chunk_rows(mut self, rows: usize) -> Self {
        self.chunk_rows = rows;
        self
    }

    /// Set the missing-cell placeholder.
    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }
}

/// The part currently receiving chunks.
struct OpenPart {
    number: usize,
    path: PathBuf,
    writer: BufWriter<File>,
    size: u64,
    rows: usize,
}

/// Writes chunks into numbered parts, rolling on the size limit.
pub struct PartWriter {
    base: OutputBase,
    config: PartWriterConfig,
    expected_columns: Vec<String>,
    header: Vec<u8>,
    part_number: usize,
    current: Option<OpenPart>,
    finished_parts: Vec<FinishedPart>,
}

impl PartWriter {
    /// Create a writer for the given column order.
    ///
    /// `period` is moved to the end of the column list (and added if absent).
    /// No file is created until the first non-empty chunk arrives.
    pub fn new(
        base: OutputBase,
        columns: impl IntoIterator<Item = impl Into<String>>,
        config: PartWriterConfig,
    ) -> Result<Self, WriterError> {
        let mut expected_columns: Vec<String> = columns
            .into_iter()
            .map(Into::into)
            .filter(|name| name != PERIOD_COLUMN)
            .collect();
        expected_columns.push(PERIOD_COLUMN.to_string());

        let header = serialize_records(std::iter::once(
            expected_columns.iter().map(String::as_str).collect::<Vec<_>>(),
        ))?;

        Ok(Self {
            base,
            config,
            expected_columns,
            header,
            part_number: 0,
            current: None,
            finished_parts: Vec::new(),
        })
    }

    /// Create a writer using the table's own column order.
    pub fn for_table(
        table: &GroupTable,
        base: OutputBase,
        config: PartWriterConfig,
    ) -> Result<Self, WriterError> {
        Self::new(base, table.columns(), config)
    }

    pub fn expected_columns(&self) -> &[String] {
        &self.expected_columns
    }

    /// Bytes in the part currently open, header included.
    pub fn current_part_size(&self) -> u64 {
        self.current.as_ref().map(|p| p.size).unwrap_or(0)
    }

    /// Serialize one chunk and append it, rolling to a new part if needed.
    pub fn append_chunk(&mut self, chunk: &TableChunk<'_>) -> Result<(), WriterError> {
        if chunk.is_empty() {
            return Ok(());
        }

        let projection: Vec<Option<ColumnRef>> = self
            .expected_columns
            .iter()
            .map(|name| {
                let column = chunk.resolve(name);
                if column.is_none() {
                    debug!("Column '{}' absent from chunk, padding with placeholder", name);
                }
                column
            })
            .collect();

        let placeholder = self.config.placeholder.as_str();
        let body = serialize_records(chunk.rows().map(|row| {
            projection
                .iter()
                .map(|column| column.and_then(|c| row.value(c)).unwrap_or(placeholder))
                .collect::<Vec<_>>()
        }))?;

        if let Some(part) = &self.current
            && part.rows > 0
            && part.size + body.len() as u64 > self.config.max_part_size
        {
            debug!(
                "Rolling {}: {} + {} bytes exceeds limit of {}",
                part.path.display(),
                part.size,
                body.len(),
                self.config.max_part_size
            );
            self.close_part()?;
            emit!(PartRolled);
        }

        let mut part = match self.current.take() {
            Some(part) => part,
            None => self.open_part()?,
        };

        part.writer
            .write_all(&body)
            .context(WritePartSnafu { path: &part.path })?;
        part.size += body.len() as u64;
        part.rows += chunk.len();
        emit!(BytesWritten {
            bytes: body.len() as u64
        });

        self.current = Some(part);
        Ok(())
    }

    /// Close the open part and return every part written.
    pub fn finish(mut self) -> Result<Vec<FinishedPart>, WriterError> {
        self.close_part()?;
        Ok(self.finished_parts)
    }

    fn open_part(&mut self) -> Result<OpenPart, WriterError> {
        self.part_number += 1;
        let path = self.base.part_path(self.part_number);
        let file = File::create(&path).context(CreatePartSnafu { path: &path })?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(&self.header)
            .context(WritePartSnafu { path: &path })?;
        emit!(BytesWritten {
            bytes: self.header.len() as u64
        });

        debug!("Opened part {}", path.display());
        Ok(OpenPart {
            number: self.part_number,
            path,
            writer,
            size: self.header.len() as u64,
            rows: 0,
        })
    }

    fn close_part(&mut self) -> Result<(), WriterError> {
        let Some(mut part) = self.current.take() else {
            return Ok(());
        };
        part.writer
            .flush()
            .context(WritePartSnafu { path: &part.path })?;

        info!(
            "Wrote {} ({} rows, {:.2} MB)",
            part.path.display(),
            part.rows,
            part.size as f64 / 1024.0 / 1024.0
        );
        emit!(PartWritten {
            bytes: part.size,
            rows: part.rows as u64
        });

        self.finished_parts.push(FinishedPart {
            path: part.path,
            part_number: part.number,
            size: part.size,
            row_count: part.rows,
        });
        Ok(())
    }
}

/// Write a whole group table as size-bounded parts.
///
/// An empty table produces no parts and no files.
pub fn write_table(
    table: &GroupTable,
    base: OutputBase,
    config: PartWriterConfig,
) -> Result<Vec<FinishedPart>, WriterError> {
    let start = Instant::now();
    let chunk_rows = config.chunk_rows;
    let mut writer = PartWriter::for_table(table, base, config)?;
    for chunk in table.chunks(chunk_rows) {
        writer.append_chunk(&chunk)?;
    }
    let parts = writer.finish()?;
    emit!(GroupWriteCompleted {
        duration: start.elapsed()
    });
    Ok(parts)
}

/// Serialize records as pipe-delimited lines with `\n` terminators.
fn serialize_records<'a, I, R>(records: I) -> Result<Vec<u8>, WriterError>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = &'a str>,
{
    let mut writer = csv::WriterBuilder::new()
        .delimiter(OUTPUT_DELIMITER)
        .terminator(csv::Terminator::Any(b'\n'))
        .quote_style(csv::QuoteStyle::Necessary)
        .has_headers(false)
        .from_writer(Vec::new());
    for record in records {
        writer.write_record(record).context(SerializeChunkSnafu)?;
    }
    writer
        .into_inner()
        .map_err(|e| e.into_error())
        .context(FinishChunkSnafu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{LoadedTable, SourcePeriod};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// 30 rows of `n|period` with two-digit `n`; every data line is 10 bytes.
    fn numbers_table(count: usize) -> GroupTable {
        let mut table = GroupTable::new();
        table.push(
            &SourcePeriod::parse("202401").unwrap(),
            LoadedTable {
                columns: vec!["n".to_string()],
                rows: (10..10 + count).map(|i| vec![i.to_string()]).collect(),
            },
        );
        table
    }

    fn base(dir: &Path) -> OutputBase {
        OutputBase::for_group(dir, "abc", "20240101_000000", "csv")
    }

    const HEADER: &str = "n|period\n";

    #[test]
    fn test_single_part_when_under_limit() {
        let temp = TempDir::new().unwrap();
        let table = numbers_table(30);
        let config = PartWriterConfig::default().with_chunk_rows(10);

        let parts = write_table(&table, base(temp.path()), config).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].row_count, 30);
        assert_eq!(parts[0].size, (HEADER.len() + 300) as u64);

        let content = fs::read_to_string(&parts[0].path).unwrap();
        assert!(content.starts_with(HEADER));
        assert_eq!(content.lines().nth(1), Some("10|202401"));
    }

    #[test]
    fn test_rolls_on_chunk_boundary() {
        let temp = TempDir::new().unwrap();
        let table = numbers_table(30);
        let max = (HEADER.len() + 200) as u64;
        let config = PartWriterConfig::default()
            .with_chunk_rows(10)
            .with_max_part_size(max);

        let parts = write_table(&table, base(temp.path()), config).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].row_count, 20);
        assert_eq!(parts[0].size, max);
        assert_eq!(parts[1].row_count, 10);
        assert_eq!(parts[1].part_number, 2);
        assert!(parts[1].path.ends_with("consolidated_abc_20240101_000000_part2.csv"));

        let second = fs::read_to_string(&parts[1].path).unwrap();
        assert!(second.starts_with(HEADER));
        assert_eq!(second.lines().nth(1), Some("30|202401"));

        for part in &parts {
            assert!(part.size <= max);
            assert_eq!(fs::metadata(&part.path).unwrap().len(), part.size);
        }
    }

    #[test]
    fn test_default_chunk_size_split() {
        let temp = TempDir::new().unwrap();
        let mut table = GroupTable::new();
        // Six-digit values: every data line is 14 bytes.
        table.push(
            &SourcePeriod::parse("202401").unwrap(),
            LoadedTable {
                columns: vec!["n".to_string()],
                rows: (100_000..125_000).map(|i: usize| vec![i.to_string()]).collect(),
            },
        );
        let chunk_bytes = (DEFAULT_CHUNK_ROWS * 14) as u64;
        let max = HEADER.len() as u64 + 2 * chunk_bytes + 13;
        let config = PartWriterConfig::default().with_max_part_size(max);
        assert_eq!(config.chunk_rows, 10_000);

        let parts = write_table(&table, base(temp.path()), config).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].row_count, 2 * DEFAULT_CHUNK_ROWS);
        assert_eq!(parts[0].size, HEADER.len() as u64 + 2 * chunk_bytes);
        assert_eq!(parts[1].row_count, 5_000);

        let second = fs::read_to_string(&parts[1].path).unwrap();
        assert_eq!(second.lines().nth(1), Some("120000|202401"));
    }

    #[test]
    fn test_oversized_chunk_gets_own_part() {
        let temp = TempDir::new().unwrap();
        let table = numbers_table(30);
        let config = PartWriterConfig::default()
            .with_chunk_rows(10)
            .with_max_part_size(50);

        let parts = write_table(&table, base(temp.path()), config).unwrap();
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.row_count == 10));
    }

    #[test]
    fn test_header_only_in_first_line_and_rows_not_split() {
        let temp = TempDir::new().unwrap();
        let table = numbers_table(45);
        let config = PartWriterConfig::default()
            .with_chunk_rows(7)
            .with_max_part_size(100);

        let parts = write_table(&table, base(temp.path()), config).unwrap();
        let mut seen = Vec::new();
        for part in &parts {
            let content = fs::read_to_string(&part.path).unwrap();
            let lines: Vec<&str> = content.lines().collect();
            assert_eq!(lines[0], "n|period");
            assert_eq!(lines.iter().filter(|l| **l == "n|period").count(), 1);
            assert!(content.ends_with('\n'));
            seen.extend(lines[1..].iter().map(|l| l.to_string()));
        }
        let expected: Vec<String> = (10..55).map(|i| format!("{i}|202401")).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_missing_columns_padded_with_placeholder() {
        let temp = TempDir::new().unwrap();
        let table = numbers_table(2);
        let config = PartWriterConfig::default().with_placeholder("NA");

        let mut writer = PartWriter::new(base(temp.path()), ["period", "n", "z"], config).unwrap();
        assert_eq!(writer.expected_columns(), ["n", "z", "period"]);
        for chunk in table.chunks(10) {
            writer.append_chunk(&chunk).unwrap();
        }
        let parts = writer.finish().unwrap();

        let content = fs::read_to_string(&parts[0].path).unwrap();
        assert_eq!(content, "n|z|period\n10|NA|202401\n11|NA|202401\n");
    }

    #[test]
    fn test_empty_table_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let parts = write_table(
            &GroupTable::new(),
            base(temp.path()),
            PartWriterConfig::default(),
        )
        .unwrap();

        assert!(parts.is_empty());
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_fields_with_delimiter_are_quoted() {
        let temp = TempDir::new().unwrap();
        let mut table = GroupTable::new();
        table.push(
            &SourcePeriod::parse("202401").unwrap(),
            LoadedTable {
                columns: vec!["a".to_string()],
                rows: vec![vec!["x|y".to_string()]],
            },
        );

        let parts = write_table(&table, base(temp.path()), PartWriterConfig::default()).unwrap();
        let content = fs::read_to_string(&parts[0].path).unwrap();
        assert_eq!(content, "a|period\n\"x|y\"|202401\n");
    }
}
