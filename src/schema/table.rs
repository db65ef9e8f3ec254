//! The wide, in-memory table for one group.
//!
//! Data columns are kept in first-seen order and the `period` column is
//! always logically last. Rows store only the cells that existed when they
//! were appended; a row shorter than the current column list reads the
//! missing tail as absent, so widening the table never touches prior rows.

use indexmap::IndexSet;

use crate::source::{LoadedTable, SourcePeriod};

/// Name of the column stamped on every row with its source period.
pub const PERIOD_COLUMN: &str = "period";

/// A resolved reference to one column of a [`GroupTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRef {
    /// A data column, by position in the table's data columns.
    Data(usize),
    /// The synthetic `period` column.
    Period,
}

#[derive(Debug, Clone)]
struct TableRow {
    period: usize,
    cells: Vec<Option<String>>,
}

/// Union of all rows loaded for one group.
#[derive(Debug, Clone, Default)]
pub struct GroupTable {
    columns: IndexSet<String>,
    periods: Vec<SourcePeriod>,
    rows: Vec<TableRow>,
}

impl GroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of columns including `period`.
    pub fn column_count(&self) -> usize {
        self.columns.len() + 1
    }

    /// All column names: data columns in first-seen order, then `period`.
    pub fn columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(PERIOD_COLUMN))
            .collect()
    }

    /// Resolve a column name.
    pub fn resolve(&self, name: &str) -> Option<ColumnRef> {
        if name == PERIOD_COLUMN {
            return Some(ColumnRef::Period);
        }
        self.columns.get_index_of(name).map(ColumnRef::Data)
    }

    /// Value of one cell, or `None` if the row's source file lacked the column.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let row = self.rows.get(row)?;
        self.value(row, self.resolve(column)?)
    }

    /// Distinct periods that contributed rows, sorted ascending.
    pub fn periods_covered(&self) -> Vec<&SourcePeriod> {
        let mut periods: Vec<&SourcePeriod> = self.periods.iter().collect();
        periods.sort();
        periods.dedup();
        periods
    }

    /// Names in `columns` that this table does not have yet.
    pub fn unseen_columns<'a>(&self, columns: &'a [String]) -> Vec<&'a str> {
        columns
            .iter()
            .map(String::as_str)
            .filter(|name| *name != PERIOD_COLUMN && !self.columns.contains(*name))
            .collect()
    }

    /// Append a loaded table, stamping each row with `period`.
    ///
    /// Columns are matched by name; unseen columns are added after the
    /// existing ones. A source column named `period` is replaced by the stamp.
    pub(crate) fn push(&mut self, period: &SourcePeriod, table: LoadedTable) {
        let mapping: Vec<Option<usize>> = table
            .columns
            .into_iter()
            .map(|name| (name != PERIOD_COLUMN).then(|| self.columns.insert_full(name).0))
            .collect();

        if table.rows.is_empty() {
            return;
        }

        let period_index = match self.periods.iter().position(|p| p == period) {
            Some(index) => index,
            None => {
                self.periods.push(period.clone());
                self.periods.len() - 1
            }
        };

        let width = self.columns.len();
        self.rows.reserve(table.rows.len());
        for row in table.rows {
            let mut cells = vec![None; width];
            for (value, slot) in row.into_iter().zip(&mapping) {
                if let Some(index) = slot {
                    cells[*index] = Some(value);
                }
            }
            self.rows.push(TableRow {
                period: period_index,
                cells,
            });
        }
    }

    /// Split the table into consecutive chunks of at most `rows` rows.
    pub fn chunks(&self, rows: usize) -> impl Iterator<Item = TableChunk<'_>> {
        let rows = rows.max(1);
        self.rows
            .chunks(rows)
            .enumerate()
            .map(move |(i, slice)| TableChunk {
                table: self,
                start: i * rows,
                rows: slice,
            })
    }

    fn value<'a>(&'a self, row: &'a TableRow, column: ColumnRef) -> Option<&'a str> {
        match column {
            ColumnRef::Period => Some(self.periods[row.period].as_str()),
            ColumnRef::Data(index) => row.cells.get(index).and_then(|c| c.as_deref()),
        }
    }
}

/// A contiguous row range of a [`GroupTable`].
#[derive(Debug, Clone, Copy)]
pub struct TableChunk<'a> {
    table: &'a GroupTable,
    start: usize,
    rows: &'a [TableRow],
}

impl<'a> TableChunk<'a> {
    /// Index of the chunk's first row within the table.
    pub fn start_row(&self) -> usize {
        self.start
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Resolve a column name against the chunk's table.
    pub fn resolve(&self, name: &str) -> Option<ColumnRef> {
        self.table.resolve(name)
    }

    /// Iterate rows as value lookups.
    pub fn rows(&self) -> impl Iterator<Item = ChunkRow<'a>> + use<'a> {
        let table = self.table;
        let rows: &'a [TableRow] = self.rows;
        rows.iter().map(move |row| ChunkRow { table, row })
    }
}

/// One row of a [`TableChunk`].
#[derive(Debug, Clone, Copy)]
pub struct ChunkRow<'a> {
    table: &'a GroupTable,
    row: &'a TableRow,
}

impl<'a> ChunkRow<'a> {
    /// Value of a resolved column, `None` when the source file lacked it.
    pub fn value(&self, column: ColumnRef) -> Option<&'a str> {
        self.table.value(self.row, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(name: &str) -> SourcePeriod {
        SourcePeriod::parse(name).unwrap()
    }

    fn table(columns: &[&str], rows: &[&[&str]]) -> LoadedTable {
        LoadedTable {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|v| v.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_period_is_always_last() {
        let mut t = GroupTable::new();
        t.push(&period("202401"), table(&["a", "b"], &[&["1", "2"]]));
        t.push(&period("202402"), table(&["c", "a"], &[&["3", "4"]]));

        assert_eq!(t.columns(), vec!["a", "b", "c", "period"]);
        assert_eq!(t.column_count(), 4);
    }

    #[test]
    fn test_union_leaves_prior_rows_missing() {
        let mut t = GroupTable::new();
        t.push(&period("202401"), table(&["a", "b"], &[&["1", "2"]]));
        t.push(&period("202402"), table(&["a", "c"], &[&["3", "4"]]));

        assert_eq!(t.cell(0, "a"), Some("1"));
        assert_eq!(t.cell(0, "c"), None);
        assert_eq!(t.cell(1, "b"), None);
        assert_eq!(t.cell(1, "c"), Some("4"));
        assert_eq!(t.cell(1, "period"), Some("202402"));
        assert_eq!(t.cell(2, "a"), None);
    }

    #[test]
    fn test_source_period_column_overwritten() {
        let mut t = GroupTable::new();
        t.push(
            &period("202401"),
            table(&["period", "a"], &[&["1999-01", "x"]]),
        );
        assert_eq!(t.columns(), vec!["a", "period"]);
        assert_eq!(t.cell(0, "period"), Some("202401"));
    }

    #[test]
    fn test_periods_covered_sorted_unique() {
        let mut t = GroupTable::new();
        t.push(&period("202403"), table(&["a"], &[&["1"]]));
        t.push(&period("202401"), table(&["a"], &[&["2"]]));
        t.push(&period("202403"), table(&["a"], &[&["3"]]));
        t.push(&period("202402"), table(&["a"], &[]));

        let covered: Vec<&str> = t.periods_covered().iter().map(|p| p.as_str()).collect();
        assert_eq!(covered, vec!["202401", "202403"]);
    }

    #[test]
    fn test_chunks_cover_table_in_order() {
        let mut t = GroupTable::new();
        let rows: Vec<Vec<String>> = (0..25).map(|i| vec![i.to_string()]).collect();
        t.push(
            &period("202401"),
            LoadedTable {
                columns: vec!["n".to_string()],
                rows,
            },
        );

        let chunks: Vec<TableChunk<'_>> = t.chunks(10).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| c.len()).collect::<Vec<_>>(),
            vec![10, 10, 5]
        );
        assert_eq!(chunks[2].start_row(), 20);

        let n = chunks[2].resolve("n").unwrap();
        let first = chunks[2].rows().next().unwrap();
        assert_eq!(first.value(n), Some("20"));
    }

    #[test]
    fn test_unseen_columns() {
        let mut t = GroupTable::new();
        t.push(&period("202401"), table(&["a", "b"], &[&["1", "2"]]));
        let incoming = vec!["a".to_string(), "c".to_string(), "period".to_string()];
        assert_eq!(t.unseen_columns(&incoming), vec!["c"]);
    }
}
