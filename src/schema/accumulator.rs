//! Per-group accumulation of loaded files.
//!
//! [`GroupAccumulator`] owns the running [`GroupTable`] for one group and
//! remembers every distinct column tuple it has seen. Appends are an outer
//! union by column name that preserves row order.

use indexmap::IndexSet;
use tracing::{debug, warn};

use super::table::GroupTable;
use crate::emit;
use crate::metrics::events::{ColumnMismatchDetected, RowsMerged};
use crate::source::{GroupKey, LoadedTable, SourcePeriod};

/// Result of appending one file to the accumulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Rows added to the group table.
    pub rows: usize,
    /// Columns the group table gained from this file.
    pub new_columns: Vec<String>,
    /// Whether this file's column tuple had not been seen before.
    pub new_column_set: bool,
}

/// Running state of one group while its files are loaded.
#[derive(Debug)]
pub struct GroupAccumulator {
    key: GroupKey,
    table: GroupTable,
    column_sets: IndexSet<Vec<String>>,
    files_loaded: usize,
}

impl GroupAccumulator {
    pub fn new(key: GroupKey) -> Self {
        Self {
            key,
            table: GroupTable::new(),
            column_sets: IndexSet::new(),
            files_loaded: 0,
        }
    }

    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    /// Merge one loaded file into the group table.
    ///
    /// The file's column tuple is recorded as read, before the period stamp.
    pub fn append(&mut self, period: &SourcePeriod, table: LoadedTable) -> AppendOutcome {
        let rows = table.row_count();
        let new_columns: Vec<String> = self
            .table
            .unseen_columns(&table.columns)
            .into_iter()
            .map(str::to_string)
            .collect();

        let was_mismatched = self.column_mismatch();
        let new_column_set = self.column_sets.insert(table.columns.clone());

        if !self.table.is_empty() && !new_columns.is_empty() {
            debug!(
                "Group '{}' gained columns {:?} from period {}",
                self.key, new_columns, period
            );
        }
        if !was_mismatched && self.column_mismatch() {
            warn!(
                "Column mismatch for prefix '{}': {} distinct column sets",
                self.key,
                self.column_sets.len()
            );
            emit!(ColumnMismatchDetected);
        }

        self.table.push(period, table);
        self.files_loaded += 1;
        emit!(RowsMerged { count: rows as u64 });

        AppendOutcome {
            rows,
            new_columns,
            new_column_set,
        }
    }

    /// True once more than one distinct column tuple has been observed.
    pub fn column_mismatch(&self) -> bool {
        self.column_sets.len() > 1
    }

    pub fn files_loaded(&self) -> usize {
        self.files_loaded
    }

    pub fn table(&self) -> &GroupTable {
        &self.table
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Consume the accumulator into the group's final table.
    pub fn finish(self) -> ConsolidatedGroup {
        ConsolidatedGroup {
            column_mismatch: self.column_mismatch(),
            distinct_column_sets: self.column_sets.len(),
            key: self.key,
            table: self.table,
            files_loaded: self.files_loaded,
        }
    }
}

/// A group's merged table and what was learned while building it.
#[derive(Debug)]
pub struct ConsolidatedGroup {
    pub key: GroupKey,
    pub table: GroupTable,
    pub files_loaded: usize,
    pub column_mismatch: bool,
    pub distinct_column_sets: usize,
}
