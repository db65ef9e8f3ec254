//! Schema reconciliation across a group's source files.
//!
//! Source files for the same group drift over time: columns appear,
//! disappear and get reordered. Files are merged into one wide table whose
//! columns are the union of everything seen, and the drift is reported as
//! a column mismatch rather than rejected.

pub mod accumulator;
pub mod table;

pub use accumulator::{AppendOutcome, ConsolidatedGroup, GroupAccumulator};
pub use table::{ChunkRow, ColumnRef, GroupTable, PERIOD_COLUMN, TableChunk};
