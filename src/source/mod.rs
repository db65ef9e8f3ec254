//! Source side of the pipeline: group keys, period folders and file loading.
//!
//! Resolves which files belong to each group and reads them into tables.

pub mod listing;
pub mod prefix;
pub mod reader;

pub use listing::{FileListing, GroupFiles, PeriodFolder, PeriodMatch, SourceIndex, SourcePeriod};
pub use prefix::{GroupKey, read_group_keys};
pub use reader::{Delimiter, LoadedFile, LoadedTable, SourceEncoding, TableReader};
