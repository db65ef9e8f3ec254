//! consolidator: a library for merging per-period delimited extracts.
//!
//! Source files live in six-digit period folders (`YYYYMM`) under one
//! root. Each group key selects the files whose names start with it; the
//! group's files are merged into one wide table, stamped with their period
//! and written as pipe-delimited parts no larger than a configured size.
//!
//! # Example
//!
//! ```ignore
//! use consolidator::{Config, run_pipeline, error::PipelineError};
//!
//! fn main() -> Result<(), PipelineError> {
//!     let config = Config::new("/data/extracts", "/data/prefixes.xlsx", "/data/out");
//!     let report = run_pipeline(config)?;
//!     println!("Consolidated {} rows", report.stats.rows_consolidated);
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod config;
pub mod dlq;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod schema;
pub mod sink;
pub mod source;

// Re-export main types
pub use config::Config;
pub use pipeline::{Pipeline, PipelineStats, RunReport, run_pipeline};
