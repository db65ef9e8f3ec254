//! Dead Letter Queue for failed file tracking.
//!
//! This module provides functionality for recording and tracking failed
//! files and groups during a run. Failures are written as NDJSON to the
//! output directory for later inspection and reprocessing.
//!
//! # Components
//!
//! - [`DeadLetterQueue`] - Buffers failures and writes them at the end of the run
//! - [`FailureTracker`] - Logs, counts and forwards failures to the DLQ

mod queue;
mod tracker;
mod types;

pub use queue::DeadLetterQueue;
pub use tracker::FailureTracker;
pub use types::{FailedFile, FailureStats};
