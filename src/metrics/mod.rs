//! Metrics and observability infrastructure for the consolidator.
//!
//! This module groups all observability-related components:
//! - `events`: Internal event types and the `InternalEvent` trait
//! - `snapshot`: Prometheus recorder and end-of-run snapshot file

pub mod events;
pub mod snapshot;

// Re-export commonly used items
pub use snapshot::{init, write_snapshot};

/// Emit an internal event.
///
/// This macro calls the `InternalEvent::emit()` method on the given event,
/// which records the corresponding Prometheus metric.
///
/// # Example
///
/// ```ignore
/// use consolidator::metrics::events::{BytesWritten, RowsMerged};
///
/// emit!(RowsMerged { count: 100 });
/// emit!(BytesWritten { bytes: 1024 });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}
