//! DLQ types for failure tracking.
//!
//! Contains the data structures for representing failed files and
//! aggregating failure statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::events::FailureStage;

/// A record representing a failed file or group in the DLQ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedFile {
    /// Path to the file (or output part) that failed.
    pub path: String,
    /// Group key being processed, absent for failures during discovery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Error message describing the failure.
    pub error: String,
    /// Stage at which the failure occurred.
    pub stage: FailureStage,
    /// Timestamp when the failure was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Statistics about failures by stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureStats {
    pub list: usize,
    pub read: usize,
    pub empty: usize,
    pub write: usize,
}

impl FailureStats {
    /// Increment the count for a specific stage.
    pub fn increment(&mut self, stage: FailureStage) {
        match stage {
            FailureStage::List => self.list += 1,
            FailureStage::Read => self.read += 1,
            FailureStage::Empty => self.empty += 1,
            FailureStage::Write => self.write += 1,
        }
    }

    /// Get total failure count.
    pub fn total(&self) -> usize {
        self.list + self.read + self.empty + self.write
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_stats_increment() {
        let mut stats = FailureStats::default();
        stats.increment(FailureStage::Read);
        stats.increment(FailureStage::Read);
        stats.increment(FailureStage::Empty);

        assert_eq!(stats.read, 2);
        assert_eq!(stats.empty, 1);
        assert_eq!(stats.total(), 3);
    }

    #[test]
    fn test_failed_file_serialization() {
        let failed = FailedFile {
            path: "/data/202401/abc_x.csv".to_string(),
            group: Some("abc".to_string()),
            error: "File is empty".to_string(),
            stage: FailureStage::Empty,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&failed).unwrap();
        assert!(json.contains(r#""stage":"empty""#));
        assert!(json.contains("/data/202401/abc_x.csv"));
    }

    #[test]
    fn test_failed_file_deserialization() {
        let json = r#"{"path":"/out/consolidated_abc_part1.csv","group":"abc","error":"disk full","stage":"write","timestamp":"2025-01-26T10:30:00Z"}"#;
        let failed: FailedFile = serde_json::from_str(json).unwrap();

        assert_eq!(failed.group.as_deref(), Some("abc"));
        assert_eq!(failed.error, "disk full");
        assert_eq!(failed.stage, FailureStage::Write);
    }
}
