//! Storage module for persisting listings across runs
//!
//! This module handles all database operations behind `--use-db`, including:
//! - SQLite database initialization and schema management
//! - Run tracking with the configuration hash and final status
//! - Car upserts keyed by listing URL and removal detection

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{listing_id, SqliteStorage};
pub use traits::{Storage, StorageError, StorageResult};

use crate::model::CarRecord;
use crate::StopReason;
use serde::Serialize;

/// Represents a scrape run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub query: String,
    pub status: RunStatus,
    pub pages_fetched: u32,
    pub record_count: u64,
}

impl RunRecord {
    /// One-line description for logs
    pub fn summary(&self) -> String {
        format!(
            "run #{} [{}] {}: {} records from {} pages, started {}",
            self.id,
            self.status.to_db_string(),
            self.query,
            self.record_count,
            self.pages_fetched,
            self.started_at
        )
    }
}

/// Status of a scrape run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    /// Pagination ended normally (cap reached or results exhausted)
    Completed,
    /// A page after the first failed
    Partial,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "partial" => Some(Self::Partial),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Final status for a run that returned results
    pub fn from_stop_reason(reason: &StopReason) -> Self {
        match reason {
            StopReason::PageCap | StopReason::Exhausted => Self::Completed,
            StopReason::PageFailed { .. } => Self::Partial,
            StopReason::Cancelled => Self::Cancelled,
        }
    }
}

/// Lifecycle of a stored car
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CarStatus {
    Active,
    Removed,
}

impl CarStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Removed => "removed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "removed" => Some(Self::Removed),
            _ => None,
        }
    }
}

/// A car as stored, with its tracking metadata
#[derive(Debug, Clone, Serialize)]
pub struct StoredCar {
    #[serde(flatten)]
    pub car: CarRecord,
    pub status: CarStatus,
    pub first_seen: String,
    pub last_seen: String,
    pub removed_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_summary() {
        let run = RunRecord {
            id: 7,
            started_at: "2024-05-01T10:00:00+00:00".to_string(),
            finished_at: None,
            config_hash: String::new(),
            query: "brand=bmw;model=x5".to_string(),
            status: RunStatus::Partial,
            pages_fetched: 2,
            record_count: 37,
        };
        assert_eq!(
            run.summary(),
            "run #7 [partial] brand=bmw;model=x5: 37 records from 2 pages, started 2024-05-01T10:00:00+00:00"
        );
    }

    #[test]
    fn test_run_status_roundtrip() {
        for status in &[
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Partial,
            RunStatus::Failed,
            RunStatus::Cancelled,
        ] {
            let parsed = RunStatus::from_db_string(status.to_db_string());
            assert_eq!(Some(*status), parsed);
        }
        assert_eq!(RunStatus::from_db_string("interrupted"), None);
    }

    #[test]
    fn test_run_status_from_stop_reason() {
        assert_eq!(
            RunStatus::from_stop_reason(&StopReason::PageCap),
            RunStatus::Completed
        );
        assert_eq!(
            RunStatus::from_stop_reason(&StopReason::PageFailed {
                page: 3,
                reason: "HTTP 500".to_string()
            }),
            RunStatus::Partial
        );
        assert_eq!(
            RunStatus::from_stop_reason(&StopReason::Cancelled),
            RunStatus::Cancelled
        );
    }

    #[test]
    fn test_stored_car_serializes_flat() {
        let stored = StoredCar {
            car: CarRecord::new("BMW X5", "https://example.com/x5"),
            status: CarStatus::Removed,
            first_seen: "2024-01-01T00:00:00+00:00".to_string(),
            last_seen: "2024-01-02T00:00:00+00:00".to_string(),
            removed_at: Some("2024-01-03T00:00:00+00:00".to_string()),
        };
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["url"], "https://example.com/x5");
        assert_eq!(json["status"], "removed");
        assert!(json["price"].is_null());
    }
}
