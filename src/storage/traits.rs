//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::model::CarRecord;
use crate::storage::{CarStatus, RunRecord, RunStatus, StoredCar};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Cars are grouped by the query key of the search that found them, so
/// removals are only ever detected among listings of the same search.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new scrape run in `running` state
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file (empty without one)
    /// * `query` - Query key of the search
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str, query: &str) -> StorageResult<i64>;

    /// Records the final status and counters of a run
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        pages_fetched: u32,
        record_count: usize,
    ) -> StorageResult<()>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    // ===== Car Management =====

    /// Inserts or refreshes a car, marking it active
    ///
    /// # Returns
    ///
    /// `true` when the listing had never been stored before
    fn upsert_car(&mut self, car: &CarRecord, query: &str, run_id: i64) -> StorageResult<bool>;

    /// Marks active cars of `query` that were not seen by `run_id` as removed
    ///
    /// # Returns
    ///
    /// The number of cars newly marked as removed
    fn mark_removed(&mut self, query: &str, run_id: i64) -> StorageResult<u64>;

    /// Gets all stored cars, newest first
    fn all_cars(&self) -> StorageResult<Vec<StoredCar>>;

    /// Counts cars by status
    fn count_cars_by_status(&self, status: CarStatus) -> StorageResult<u64>;

    /// Deletes every car and run
    fn clear(&mut self) -> StorageResult<()>;
}
