//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::model::CarRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageResult};
use crate::storage::{CarStatus, RunRecord, RunStatus, StoredCar};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Stable identifier of a listing: hex SHA-256 of its URL
pub fn listing_id(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file; missing parent
    ///   directories are created
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Stores a batch of cars from one run in a single transaction
    ///
    /// # Returns
    ///
    /// The number of cars that were new to the store
    pub fn upsert_cars(
        &mut self,
        cars: &[CarRecord],
        query: &str,
        run_id: i64,
    ) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut new_cars = 0;
        for car in cars {
            if upsert_car_in(&tx, car, query, run_id)? {
                new_cars += 1;
            }
        }
        tx.commit()?;
        Ok(new_cars)
    }
}

fn upsert_car_in(
    conn: &Connection,
    car: &CarRecord,
    query: &str,
    run_id: i64,
) -> StorageResult<bool> {
    let id = listing_id(&car.url);
    let data = serde_json::to_string(car)?;
    let now = Utc::now().to_rfc3339();

    let existed: bool = conn
        .query_row("SELECT 1 FROM cars WHERE id = ?1", params![id], |_| Ok(()))
        .optional()?
        .is_some();

    conn.execute(
        "INSERT INTO cars (id, link, query, data, status, first_seen, last_seen, removed_at, last_run)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, NULL, ?7)
         ON CONFLICT(id) DO UPDATE SET
             query = excluded.query,
             data = excluded.data,
             status = excluded.status,
             last_seen = excluded.last_seen,
             removed_at = NULL,
             last_run = excluded.last_run",
        params![
            id,
            car.url,
            query,
            data,
            CarStatus::Active.to_db_string(),
            now,
            run_id
        ],
    )?;

    Ok(!existed)
}

fn run_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        query: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunStatus::Running),
        pages_fetched: row.get(6)?,
        record_count: row.get::<_, i64>(7)? as u64,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str, query: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, query, status) VALUES (?1, ?2, ?3, ?4)",
            params![now, config_hash, query, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        pages_fetched: u32,
        record_count: usize,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, pages_fetched = ?3, record_count = ?4
             WHERE id = ?5",
            params![
                status.to_db_string(),
                now,
                pages_fetched,
                record_count as i64,
                run_id
            ],
        )?;
        Ok(())
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, query, status, pages_fetched, record_count
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    // ===== Car Management =====

    fn upsert_car(&mut self, car: &CarRecord, query: &str, run_id: i64) -> StorageResult<bool> {
        upsert_car_in(&self.conn, car, query, run_id)
    }

    fn mark_removed(&mut self, query: &str, run_id: i64) -> StorageResult<u64> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE cars SET status = ?1, removed_at = ?2
             WHERE query = ?3 AND status = ?4 AND (last_run IS NULL OR last_run != ?5)",
            params![
                CarStatus::Removed.to_db_string(),
                now,
                query,
                CarStatus::Active.to_db_string(),
                run_id
            ],
        )?;
        Ok(changed as u64)
    }

    fn all_cars(&self) -> StorageResult<Vec<StoredCar>> {
        let mut stmt = self.conn.prepare(
            "SELECT data, status, first_seen, last_seen, removed_at FROM cars
             ORDER BY first_seen DESC, link ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;

        let mut cars = Vec::new();
        for row in rows {
            let (data, status, first_seen, last_seen, removed_at) = row?;
            cars.push(StoredCar {
                car: serde_json::from_str(&data)?,
                status: CarStatus::from_db_string(&status).unwrap_or(CarStatus::Active),
                first_seen,
                last_seen,
                removed_at,
            });
        }

        Ok(cars)
    }

    fn count_cars_by_status(&self, status: CarStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM cars WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn clear(&mut self) -> StorageResult<()> {
        self.conn.execute_batch("DELETE FROM cars; DELETE FROM runs;")?;
        Ok(())
    }
}
