//! SQLite-backed tracking store.

use std::path::Path;

use rusqlite::{Connection, OpenFlags, Row, params};
use thiserror::Error;
use tracing::debug;

use super::TrackingStore;
use crate::association::TrackingRecord;

/// Database file used when none is configured.
pub const DEFAULT_DATABASE: &str = "tracking_data.db";

const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS tracking_data (
        frame_number INTEGER,
        object_id INTEGER,
        x1 INTEGER,
        y1 INTEGER,
        x2 INTEGER,
        y2 INTEGER,
        confidence REAL
    )";

const INSERT_RECORD: &str = "
    INSERT INTO tracking_data (frame_number, object_id, x1, y1, x2, y2, confidence)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

const SELECT_ALL: &str = "
    SELECT frame_number, object_id, x1, y1, x2, y2, confidence
    FROM tracking_data ORDER BY rowid";

const SELECT_FOR_OBJECT: &str = "
    SELECT frame_number, object_id, x1, y1, x2, y2, confidence
    FROM tracking_data WHERE object_id = ?1 ORDER BY rowid";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{column} value {value} does not fit in a SQLite INTEGER")]
    OutOfRange { column: &'static str, value: u64 },
}

/// Tracking store over a single `tracking_data` table.
///
/// Each `insert_batch` runs in its own transaction, so a failed flush leaves
/// no partial rows behind.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file and make sure the table exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Open an existing database without write access, for reporting.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        Ok(Self {
            conn: Connection::open_with_flags(path, flags)?,
        })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute(CREATE_TABLE, [])?;
        Ok(Self { conn })
    }

    /// Names of all tables in the database.
    pub fn list_tables(&self) -> Result<Vec<String>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Number of stored records.
    pub fn count(&self) -> Result<u64, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tracking_data", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Close the connection, reporting any error SQLite raises on close.
    pub fn close(self) -> Result<(), StorageError> {
        self.conn.close().map_err(|(_, err)| StorageError::Sqlite(err))
    }

    fn query(&self, sql: &str, object_id: Option<i64>) -> Result<Vec<TrackingRecord>, StorageError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = match object_id {
            Some(id) => stmt.query_map([id], record_from_row)?.collect::<Result<Vec<_>, _>>()?,
            None => stmt.query_map([], record_from_row)?.collect::<Result<Vec<_>, _>>()?,
        };
        Ok(rows)
    }
}

impl TrackingStore for SqliteStore {
    type Error = StorageError;

    fn insert_batch(&mut self, records: &[TrackingRecord]) -> Result<(), Self::Error> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(INSERT_RECORD)?;
            for record in records {
                stmt.execute(params![
                    to_sql_int("frame_number", record.frame_number)?,
                    to_sql_int("object_id", record.track_id)?,
                    record.x1,
                    record.y1,
                    record.x2,
                    record.y2,
                    record.confidence as f64,
                ])?;
            }
        }
        tx.commit()?;
        debug!(rows = records.len(), "inserted tracking batch");
        Ok(())
    }

    fn fetch_all(&self) -> Result<Vec<TrackingRecord>, Self::Error> {
        self.query(SELECT_ALL, None)
    }

    fn fetch_for_object(&self, object_id: u64) -> Result<Vec<TrackingRecord>, Self::Error> {
        self.query(SELECT_FOR_OBJECT, Some(to_sql_int("object_id", object_id)?))
    }
}

fn to_sql_int(column: &'static str, value: u64) -> Result<i64, StorageError> {
    i64::try_from(value).map_err(|_| StorageError::OutOfRange { column, value })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<TrackingRecord> {
    let frame_number: i64 = row.get(0)?;
    let object_id: i64 = row.get(1)?;
    Ok(TrackingRecord {
        frame_number: u64::try_from(frame_number)
            .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(0, frame_number))?,
        track_id: u64::try_from(object_id)
            .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(1, object_id))?,
        x1: row.get(2)?,
        y1: row.get(3)?,
        x2: row.get(4)?,
        y2: row.get(5)?,
        confidence: row.get::<_, f64>(6)? as f32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(frame_number: u64, track_id: u64, confidence: f32) -> TrackingRecord {
        TrackingRecord {
            frame_number,
            track_id,
            x1: 1,
            y1: 2,
            x2: 30,
            y2: 40,
            confidence,
        }
    }

    #[test]
    fn test_creates_table() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.list_tables().unwrap(), vec!["tracking_data".to_string()]);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_insert_and_fetch_in_insertion_order() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_batch(&[record(2, 7, 0.9), record(1, 3, 0.8)])
            .unwrap();
        store.insert_batch(&[record(3, 7, 0.75)]).unwrap();

        let all = store.fetch_all().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].frame_number, 2);
        assert_eq!(all[1].frame_number, 1);
        assert_eq!(all[2].frame_number, 3);
        assert!((all[0].confidence - 0.9).abs() < 1e-6);
        assert_eq!((all[0].x1, all[0].y1, all[0].x2, all[0].y2), (1, 2, 30, 40));

        let seven = store.fetch_for_object(7).unwrap();
        assert_eq!(seven.len(), 2);
        assert!(seven.iter().all(|r| r.track_id == 7));
        assert!(store.fetch_for_object(99).unwrap().is_empty());
    }

    #[test]
    fn test_failed_batch_leaves_no_rows() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let result = store.insert_batch(&[record(1, 1, 0.9), record(2, u64::MAX, 0.9)]);
        assert!(matches!(result, Err(StorageError::OutOfRange { .. })));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.insert_batch(&[]).unwrap();
        assert_eq!(store.count().unwrap(), 0);
        store.close().unwrap();
    }
}
