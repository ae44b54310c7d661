//! Durable storage for tracking records.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{DEFAULT_DATABASE, SqliteStore, StorageError};

use crate::association::TrackingRecord;

/// Destination for flushed tracking records and the read-only query surface
/// over them.
///
/// `insert_batch` must be all-or-nothing: on error, none of the records may
/// be visible to later queries.
pub trait TrackingStore {
    /// Error type for storage failures.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Insert every record in one atomic operation.
    fn insert_batch(&mut self, records: &[TrackingRecord]) -> Result<(), Self::Error>;

    /// All stored records in insertion order.
    fn fetch_all(&self) -> Result<Vec<TrackingRecord>, Self::Error>;

    /// Stored records of one tracked object in insertion order.
    fn fetch_for_object(&self, object_id: u64) -> Result<Vec<TrackingRecord>, Self::Error>;
}

impl<S: TrackingStore + ?Sized> TrackingStore for &mut S {
    type Error = S::Error;

    fn insert_batch(&mut self, records: &[TrackingRecord]) -> Result<(), Self::Error> {
        (**self).insert_batch(records)
    }

    fn fetch_all(&self) -> Result<Vec<TrackingRecord>, Self::Error> {
        (**self).fetch_all()
    }

    fn fetch_for_object(&self, object_id: u64) -> Result<Vec<TrackingRecord>, Self::Error> {
        (**self).fetch_for_object(object_id)
    }
}
