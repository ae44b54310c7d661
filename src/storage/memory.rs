use std::convert::Infallible;

use super::TrackingStore;
use crate::association::TrackingRecord;

/// In-process store, mainly for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Vec<TrackingRecord>,
    insert_calls: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `insert_batch` calls received so far.
    pub fn insert_calls(&self) -> usize {
        self.insert_calls
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TrackingRecord] {
        &self.records
    }
}

impl TrackingStore for MemoryStore {
    type Error = Infallible;

    fn insert_batch(&mut self, records: &[TrackingRecord]) -> Result<(), Self::Error> {
        self.insert_calls += 1;
        self.records.extend_from_slice(records);
        Ok(())
    }

    fn fetch_all(&self) -> Result<Vec<TrackingRecord>, Self::Error> {
        Ok(self.records.clone())
    }

    fn fetch_for_object(&self, object_id: u64) -> Result<Vec<TrackingRecord>, Self::Error> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.track_id == object_id)
            .copied()
            .collect())
    }
}
