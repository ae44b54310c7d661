//! In-memory batching of tracking records in front of a [`TrackingStore`].

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::association::TrackingRecord;
use crate::error::BoxError;
use crate::storage::TrackingStore;

/// Default number of buffered records that triggers a flush.
pub const BATCH_SIZE: usize = 100;

/// Default number of extra attempts after a failed flush.
pub const FLUSH_RETRIES: u32 = 1;

/// The store rejected a flush on every attempt.
///
/// Carries the records that could not be written so the caller can report
/// or persist them elsewhere.
#[derive(Debug, Error)]
#[error("failed to flush {} tracking records after {attempts} attempts", .pending.len())]
pub struct FlushError {
    pub attempts: u32,
    pub pending: Vec<TrackingRecord>,
    #[source]
    pub source: BoxError,
}

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error(transparent)]
    Flush(#[from] FlushError),

    #[error("recorder has already been drained")]
    Drained,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecorderStats {
    /// Records accepted by `record`
    pub recorded: u64,
    /// Records written to the store
    pub flushed: u64,
    /// Successful store writes
    pub flushes: u64,
    /// Store writes that failed, including ones that later succeeded on retry
    pub failed_attempts: u64,
}

/// Buffers tracking records and writes them to the store in batches.
///
/// Records reach the store exactly once: a successful flush clears the
/// buffer, a failed one hands the buffer back inside [`FlushError`].
pub struct BatchRecorder<S: TrackingStore> {
    store: S,
    batch: Vec<TrackingRecord>,
    batch_size: usize,
    flush_retries: u32,
    drained: bool,
    stats: RecorderStats,
}

impl<S: TrackingStore> BatchRecorder<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            batch: Vec::with_capacity(BATCH_SIZE),
            batch_size: BATCH_SIZE,
            flush_retries: FLUSH_RETRIES,
            drained: false,
            stats: RecorderStats::default(),
        }
    }

    /// Set the flush threshold. Values below 1 are treated as 1.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the number of extra attempts after a failed flush. A failed flush
    /// is always retried at least once.
    pub fn with_flush_retries(mut self, flush_retries: u32) -> Self {
        self.flush_retries = flush_retries.max(1);
        self
    }

    /// Append a record to the in-memory batch.
    pub fn record(&mut self, record: TrackingRecord) -> Result<(), RecorderError> {
        if self.drained {
            return Err(RecorderError::Drained);
        }
        self.batch.push(record);
        self.stats.recorded += 1;
        Ok(())
    }

    /// Flush the whole batch if it has reached the batch size.
    ///
    /// Returns the number of records written, zero when nothing was due.
    pub fn flush_if_full(&mut self) -> Result<usize, FlushError> {
        if self.batch.len() >= self.batch_size {
            self.flush()
        } else {
            Ok(0)
        }
    }

    /// Flush whatever remains, regardless of size, and close the recorder.
    ///
    /// May only be called once; later calls and later `record`s fail with
    /// [`RecorderError::Drained`].
    pub fn drain(&mut self) -> Result<usize, RecorderError> {
        if self.drained {
            return Err(RecorderError::Drained);
        }
        self.drained = true;
        let flushed = self.flush()?;
        debug!(flushed, total = self.stats.flushed, "drained recorder");
        Ok(flushed)
    }

    fn flush(&mut self) -> Result<usize, FlushError> {
        if self.batch.is_empty() {
            return Ok(0);
        }

        let max_attempts = self.flush_retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.store.insert_batch(&self.batch) {
                Ok(()) => {
                    let count = self.batch.len();
                    self.batch.clear();
                    self.stats.flushed += count as u64;
                    self.stats.flushes += 1;
                    debug!(count, attempt, "flushed tracking batch");
                    return Ok(count);
                }
                Err(err) => {
                    self.stats.failed_attempts += 1;
                    if attempt < max_attempts {
                        warn!(attempt, error = %err, "flush failed, retrying");
                        continue;
                    }
                    error!(
                        attempt,
                        pending = self.batch.len(),
                        error = %err,
                        "flush failed, giving up"
                    );
                    return Err(FlushError {
                        attempts: attempt,
                        pending: std::mem::take(&mut self.batch),
                        source: Box::new(err),
                    });
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Records waiting for the next flush.
    pub fn pending(&self) -> &[TrackingRecord] {
        &self.batch
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn is_drained(&self) -> bool {
        self.drained
    }

    pub fn stats(&self) -> RecorderStats {
        self.stats
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}
