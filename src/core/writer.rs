//! Single-writer persistence of error records.
//!
//! All writes to the error store go through one `tokio::sync::Mutex`. Each
//! batch holds the lock for exactly one transaction. Waiting for the lock is
//! bounded: a timeout is a hard error for the run, never a silent skip.
//!
//! A batch whose transaction fails is rolled back and its rows are dropped.
//! They are not retried or requeued.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, warn};

use crate::adapters::ErrorStore;
use crate::domain::ErrorRecord;

/// Default wait for the store lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Run-level write failures
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Timed out after {waited:?} waiting for the error store lock")]
    LockTimeout { waited: Duration },

    #[error("Error store worker failed: {0}")]
    Worker(String),
}

/// What happened to one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Transaction committed; number of new rows
    Persisted(usize),
    /// Transaction rolled back; number of rows lost
    Dropped(usize),
}

/// Totals across all batches of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteStats {
    pub records_persisted: usize,
    pub records_dropped: usize,
    pub batches_written: usize,
    pub batches_failed: usize,
}

impl WriteStats {
    fn record(&mut self, outcome: BatchOutcome) {
        match outcome {
            BatchOutcome::Persisted(n) => {
                self.records_persisted += n;
                self.batches_written += 1;
            }
            BatchOutcome::Dropped(n) => {
                self.records_dropped += n;
                self.batches_failed += 1;
            }
        }
    }
}

/// Lock-guarded transactional writer over a shared [`ErrorStore`]
#[derive(Clone)]
pub struct BatchWriter {
    store: Arc<Mutex<ErrorStore>>,
    lock_timeout: Duration,
}

impl BatchWriter {
    pub fn new(store: ErrorStore, lock_timeout: Duration) -> Self {
        Self::shared(Arc::new(Mutex::new(store)), lock_timeout)
    }

    /// Writer over a store other components also hold
    pub fn shared(store: Arc<Mutex<ErrorStore>>, lock_timeout: Duration) -> Self {
        Self {
            store,
            lock_timeout,
        }
    }

    /// Handle to the underlying store
    pub fn store(&self) -> Arc<Mutex<ErrorStore>> {
        self.store.clone()
    }

    /// Persist one batch under the store lock
    pub async fn write_batch(&self, batch: Vec<ErrorRecord>) -> Result<BatchOutcome, WriteError> {
        if batch.is_empty() {
            return Ok(BatchOutcome::Persisted(0));
        }

        let mut guard = tokio::time::timeout(self.lock_timeout, self.store.clone().lock_owned())
            .await
            .map_err(|_| WriteError::LockTimeout {
                waited: self.lock_timeout,
            })?;

        let size = batch.len();
        let result = tokio::task::spawn_blocking(move || guard.insert_batch(&batch))
            .await
            .map_err(|e| WriteError::Worker(e.to_string()))?;

        match result {
            Ok(inserted) => {
                debug!(batch = size, inserted, "Error batch committed");
                Ok(BatchOutcome::Persisted(inserted))
            }
            Err(e) => {
                error!(batch = size, error = %e, "Error batch rolled back; rows dropped");
                Ok(BatchOutcome::Dropped(size))
            }
        }
    }
}

/// Consume records from `rx`, writing them in batches of `batch_size`.
///
/// Returns once every sender is dropped and the final partial batch is
/// written, or immediately on a lock timeout.
pub async fn drain(
    mut rx: mpsc::Receiver<ErrorRecord>,
    writer: &BatchWriter,
    batch_size: usize,
) -> Result<WriteStats, WriteError> {
    let batch_size = batch_size.max(1);
    let mut stats = WriteStats::default();
    let mut batch = Vec::with_capacity(batch_size);

    while let Some(record) = rx.recv().await {
        batch.push(record);
        if batch.len() == batch_size {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
            stats.record(writer.write_batch(full).await?);
        }
    }

    if !batch.is_empty() {
        stats.record(writer.write_batch(batch).await?);
    }

    if stats.records_dropped > 0 {
        warn!(
            dropped = stats.records_dropped,
            failed_batches = stats.batches_failed,
            "Some error records were not persisted"
        );
    }

    Ok(stats)
}
