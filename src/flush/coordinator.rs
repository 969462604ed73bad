//! Flush Coordinator - pending buffer and flush timing
//!
//! Workers append decoded batches here. When the buffer reaches the
//! threshold it is swapped out for an empty one inside the buffer lock and
//! merged into the store after the lock is released, so a slow merge never
//! blocks other appends.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use crate::error::IngestResult;
use crate::event_store::EventStore;
use crate::types::EventBatch;

use super::stats::{FlushCounters, FlushStats};

/// Default number of buffered events that triggers a flush
pub const DEFAULT_FLUSH_THRESHOLD: usize = 4;

#[derive(Debug, Default)]
struct PendingBuffer {
    events: EventBatch,
    /// Batches swapped out but not yet merged (or re-queued)
    merges_in_flight: usize,
}

/// Buffers events from concurrent workers and merges them into the store
pub struct FlushCoordinator {
    store: Arc<EventStore>,
    threshold: usize,
    pending: Mutex<PendingBuffer>,
    /// Signalled whenever `merges_in_flight` drops
    merge_finished: Condvar,
    counters: FlushCounters,
}

impl FlushCoordinator {
    /// Create a coordinator with the default threshold
    pub fn new(store: Arc<EventStore>) -> Self {
        Self::with_threshold(store, DEFAULT_FLUSH_THRESHOLD)
    }

    /// Create a coordinator flushing every `threshold` events (minimum 1)
    pub fn with_threshold(store: Arc<EventStore>, threshold: usize) -> Self {
        Self {
            store,
            threshold: threshold.max(1),
            pending: Mutex::new(PendingBuffer::default()),
            merge_finished: Condvar::new(),
            counters: FlushCounters::default(),
        }
    }

    /// Add decoded events to the buffer
    ///
    /// If the buffer reaches the threshold, it is swapped out in the same
    /// critical section and merged before this call returns. Returns the
    /// number of events persisted by that flush, or 0 if none ran.
    pub fn append(&self, events: EventBatch) -> IngestResult<usize> {
        if events.is_empty() {
            return Ok(0);
        }

        let batch = {
            let mut pending = self.pending.lock();
            pending.events.extend(events);
            if pending.events.len() < self.threshold {
                debug!(buffered = pending.events.len(), "Buffered events");
                return Ok(0);
            }
            pending.merges_in_flight += 1;
            std::mem::take(&mut pending.events)
        };

        debug!(events = batch.len(), threshold = self.threshold, "Flush threshold reached");
        self.persist(batch)
    }

    /// Merge everything currently buffered into the store
    ///
    /// Returns the number of events persisted.
    pub fn flush(&self) -> IngestResult<usize> {
        match self.take_pending() {
            Some(batch) => self.persist(batch),
            None => Ok(0),
        }
    }

    /// Final flush during graceful termination
    ///
    /// Waits for merges already in progress so that a batch re-queued by a
    /// failed merge is included, then flushes what remains. Calling it again
    /// only flushes events buffered since.
    pub fn shutdown_flush(&self) -> IngestResult<usize> {
        let batch = {
            let mut pending = self.pending.lock();
            while pending.merges_in_flight > 0 {
                self.merge_finished.wait(&mut pending);
            }
            if pending.events.is_empty() {
                None
            } else {
                pending.merges_in_flight += 1;
                Some(std::mem::take(&mut pending.events))
            }
        };

        let persisted = match batch {
            Some(batch) => self.persist(batch)?,
            None => 0,
        };
        info!(persisted, "Shutdown flush complete");
        Ok(persisted)
    }

    /// Number of events waiting in the buffer
    pub fn buffered(&self) -> usize {
        self.pending.lock().events.len()
    }

    /// Flush threshold in events
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Store this coordinator flushes into
    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    /// Snapshot of flush counters
    pub fn stats(&self) -> FlushStats {
        self.counters.snapshot(self.buffered())
    }

    fn take_pending(&self) -> Option<EventBatch> {
        let mut pending = self.pending.lock();
        if pending.events.is_empty() {
            return None;
        }
        pending.merges_in_flight += 1;
        Some(std::mem::take(&mut pending.events))
    }

    /// Merge a swapped-out batch; the buffer lock must not be held
    fn persist(&self, batch: EventBatch) -> IngestResult<usize> {
        let count = batch.len();
        let result = self.store.merge_and_persist(&batch);

        let mut pending = self.pending.lock();
        pending.merges_in_flight -= 1;

        let outcome = match result {
            Ok(total) => {
                drop(pending);
                self.counters.record_success(count);
                info!(events = count, total, path = %self.store.path().display(), "Flushed events to store");
                Ok(count)
            }
            Err(e) if e.is_retryable() => {
                // Retry ahead of anything buffered since the swap
                let newer = std::mem::replace(&mut pending.events, batch);
                pending.events.extend(newer);
                drop(pending);
                self.counters.record_requeue(count);
                warn!(events = count, error = %e, "Flush failed, events kept for retry");
                Err(e)
            }
            Err(e) => {
                drop(pending);
                self.counters.record_drop(count);
                error!(events = count, error = %e, "Flush aborted, events dropped");
                Err(e)
            }
        };

        self.merge_finished.notify_all();
        outcome
    }
}
