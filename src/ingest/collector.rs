//! Per-producer accumulation and the seal controller.
//!
//! Every producer thread owns an independent buffer keyed by its `ThreadId`
//! in a `DashMap`; an entry is only ever touched by its owning thread until
//! seal or flush, so `add` never contends with other producers. The only
//! shared state is an atomic counter of items added since the last seal and
//! the hand-off queue.
//!
//! Sealing: when the post-increment counter value reaches the configured
//! batch size, the calling producer swaps its buffer for a fresh one and
//! pushes the old buffer onto the flush queue. A producer whose own buffer
//! reaches the batch size seals as well, which keeps every sealed batch
//! bounded even when another producer performed the previous seal. The
//! counter is decremented by the number of records sealed so concurrent
//! producers' in-flight counts survive the seal.

use crate::ingest::queue::{FlushQueue, SealedBatch};
use crate::ingest::record::EntryRecord;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};
use tokio_util::sync::CancellationToken;

pub struct BatchCollector {
    buffers: DashMap<ThreadId, Vec<EntryRecord>>,
    pending: AtomicUsize,
    batch_size: usize,
    queue: Arc<FlushQueue>,
}

impl BatchCollector {
    pub fn new(batch_size: usize, queue: Arc<FlushQueue>) -> Self {
        Self {
            buffers: DashMap::new(),
            pending: AtomicUsize::new(0),
            batch_size: batch_size.max(1),
            queue,
        }
    }

    /// Append a record to the calling thread's buffer. O(1), non-blocking
    /// with respect to other producers; seals when a threshold is crossed.
    pub fn add(&self, record: EntryRecord) {
        let mut buffer = self.buffers.entry(thread::current().id()).or_default();
        buffer.push(record);

        let pending = self.pending.fetch_add(1, Ordering::AcqRel) + 1;
        if pending >= self.batch_size || buffer.len() >= self.batch_size {
            let sealed = std::mem::take(&mut *buffer);
            drop(buffer);
            self.seal(sealed);
        }
    }

    /// Apply a mutation to the last record in the calling thread's buffer.
    ///
    /// No-op when the buffer is empty: a parser emitting child details
    /// before its first record is a tolerated upstream quirk, not an error.
    pub fn amend_current<F>(&self, mutate: F)
    where
        F: FnOnce(&mut EntryRecord),
    {
        if let Some(mut buffer) = self.buffers.get_mut(&thread::current().id()) {
            if let Some(current) = buffer.last_mut() {
                mutate(current);
            }
        }
    }

    /// Seal every producer's buffer regardless of size, e.g. at end of
    /// stream. Stops enqueuing further batches once `cancel` fires.
    pub fn flush_all(&self, cancel: &CancellationToken) {
        for mut entry in self.buffers.iter_mut() {
            if cancel.is_cancelled() {
                log::warn!("flush_all cancelled, remaining buffers left unsealed");
                return;
            }
            if entry.is_empty() {
                continue;
            }
            let sealed = std::mem::take(entry.value_mut());
            self.seal(sealed);
        }
    }

    fn seal(&self, records: Vec<EntryRecord>) {
        self.pending.fetch_sub(records.len(), Ordering::AcqRel);
        log::trace!("sealed batch of {} records", records.len());
        self.queue.push(SealedBatch::new(records));
    }

    /// Records accumulated across all producers but not yet sealed.
    pub fn pending_records(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}
