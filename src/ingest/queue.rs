//! Hand-off queue between producers and flush workers.
//!
//! Sealed batches are pushed by whichever producer crossed the batch-size
//! threshold (or by `flush_all`) and popped by background flush workers.
//! Ownership of a batch transfers exclusively to the single worker that
//! pops it, so each sealed batch has at most one in-flight flush.

use crate::ingest::record::EntryRecord;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;

/// An ordered list of records captured when a producer's buffer was sealed.
#[derive(Debug)]
pub struct SealedBatch {
    pub records: Vec<EntryRecord>,
}

impl SealedBatch {
    pub fn new(records: Vec<EntryRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

struct QueueState {
    batches: VecDeque<SealedBatch>,
    closed: bool,
}

/// FIFO of sealed, not-yet-persisted batches.
///
/// Unbounded: producers never block on slow storage, at the cost of memory
/// growth when dispatch falls behind.
pub struct FlushQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl FlushQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                batches: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Enqueue a sealed batch. Batches pushed after `close` are dropped.
    pub fn push(&self, batch: SealedBatch) {
        {
            let mut state = self.state.lock();
            if state.closed {
                log::warn!(
                    "flush queue closed, dropping sealed batch of {} records",
                    batch.len()
                );
                return;
            }
            state.batches.push_back(batch);
        }
        self.notify.notify_one();
    }

    /// Mark the stream finished. Waiting workers drain the remaining
    /// batches and then observe `None` from [`FlushQueue::pop`].
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.notify.notify_waiters();
    }

    /// Wait for the next batch; `None` once the queue is closed and empty.
    pub async fn pop(&self) -> Option<SealedBatch> {
        loop {
            {
                let mut state = self.state.lock();
                if let Some(batch) = state.batches.pop_front() {
                    return Some(batch);
                }
                if state.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Non-blocking pop, used where suspension is not an option.
    pub fn try_pop(&self) -> Option<SealedBatch> {
        self.state.lock().batches.pop_front()
    }

    pub fn len(&self) -> usize {
        self.state.lock().batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().batches.is_empty()
    }
}

impl Default for FlushQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::record::EntryRecord;

    fn batch_of(n: usize) -> SealedBatch {
        let records = (0..n)
            .map(|i| EntryRecord::new(i as i64, format!("word {}", i), "def", 1, "test"))
            .collect();
        SealedBatch::new(records)
    }

    #[test]
    fn preserves_fifo_order() {
        let queue = FlushQueue::new();
        queue.push(batch_of(1));
        queue.push(batch_of(2));
        queue.push(batch_of(3));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.try_pop().unwrap().len(), 1);
        assert_eq!(queue.try_pop().unwrap().len(), 2);
        assert_eq!(queue.try_pop().unwrap().len(), 3);
        assert!(queue.try_pop().is_none());
    }

    #[tokio::test]
    async fn pop_returns_none_after_close_and_drain() {
        let queue = FlushQueue::new();
        queue.push(batch_of(4));
        queue.close();

        assert_eq!(queue.pop().await.unwrap().len(), 4);
        assert!(queue.pop().await.is_none());
    }

    #[test]
    fn push_after_close_is_dropped() {
        let queue = FlushQueue::new();
        queue.close();
        queue.push(batch_of(1));

        assert!(queue.is_empty());
    }
}
