//! Background flush workers and pipeline wiring.
//!
//! Producers feed the collector; a bounded pool of workers drains the flush
//! queue, each looping freeze -> build -> dispatch. Accumulation and
//! freezing are synchronous; the dispatch is the only suspension point.
//!
//! A failed dispatch is logged and the batch discarded - the payload is
//! derived from frozen, copied data, so a caller wanting retries can hold
//! the frozen batch and redispatch, but this pipeline chooses not to.

use crate::config::IngestConfig;
use crate::ingest::collector::BatchCollector;
use crate::ingest::dispatcher::BulkDispatcher;
use crate::ingest::queue::FlushQueue;
use crate::ingest::stats::DispatchStats;
use crate::ingest::{freezer, payload};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct IngestPipeline {
    collector: Arc<BatchCollector>,
    queue: Arc<FlushQueue>,
    dispatcher: Arc<BulkDispatcher>,
    config: IngestConfig,
}

impl IngestPipeline {
    pub fn new(pool: PgPool, config: IngestConfig) -> Self {
        let queue = Arc::new(FlushQueue::new());
        let collector = Arc::new(BatchCollector::new(config.batch_size, queue.clone()));
        let dispatcher = Arc::new(BulkDispatcher::new(pool));

        Self {
            collector,
            queue,
            dispatcher,
            config,
        }
    }

    /// The accumulator producers add records through.
    pub fn collector(&self) -> Arc<BatchCollector> {
        self.collector.clone()
    }

    /// Spawn the configured number of flush workers draining the queue.
    pub fn spawn_workers(&self, cancel: &CancellationToken) -> Vec<JoinHandle<DispatchStats>> {
        (0..self.config.worker_count)
            .map(|worker_id| {
                let queue = self.queue.clone();
                let dispatcher = self.dispatcher.clone();
                let cancel = cancel.clone();
                tokio::spawn(
                    async move { drain_queue(worker_id, queue, dispatcher, cancel).await },
                )
            })
            .collect()
    }

    /// End of stream: seal residual buffers, close the queue, and wait for
    /// the workers to finish. Returns the merged dispatch statistics.
    pub async fn run_to_completion(
        &self,
        workers: Vec<JoinHandle<DispatchStats>>,
        cancel: &CancellationToken,
    ) -> DispatchStats {
        self.collector.flush_all(cancel);
        self.queue.close();

        let mut total = DispatchStats::default();
        for worker in workers {
            match worker.await {
                Ok(stats) => total.merge(stats),
                Err(err) => {
                    log::error!("flush worker panicked: {}", err);
                    total.failures += 1;
                }
            }
        }

        log::info!(
            "ingest run finished: {} batches dispatched ({} entries), {} failures",
            total.batches,
            total.entries,
            total.failures
        );
        total
    }
}

async fn drain_queue(
    worker_id: usize,
    queue: Arc<FlushQueue>,
    dispatcher: Arc<BulkDispatcher>,
    cancel: CancellationToken,
) -> DispatchStats {
    let mut stats = DispatchStats::default();
    log::debug!("flush worker {} started", worker_id);

    loop {
        let sealed = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::warn!("flush worker {}: cancelled, stopping before next dispatch", worker_id);
                break;
            }
            sealed = queue.pop() => match sealed {
                Some(sealed) => sealed,
                None => break,
            },
        };

        // Cancellation checkpoint: never start a new batch's dispatch after
        // the signal; an in-flight dispatch below always runs to completion.
        if cancel.is_cancelled() {
            log::warn!(
                "flush worker {}: cancelled, {} records left undispatched",
                worker_id,
                sealed.len()
            );
            break;
        }

        let frozen = freezer::freeze(&sealed);
        drop(sealed);
        let payload = payload::build_payload(&frozen);

        match dispatcher.dispatch(&payload).await {
            Ok(batch_stats) => stats.merge(batch_stats),
            Err(err) => {
                stats.failures += 1;
                log::error!(
                    "flush worker {}: dispatch failed for batch {}: {}",
                    worker_id,
                    frozen.batch_id(),
                    err
                );
            }
        }
    }

    log::debug!(
        "flush worker {} finished: {} batches, {} failures",
        worker_id,
        stats.batches,
        stats.failures
    );
    stats
}
