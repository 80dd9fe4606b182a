//! Runtime configuration for the ingestion pipeline.

use std::env;

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

/// Tunables consumed by the pipeline.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Records accumulated across all producers before a buffer is sealed.
    pub batch_size: usize,
    /// Background flush workers draining the queue concurrently.
    pub worker_count: usize,
}

impl IngestConfig {
    pub fn new(batch_size: usize, worker_count: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            worker_count: worker_count.max(1),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            env_usize("INGEST_BATCH_SIZE", 5_000),
            env_usize("INGEST_WORKERS", default_worker_count()),
        )
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn default_worker_count() -> usize {
    num_cpus::get().min(4)
}
