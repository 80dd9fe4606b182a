//! Batched dictionary ingestion pipeline.
//!
//! This module provides the complete path from concurrently parsed
//! dictionary records to deduplicated production rows:
//!
//! 1. **Accumulation** (`collector`) - per-producer buffers with an atomic
//!    seal controller; no inter-producer locking.
//! 2. **Hand-off** (`queue`) - sealed batches waiting for a flush worker.
//! 3. **Freezing** (`freezer`) - immutable deep-copied snapshots with
//!    batch-local sequence identifiers.
//! 4. **Projection** (`payload`) - columnar multi-table payloads in UNNEST
//!    format.
//! 5. **Dispatch** (`dispatcher`) - one atomic bulk insert per batch into
//!    the staging area.
//! 6. **Merge** (`merge`) - per-source deduplication and insert-if-absent
//!    promotion into production, one transaction per source.
//!
//! # Data Flow
//!
//! producers -> collector -> (threshold) -> seal -> flush queue -> freeze
//! -> payload build -> bulk dispatch (staging) -> merge -> production
//!
//! Ordering is only guaranteed within a single frozen batch (sequence
//! identifiers reflect append order); parent/child association, not global
//! order, is the correctness requirement.

pub mod collector;
pub mod dispatcher;
pub mod error;
pub mod freezer;
pub mod merge;
pub mod payload;
pub mod queue;
pub mod record;
pub mod stats;
pub mod worker;

pub use collector::BatchCollector;
pub use dispatcher::BulkDispatcher;
pub use error::{FlushError, MergeError};
pub use freezer::{FrozenBatch, freeze};
pub use merge::MergeExecutor;
pub use payload::{RelationalPayload, build_payload};
pub use queue::{FlushQueue, SealedBatch};
pub use record::{CrossReference, EntryRecord, Etymology, RefKind};
pub use stats::{DispatchStats, MergeReport};
pub use worker::IngestPipeline;
