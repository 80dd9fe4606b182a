//! Error taxonomy of the ingestion pipeline.
//!
//! Accumulation and freezing cannot fail; the two fallible operations are
//! the staging dispatch and the staging-to-production merge, and both are
//! recovered by their callers rather than propagated across the pipeline.

use thiserror::Error;

/// Dispatch of a batch payload to the staging area failed.
///
/// The caller still owns the frozen batch and may rebuild the payload and
/// redispatch; this crate's flush workers log and discard instead.
#[derive(Debug, Error)]
pub enum FlushError {
    #[error("bulk dispatch failed: {0}")]
    Dispatch(#[from] sqlx::Error),
}

/// The merge transaction for one source failed and was rolled back.
///
/// Staging rows for the source remain intact, so the merge can be re-run.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("merge transaction failed: {0}")]
    Database(#[from] sqlx::Error),
}
