//! Staging-to-production merge.
//!
//! Staged rows for one import source are deduplicated and promoted into the
//! production tables inside a single transaction:
//!
//! 1. **Analyze** - count staged rows and distinct natural keys (reported
//!    for observability, never gates the merge).
//! 2. **Deduplicate & select** - one representative per
//!    (source, normalized key, sense number) triple; the most recently
//!    created staged row wins, insertion order breaks timestamp ties.
//! 3. **Insert-if-absent** - representatives land with `ON CONFLICT DO
//!    NOTHING`; an existing production row is never overwritten. Child rows
//!    are promoted through the import provenance recorded on each inserted
//!    entry.
//! 4. **Clear staging** - staged rows for the source are deleted, children
//!    first.
//!
//! Any failure rolls the whole transaction back: no partial production
//! inserts, staging intact, safe to re-run. A failed source is logged and
//! skipped so sibling sources still merge.
//!
//! The analyze step also captures the highest staged row id and every later
//! statement is bounded by it, so a dispatch committing mid-merge can never
//! have its rows deleted without having been considered.

use crate::ingest::error::MergeError;
use crate::ingest::stats::MergeReport;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use tokio_util::sync::CancellationToken;

pub struct MergeExecutor {
    pool: PgPool,
}

impl MergeExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Merge one source's staged rows into production.
    ///
    /// Non-fatal: a failure is logged and `None` is returned with staging
    /// preserved, so callers iterating several sources keep going.
    pub async fn merge_source(&self, source_code: &str) -> Option<MergeReport> {
        match self.run_merge(source_code).await {
            Ok(report) => {
                log::info!(
                    "merge complete for source {}: {} staged, {} unique keys, {} duplicates, {} inserted, {} cleared",
                    report.source_code,
                    report.staged_total,
                    report.unique_keys,
                    report.duplicates,
                    report.inserted,
                    report.cleared
                );
                Some(report)
            }
            Err(err) => {
                log::error!(
                    "merge failed for source {}: {} (rolled back, staging preserved)",
                    source_code,
                    err
                );
                None
            }
        }
    }

    /// Merge several sources in turn, with a cancellation checkpoint before
    /// each source's transaction. Returns the reports of the successful
    /// merges.
    pub async fn merge_sources(
        &self,
        source_codes: &[String],
        cancel: &CancellationToken,
    ) -> Vec<MergeReport> {
        let mut reports = Vec::with_capacity(source_codes.len());

        for source_code in source_codes {
            if cancel.is_cancelled() {
                log::warn!("merge cancelled before source {}", source_code);
                break;
            }
            if let Some(report) = self.merge_source(source_code).await {
                reports.push(report);
            }
        }

        reports
    }

    async fn run_merge(&self, source_code: &str) -> Result<MergeReport, MergeError> {
        let started_at = Utc::now();
        let mut tx = self.pool.begin().await?;

        let (staged_total, unique_keys, cutoff_id) = analyze(&mut tx, source_code).await?;
        let inserted = insert_representatives(&mut tx, source_code, cutoff_id).await?;
        promote_children(&mut tx, source_code).await?;
        let cleared = clear_staging(&mut tx, source_code, cutoff_id).await?;

        tx.commit().await?;

        Ok(MergeReport {
            source_code: source_code.to_string(),
            started_at,
            staged_total,
            unique_keys,
            duplicates: staged_total - unique_keys,
            inserted,
            cleared,
        })
    }
}

/// Count staged rows and distinct key triples, and capture the staged-row
/// id boundary the rest of the merge operates within.
async fn analyze(
    tx: &mut Transaction<'_, Postgres>,
    source_code: &str,
) -> Result<(i64, i64, i64), MergeError> {
    let (total, unique, cutoff): (i64, i64, i64) = sqlx::query_as(
        r#"SELECT COUNT(*),
                  COUNT(DISTINCT (normalized_key, sense_number)),
                  COALESCE(MAX(id), 0)
           FROM staging_entries
           WHERE source_code = $1"#,
    )
    .bind(source_code)
    .fetch_one(&mut **tx)
    .await?;

    log::debug!(
        "merge analyze for source {}: {} staged, {} unique, {} duplicates",
        source_code,
        total,
        unique,
        total - unique
    );

    Ok((total, unique, cutoff))
}

/// Insert one representative per key triple, newest staged row first.
async fn insert_representatives(
    tx: &mut Transaction<'_, Postgres>,
    source_code: &str,
    cutoff_id: i64,
) -> Result<u64, MergeError> {
    let result = sqlx::query(
        r#"INSERT INTO dictionary_entries (
            source_code, normalized_key, sense_number, parent_entry_id,
            parent_sense_id, title, definition, raw_fragment, domain_label,
            usage_label, has_foreign_text, foreign_text_ref,
            import_batch_id, import_seq
           )
           SELECT DISTINCT ON (normalized_key, sense_number)
               source_code, normalized_key, sense_number, parent_entry_id,
               parent_sense_id, title, definition, raw_fragment, domain_label,
               usage_label, has_foreign_text, foreign_text_ref,
               batch_id, seq
           FROM staging_entries
           WHERE source_code = $1 AND id <= $2
           ORDER BY normalized_key, sense_number, created_at DESC, id DESC
           ON CONFLICT (source_code, normalized_key, sense_number) DO NOTHING"#,
    )
    .bind(source_code)
    .bind(cutoff_id)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

/// Copy child rows from staging for every entry inserted by this merge.
///
/// The provenance join only matches entries whose staged batch is still
/// present, i.e. the ones inserted inside the current transaction; entries
/// from earlier merges had their staging deleted when they were promoted.
async fn promote_children(
    tx: &mut Transaction<'_, Postgres>,
    source_code: &str,
) -> Result<(), MergeError> {
    let promoted_aliases = sqlx::query(
        r#"INSERT INTO entry_aliases (entry_id, alias)
           SELECT e.id, s.alias
           FROM dictionary_entries e
           JOIN staging_aliases s
             ON s.batch_id = e.import_batch_id AND s.parent_seq = e.import_seq
           WHERE e.source_code = $1"#,
    )
    .bind(source_code)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    let promoted_synonyms = sqlx::query(
        r#"INSERT INTO entry_synonyms (entry_id, synonym)
           SELECT e.id, s.synonym
           FROM dictionary_entries e
           JOIN staging_synonyms s
             ON s.batch_id = e.import_batch_id AND s.parent_seq = e.import_seq
           WHERE e.source_code = $1"#,
    )
    .bind(source_code)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    let promoted_examples = sqlx::query(
        r#"INSERT INTO entry_examples (entry_id, example)
           SELECT e.id, s.example
           FROM dictionary_entries e
           JOIN staging_examples s
             ON s.batch_id = e.import_batch_id AND s.parent_seq = e.import_seq
           WHERE e.source_code = $1"#,
    )
    .bind(source_code)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    let promoted_references = sqlx::query(
        r#"INSERT INTO entry_cross_references (entry_id, target_word, ref_kind)
           SELECT e.id, s.target_word, s.ref_kind
           FROM dictionary_entries e
           JOIN staging_cross_references s
             ON s.batch_id = e.import_batch_id AND s.parent_seq = e.import_seq
           WHERE e.source_code = $1"#,
    )
    .bind(source_code)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    let promoted_etymologies = sqlx::query(
        r#"INSERT INTO entry_etymologies (
               entry_id, etymology, language_code, uncertain, reconstructed
           )
           SELECT e.id, s.etymology, s.language_code, s.uncertain, s.reconstructed
           FROM dictionary_entries e
           JOIN staging_etymologies s
             ON s.batch_id = e.import_batch_id AND s.parent_seq = e.import_seq
           WHERE e.source_code = $1"#,
    )
    .bind(source_code)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    log::trace!(
        "promoted children for source {}: {} aliases, {} synonyms, {} examples, {} cross-references, {} etymologies",
        source_code,
        promoted_aliases,
        promoted_synonyms,
        promoted_examples,
        promoted_references,
        promoted_etymologies
    );

    Ok(())
}

/// Delete the staged rows this merge considered, children first.
async fn clear_staging(
    tx: &mut Transaction<'_, Postgres>,
    source_code: &str,
    cutoff_id: i64,
) -> Result<u64, MergeError> {
    for child_table in [
        "staging_aliases",
        "staging_synonyms",
        "staging_examples",
        "staging_cross_references",
        "staging_etymologies",
    ] {
        let delete = format!(
            r#"DELETE FROM {child_table} s
               USING staging_entries e
               WHERE s.batch_id = e.batch_id AND s.parent_seq = e.seq
                 AND e.source_code = $1 AND e.id <= $2"#
        );
        sqlx::query(&delete)
            .bind(source_code)
            .bind(cutoff_id)
            .execute(&mut **tx)
            .await?;
    }

    let cleared = sqlx::query("DELETE FROM staging_entries WHERE source_code = $1 AND id <= $2")
        .bind(source_code)
        .bind(cutoff_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();

    Ok(cleared)
}
