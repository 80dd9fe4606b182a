//! Bulk dispatch of batch payloads into the staging area.
//!
//! One dispatch is one transaction carrying all six payload tables, each
//! landed with a single UNNEST insert. From the caller's point of view the
//! whole payload arrives atomically: either every table's rows are staged
//! or none are.

use crate::ingest::error::FlushError;
use crate::ingest::payload::RelationalPayload;
use crate::ingest::stats::DispatchStats;
use sqlx::{PgPool, Postgres, Transaction};

pub struct BulkDispatcher {
    pool: PgPool,
}

impl BulkDispatcher {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Land one batch payload in staging.
    ///
    /// Concurrent dispatches of different batches may share the pool but
    /// run independent transactions; a given batch is owned by a single
    /// flush worker and never dispatched concurrently with itself.
    pub async fn dispatch(&self, payload: &RelationalPayload) -> Result<DispatchStats, FlushError> {
        let mut tx = self.pool.begin().await?;

        let entries = insert_staged_entries(&mut tx, payload).await?;
        let aliases = insert_staged_aliases(&mut tx, payload).await?;
        let synonyms = insert_staged_synonyms(&mut tx, payload).await?;
        let examples = insert_staged_examples(&mut tx, payload).await?;
        let cross_references = insert_staged_cross_references(&mut tx, payload).await?;
        let etymologies = insert_staged_etymologies(&mut tx, payload).await?;

        tx.commit().await?;

        log::debug!(
            "dispatched batch {}: {} entries, {} aliases, {} synonyms, {} examples, {} cross-references, {} etymologies",
            payload.batch_id,
            entries,
            aliases,
            synonyms,
            examples,
            cross_references,
            etymologies
        );

        Ok(DispatchStats {
            batches: 1,
            entries,
            aliases,
            synonyms,
            examples,
            cross_references,
            etymologies,
            failures: 0,
        })
    }
}

async fn insert_staged_entries(
    tx: &mut Transaction<'_, Postgres>,
    payload: &RelationalPayload,
) -> Result<usize, FlushError> {
    let entries = &payload.entries;
    if entries.seqs.is_empty() {
        return Ok(0);
    }

    sqlx::query(
        r#"INSERT INTO staging_entries (
            batch_id, seq, source_code, parent_entry_id, parent_sense_id,
            normalized_key, sense_number, title, definition, raw_fragment,
            domain_label, usage_label, has_foreign_text, foreign_text_ref
           )
           SELECT $1, t.* FROM UNNEST(
               $2::int[], $3::text[], $4::bigint[], $5::bigint[],
               $6::text[], $7::int[], $8::text[], $9::text[], $10::text[],
               $11::text[], $12::text[], $13::bool[], $14::text[]
           ) AS t (
               seq, source_code, parent_entry_id, parent_sense_id,
               normalized_key, sense_number, title, definition, raw_fragment,
               domain_label, usage_label, has_foreign_text, foreign_text_ref
           )"#,
    )
    .bind(payload.batch_id)
    .bind(&entries.seqs)
    .bind(&entries.source_codes)
    .bind(&entries.parent_entry_ids)
    .bind(&entries.parent_sense_ids)
    .bind(&entries.normalized_keys)
    .bind(&entries.sense_numbers)
    .bind(&entries.titles)
    .bind(&entries.definitions)
    .bind(&entries.raw_fragments)
    .bind(&entries.domain_labels)
    .bind(&entries.usage_labels)
    .bind(&entries.has_foreign_texts)
    .bind(&entries.foreign_text_refs)
    .execute(&mut **tx)
    .await?;

    log::trace!("staged {} entries", entries.seqs.len());
    Ok(entries.seqs.len())
}

async fn insert_staged_aliases(
    tx: &mut Transaction<'_, Postgres>,
    payload: &RelationalPayload,
) -> Result<usize, FlushError> {
    let aliases = &payload.aliases;
    if aliases.parent_seqs.is_empty() {
        return Ok(0);
    }

    sqlx::query(
        r#"INSERT INTO staging_aliases (batch_id, parent_seq, alias)
           SELECT $1, t.* FROM UNNEST($2::int[], $3::text[]) AS t (parent_seq, alias)"#,
    )
    .bind(payload.batch_id)
    .bind(&aliases.parent_seqs)
    .bind(&aliases.aliases)
    .execute(&mut **tx)
    .await?;

    log::trace!("staged {} aliases", aliases.parent_seqs.len());
    Ok(aliases.parent_seqs.len())
}

async fn insert_staged_synonyms(
    tx: &mut Transaction<'_, Postgres>,
    payload: &RelationalPayload,
) -> Result<usize, FlushError> {
    let synonyms = &payload.synonyms;
    if synonyms.parent_seqs.is_empty() {
        return Ok(0);
    }

    sqlx::query(
        r#"INSERT INTO staging_synonyms (batch_id, parent_seq, synonym)
           SELECT $1, t.* FROM UNNEST($2::int[], $3::text[]) AS t (parent_seq, synonym)"#,
    )
    .bind(payload.batch_id)
    .bind(&synonyms.parent_seqs)
    .bind(&synonyms.synonyms)
    .execute(&mut **tx)
    .await?;

    log::trace!("staged {} synonyms", synonyms.parent_seqs.len());
    Ok(synonyms.parent_seqs.len())
}

async fn insert_staged_examples(
    tx: &mut Transaction<'_, Postgres>,
    payload: &RelationalPayload,
) -> Result<usize, FlushError> {
    let examples = &payload.examples;
    if examples.parent_seqs.is_empty() {
        return Ok(0);
    }

    sqlx::query(
        r#"INSERT INTO staging_examples (batch_id, parent_seq, example)
           SELECT $1, t.* FROM UNNEST($2::int[], $3::text[]) AS t (parent_seq, example)"#,
    )
    .bind(payload.batch_id)
    .bind(&examples.parent_seqs)
    .bind(&examples.examples)
    .execute(&mut **tx)
    .await?;

    log::trace!("staged {} examples", examples.parent_seqs.len());
    Ok(examples.parent_seqs.len())
}

async fn insert_staged_cross_references(
    tx: &mut Transaction<'_, Postgres>,
    payload: &RelationalPayload,
) -> Result<usize, FlushError> {
    let cross_references = &payload.cross_references;
    if cross_references.parent_seqs.is_empty() {
        return Ok(0);
    }

    sqlx::query(
        r#"INSERT INTO staging_cross_references (batch_id, parent_seq, target_word, ref_kind)
           SELECT $1, t.* FROM UNNEST($2::int[], $3::text[], $4::text[])
               AS t (parent_seq, target_word, ref_kind)"#,
    )
    .bind(payload.batch_id)
    .bind(&cross_references.parent_seqs)
    .bind(&cross_references.target_words)
    .bind(&cross_references.kinds)
    .execute(&mut **tx)
    .await?;

    log::trace!(
        "staged {} cross-references",
        cross_references.parent_seqs.len()
    );
    Ok(cross_references.parent_seqs.len())
}

async fn insert_staged_etymologies(
    tx: &mut Transaction<'_, Postgres>,
    payload: &RelationalPayload,
) -> Result<usize, FlushError> {
    let etymologies = &payload.etymologies;
    if etymologies.parent_seqs.is_empty() {
        return Ok(0);
    }

    sqlx::query(
        r#"INSERT INTO staging_etymologies (
            batch_id, parent_seq, etymology, language_code, uncertain, reconstructed
           )
           SELECT $1, t.* FROM UNNEST(
               $2::int[], $3::text[], $4::text[], $5::bool[], $6::bool[]
           ) AS t (parent_seq, etymology, language_code, uncertain, reconstructed)"#,
    )
    .bind(payload.batch_id)
    .bind(&etymologies.parent_seqs)
    .bind(&etymologies.texts)
    .bind(&etymologies.language_codes)
    .bind(&etymologies.uncertain)
    .bind(&etymologies.reconstructed)
    .execute(&mut **tx)
    .await?;

    log::trace!("staged {} etymologies", etymologies.parent_seqs.len());
    Ok(etymologies.parent_seqs.len())
}
