//! Projection of frozen batches into columnar bulk-insert payloads.
//!
//! Each structure holds prepared data in parallel vectors (columnar format)
//! matching the staging tables' UNNEST insert statements. All vectors of a
//! structure have the same length; each index is one row. Optional columns
//! are `Vec<Option<T>>` so an absent value stays distinct from an empty
//! string all the way into SQL.

use crate::ingest::freezer::FrozenBatch;
use crate::ingest::record::RefKind;
use uuid::Uuid;

/// Parent rows: one per record, keyed by the batch-local sequence id.
#[derive(Default)]
pub struct EntryRows {
    pub seqs: Vec<i32>,
    pub source_codes: Vec<String>,
    pub parent_entry_ids: Vec<i64>,
    pub parent_sense_ids: Vec<Option<i64>>,
    pub normalized_keys: Vec<String>,
    pub sense_numbers: Vec<i32>,
    pub titles: Vec<String>,
    pub definitions: Vec<String>,
    pub raw_fragments: Vec<String>,
    pub domain_labels: Vec<Option<String>>,
    pub usage_labels: Vec<Option<String>>,
    pub has_foreign_texts: Vec<bool>,
    pub foreign_text_refs: Vec<Option<String>>,
}

#[derive(Default)]
pub struct AliasRows {
    pub parent_seqs: Vec<i32>,
    pub aliases: Vec<String>,
}

#[derive(Default)]
pub struct SynonymRows {
    pub parent_seqs: Vec<i32>,
    pub synonyms: Vec<String>,
}

#[derive(Default)]
pub struct ExampleRows {
    pub parent_seqs: Vec<i32>,
    pub examples: Vec<String>,
}

#[derive(Default)]
pub struct CrossReferenceRows {
    pub parent_seqs: Vec<i32>,
    pub target_words: Vec<String>,
    pub kinds: Vec<String>,
}

#[derive(Default)]
pub struct EtymologyRows {
    pub parent_seqs: Vec<i32>,
    pub texts: Vec<String>,
    pub language_codes: Vec<String>,
    pub uncertain: Vec<bool>,
    pub reconstructed: Vec<bool>,
}

/// The flat tables derived from one frozen batch.
///
/// Built once per batch, consumed once by the dispatcher, then discarded.
pub struct RelationalPayload {
    pub batch_id: Uuid,
    pub entries: EntryRows,
    pub aliases: AliasRows,
    pub synonyms: SynonymRows,
    pub examples: ExampleRows,
    pub cross_references: CrossReferenceRows,
    pub etymologies: EtymologyRows,
}

/// Project a frozen batch into its relational payload. Pure and
/// deterministic: no I/O, row order follows the batch's sequence order.
pub fn build_payload(frozen: &FrozenBatch) -> RelationalPayload {
    let mut entries = EntryRows::default();
    let mut aliases = AliasRows::default();
    let mut synonyms = SynonymRows::default();
    let mut examples = ExampleRows::default();
    let mut cross_references = CrossReferenceRows::default();
    let mut etymologies = EtymologyRows::default();

    for frozen_record in frozen.records() {
        let seq = frozen_record.seq();
        let record = frozen_record.record();

        entries.seqs.push(seq);
        entries.source_codes.push(record.source_code.clone());
        entries.parent_entry_ids.push(record.parent_entry_id);
        entries.parent_sense_ids.push(record.parent_sense_id);
        entries.normalized_keys.push(record.normalized_key.clone());
        entries.sense_numbers.push(record.sense_number);
        entries.titles.push(record.title.clone());
        entries.definitions.push(record.definition.clone());
        entries.raw_fragments.push(record.raw_fragment.clone());
        entries.domain_labels.push(record.domain_label.clone());
        entries.usage_labels.push(record.usage_label.clone());
        entries.has_foreign_texts.push(record.has_foreign_text);
        entries
            .foreign_text_refs
            .push(record.foreign_text_ref.clone());

        for alias in &record.aliases {
            aliases.parent_seqs.push(seq);
            aliases.aliases.push(alias.clone());
        }
        for synonym in &record.synonyms {
            synonyms.parent_seqs.push(seq);
            synonyms.synonyms.push(synonym.clone());
        }
        for example in &record.examples {
            examples.parent_seqs.push(seq);
            examples.examples.push(example.clone());
        }
        for reference in &record.cross_references {
            cross_references.parent_seqs.push(seq);
            cross_references
                .target_words
                .push(reference.target_word.clone());
            cross_references
                .kinds
                .push(reference.kind.unwrap_or(RefKind::See).as_str().to_string());
        }
        for etymology in &record.etymologies {
            etymologies.parent_seqs.push(seq);
            etymologies.texts.push(etymology.text.clone());
            etymologies
                .language_codes
                .push(etymology.language_code.clone());
            etymologies.uncertain.push(etymology.uncertain);
            etymologies.reconstructed.push(etymology.reconstructed);
        }
    }

    RelationalPayload {
        batch_id: frozen.batch_id(),
        entries,
        aliases,
        synonyms,
        examples,
        cross_references,
        etymologies,
    }
}
