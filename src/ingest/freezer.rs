//! Freezing sealed batches into immutable snapshots.
//!
//! The snapshot a flush works from must be detached from any buffer a
//! producer could still reach. `freeze` therefore deep-copies every record
//! (scalars by value, every child sequence element by element) and assigns
//! each record its batch-local sequence identifier before anything
//! downstream reads it.

use crate::ingest::queue::SealedBatch;
use crate::ingest::record::EntryRecord;
use uuid::Uuid;

/// One record inside a frozen batch, tagged with its 1-based position.
#[derive(Debug, Clone)]
pub struct FrozenRecord {
    seq: i32,
    record: EntryRecord,
}

impl FrozenRecord {
    /// Batch-local sequence identifier: contiguous 1..=N, unique within the
    /// batch, stable for the lifetime of the flush.
    pub fn seq(&self) -> i32 {
        self.seq
    }

    pub fn record(&self) -> &EntryRecord {
        &self.record
    }
}

/// Immutable deep copy of a sealed batch.
///
/// No field changes after creation; mutating the producer's buffer after
/// freezing never affects a frozen batch already queued for dispatch.
#[derive(Debug)]
pub struct FrozenBatch {
    batch_id: Uuid,
    records: Vec<FrozenRecord>,
}

impl FrozenBatch {
    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    pub fn records(&self) -> &[FrozenRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Deep-copy a sealed batch and assign sequence identifiers 1..=N in the
/// original append order.
///
/// Two freezes never share owned storage: `EntryRecord::clone` reallocates
/// every child `Vec` and `String`.
pub fn freeze(sealed: &SealedBatch) -> FrozenBatch {
    let records = sealed
        .records
        .iter()
        .enumerate()
        .map(|(index, record)| FrozenRecord {
            seq: index as i32 + 1,
            record: record.clone(),
        })
        .collect();

    FrozenBatch {
        batch_id: Uuid::new_v4(),
        records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::record::RefKind;

    fn sealed(n: usize) -> SealedBatch {
        let records = (0..n)
            .map(|i| {
                let mut rec =
                    EntryRecord::new(i as i64, format!("word {}", i), "definition", 1, "src");
                rec.push_alias(format!("alias {}", i));
                rec.push_cross_reference("other", Some(RefKind::Compare));
                rec
            })
            .collect();
        SealedBatch::new(records)
    }

    #[test]
    fn sequence_identifiers_are_contiguous_from_one() {
        let frozen = freeze(&sealed(5));

        let seqs: Vec<i32> = frozen.records().iter().map(|r| r.seq()).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn mutating_source_after_freeze_leaves_snapshot_untouched() {
        let mut source = sealed(2);
        let frozen = freeze(&source);

        source.records[0].aliases.push("late alias".to_string());
        source.records[1].definition.push_str(" amended");
        source.records.clear();

        assert_eq!(frozen.len(), 2);
        assert_eq!(frozen.records()[0].record().aliases, vec!["alias 0"]);
        assert_eq!(frozen.records()[1].record().definition, "definition");
    }

    #[test]
    fn distinct_freezes_share_no_storage() {
        let source = sealed(1);
        let first = freeze(&source);
        let second = freeze(&source);

        assert_ne!(first.batch_id(), second.batch_id());
        assert_ne!(
            first.records()[0].record().aliases.as_ptr(),
            second.records()[0].record().aliases.as_ptr()
        );
    }

    #[test]
    fn empty_batch_freezes_empty() {
        let frozen = freeze(&SealedBatch::new(Vec::new()));
        assert!(frozen.is_empty());
    }
}
