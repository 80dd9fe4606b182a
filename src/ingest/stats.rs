//! Ingestion metrics.

use chrono::{DateTime, Utc};

/// Row counts for dispatched batches.
///
/// Tracks rows landed in staging across all related tables, plus batches
/// whose dispatch failed and was discarded.
#[derive(Debug, Clone, Default)]
pub struct DispatchStats {
    pub batches: usize,
    pub entries: usize,
    pub aliases: usize,
    pub synonyms: usize,
    pub examples: usize,
    pub cross_references: usize,
    pub etymologies: usize,
    pub failures: usize,
}

impl DispatchStats {
    /// Merge another `DispatchStats` into this one by summing all counts.
    pub fn merge(&mut self, other: DispatchStats) {
        self.batches += other.batches;
        self.entries += other.entries;
        self.aliases += other.aliases;
        self.synonyms += other.synonyms;
        self.examples += other.examples;
        self.cross_references += other.cross_references;
        self.etymologies += other.etymologies;
        self.failures += other.failures;
    }
}

/// Outcome of one staging-to-production merge, scoped to a single source.
#[derive(Debug, Clone)]
pub struct MergeReport {
    pub source_code: String,
    pub started_at: DateTime<Utc>,
    /// Staged rows considered by this merge.
    pub staged_total: i64,
    /// Distinct (source, key, sense) triples among them.
    pub unique_keys: i64,
    pub duplicates: i64,
    /// Production entries inserted (conflicts are skipped, not counted).
    pub inserted: u64,
    /// Staged parent rows cleared after promotion.
    pub cleared: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_sums_all_counts() {
        let mut total = DispatchStats {
            batches: 1,
            entries: 10,
            aliases: 2,
            synonyms: 0,
            examples: 3,
            cross_references: 1,
            etymologies: 0,
            failures: 0,
        };
        total.merge(DispatchStats {
            batches: 2,
            entries: 5,
            aliases: 1,
            synonyms: 4,
            examples: 0,
            cross_references: 0,
            etymologies: 2,
            failures: 1,
        });

        assert_eq!(total.batches, 3);
        assert_eq!(total.entries, 15);
        assert_eq!(total.aliases, 3);
        assert_eq!(total.synonyms, 4);
        assert_eq!(total.examples, 3);
        assert_eq!(total.etymologies, 2);
        assert_eq!(total.failures, 1);
    }
}
