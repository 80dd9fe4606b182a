//! Parsed dictionary records pending persistence.
//!
//! An [`EntryRecord`] is the unit of work flowing through the ingestion
//! pipeline: one parsed dictionary sense plus its nested child data. Records
//! arrive from the parsing pipelines with their foreign keys already
//! resolved; this module only models them and derives the natural key used
//! for staging deduplication.

use serde::{Deserialize, Serialize};

/// Classification of a cross-reference between dictionary entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    See,
    Synonym,
    Antonym,
    Compare,
    Variant,
}

impl RefKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefKind::See => "see",
            RefKind::Synonym => "synonym",
            RefKind::Antonym => "antonym",
            RefKind::Compare => "compare",
            RefKind::Variant => "variant",
        }
    }
}

/// A pointer from one entry to another word.
///
/// Parsers frequently emit bare targets without a classification; the
/// payload builder renders a missing kind as the generic `see` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossReference {
    pub target_word: String,
    pub kind: Option<RefKind>,
}

/// Origin note attached to an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Etymology {
    pub text: String,
    pub language_code: String,
    pub uncertain: bool,
    pub reconstructed: bool,
}

/// One parsed dictionary record plus its nested child collections.
///
/// Child sequences are append-only and owned exclusively by the record until
/// a batch is frozen. Appends go through the collector, which only ever
/// amends the most recently added record of a producer's buffer (the
/// "current record" cursor of a streaming parser).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    /// Already-resolved foreign key of the owning dictionary entry.
    pub parent_entry_id: i64,
    pub parent_sense_id: Option<i64>,
    pub title: String,
    /// Natural-key form of the title; see [`normalize_key`].
    pub normalized_key: String,
    pub definition: String,
    /// Raw source fragment the record was parsed from.
    pub raw_fragment: String,
    pub sense_number: i32,
    pub domain_label: Option<String>,
    pub usage_label: Option<String>,
    pub has_foreign_text: bool,
    /// Reference to externally stored non-English text, if any.
    pub foreign_text_ref: Option<String>,
    /// Tag identifying which import source produced the record.
    pub source_code: String,

    pub aliases: Vec<String>,
    pub synonyms: Vec<String>,
    pub examples: Vec<String>,
    pub cross_references: Vec<CrossReference>,
    pub etymologies: Vec<Etymology>,
}

impl EntryRecord {
    /// Create a record with the scalar fields every source provides.
    ///
    /// The normalized key is derived from the title; callers whose parsers
    /// pre-normalize may overwrite `normalized_key` afterwards.
    pub fn new(
        parent_entry_id: i64,
        title: impl Into<String>,
        definition: impl Into<String>,
        sense_number: i32,
        source_code: impl Into<String>,
    ) -> Self {
        let title = title.into();
        let normalized_key = normalize_key(&title);

        Self {
            parent_entry_id,
            parent_sense_id: None,
            title,
            normalized_key,
            definition: definition.into(),
            raw_fragment: String::new(),
            sense_number,
            domain_label: None,
            usage_label: None,
            has_foreign_text: false,
            foreign_text_ref: None,
            source_code: source_code.into(),
            aliases: Vec::new(),
            synonyms: Vec::new(),
            examples: Vec::new(),
            cross_references: Vec::new(),
            etymologies: Vec::new(),
        }
    }

    pub fn push_alias(&mut self, alias: impl Into<String>) {
        self.aliases.push(alias.into());
    }

    pub fn push_synonym(&mut self, synonym: impl Into<String>) {
        self.synonyms.push(synonym.into());
    }

    pub fn push_example(&mut self, example: impl Into<String>) {
        self.examples.push(example.into());
    }

    pub fn push_cross_reference(&mut self, target_word: impl Into<String>, kind: Option<RefKind>) {
        self.cross_references.push(CrossReference {
            target_word: target_word.into(),
            kind,
        });
    }

    pub fn push_etymology(&mut self, etymology: Etymology) {
        self.etymologies.push(etymology);
    }
}

/// Derive the natural key a title stages under: trimmed, casefolded,
/// inner whitespace collapsed to single spaces.
///
/// Full linguistic normalization happens upstream; this only guarantees a
/// stable key when a parser hands over raw titles.
pub fn normalize_key(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
