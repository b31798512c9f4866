//! Atom domain model.
//!
//! # Responsibility
//! - Define the five-level text granularity shared by ingest and remix.
//! - Own the per-level concatenation rule used to rebuild text from atoms.
//!
//! # Invariants
//! - `ordinal` is 1-based and dense within one `(document, level)` pair.
//! - Level ordering is smallest-to-largest: glyph-seed < syllable < word <
//!   sentence < paragraph.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

use crate::model::document::DocumentId;

/// Stable identifier for one atom row.
pub type AtomId = Uuid;

/// Granularity of an atom.
///
/// Variant declaration order is the granularity order, so `Ord` compares
/// levels by size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtomLevel {
    /// One non-whitespace character.
    GlyphSeed,
    Syllable,
    Word,
    Sentence,
    /// Blank-line delimited block.
    Paragraph,
}

impl AtomLevel {
    /// All levels, smallest first.
    pub const ALL: [AtomLevel; 5] = [
        AtomLevel::GlyphSeed,
        AtomLevel::Syllable,
        AtomLevel::Word,
        AtomLevel::Sentence,
        AtomLevel::Paragraph,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GlyphSeed => "glyph_seed",
            Self::Syllable => "syllable",
            Self::Word => "word",
            Self::Sentence => "sentence",
            Self::Paragraph => "paragraph",
        }
    }

    /// Parses a level name; accepts `glyph-seed` as well as `glyph_seed`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "glyph_seed" => Some(Self::GlyphSeed),
            "syllable" => Some(Self::Syllable),
            "word" => Some(Self::Word),
            "sentence" => Some(Self::Sentence),
            "paragraph" => Some(Self::Paragraph),
            _ => None,
        }
    }

    /// Separator used when joining atoms of this level back into text.
    pub fn separator(self) -> &'static str {
        match self {
            Self::GlyphSeed => "",
            Self::Syllable | Self::Word | Self::Sentence => " ",
            Self::Paragraph => "\n\n",
        }
    }
}

impl Display for AtomLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered unit of a document at one granularity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Atom {
    pub id: AtomId,
    pub document_id: DocumentId,
    pub level: AtomLevel,
    /// 1-based position within `(document_id, level)`.
    pub ordinal: u32,
    pub content: String,
}

impl Atom {
    pub fn new(
        document_id: DocumentId,
        level: AtomLevel,
        ordinal: u32,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            level,
            ordinal,
            content: content.into(),
        }
    }
}

/// Joins atoms of one level in ordinal order using the level separator.
///
/// Callers pass atoms of a single level; mixed input is joined with the
/// separator of the first atom's level.
pub fn join_atoms(atoms: &[Atom]) -> String {
    let Some(first) = atoms.first() else {
        return String::new();
    };
    let mut ordered: Vec<&Atom> = atoms.iter().collect();
    ordered.sort_by_key(|atom| atom.ordinal);
    ordered
        .iter()
        .map(|atom| atom.content.as_str())
        .collect::<Vec<_>>()
        .join(first.level.separator())
}

#[cfg(test)]
mod tests {
    use super::{join_atoms, Atom, AtomLevel};
    use uuid::Uuid;

    #[test]
    fn levels_order_smallest_to_largest() {
        assert!(AtomLevel::GlyphSeed < AtomLevel::Syllable);
        assert!(AtomLevel::Sentence < AtomLevel::Paragraph);
        assert_eq!(AtomLevel::ALL.iter().max(), Some(&AtomLevel::Paragraph));
    }

    #[test]
    fn parse_accepts_hyphenated_glyph_seed() {
        assert_eq!(AtomLevel::parse("Glyph-Seed"), Some(AtomLevel::GlyphSeed));
        assert_eq!(AtomLevel::parse("stanza"), None);
    }

    #[test]
    fn join_uses_level_separator_and_ordinal_order() {
        let doc = Uuid::new_v4();
        let paragraphs = vec![
            Atom::new(doc, AtomLevel::Paragraph, 2, "second"),
            Atom::new(doc, AtomLevel::Paragraph, 1, "first"),
        ];
        assert_eq!(join_atoms(&paragraphs), "first\n\nsecond");

        let glyphs = vec![
            Atom::new(doc, AtomLevel::GlyphSeed, 1, "a"),
            Atom::new(doc, AtomLevel::GlyphSeed, 2, "b"),
        ];
        assert_eq!(join_atoms(&glyphs), "ab");
    }
}
