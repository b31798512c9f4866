//! Five-level text atomizer.
//!
//! # Responsibility
//! - Split extracted document text into paragraph, sentence, word, syllable
//!   and glyph-seed atoms.
//!
//! # Invariants
//! - Ordinals are 1-based and dense per level.
//! - Atomization is a pure function of the text.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::atom::{Atom, AtomLevel};
use crate::model::document::DocumentId;

static PARAGRAPH_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("valid paragraph split regex"));
static SENTENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^.!?]+(?:[.!?]+|$)").expect("valid sentence regex"));
static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{Alphabetic}\p{Nd}']+").expect("valid word regex"));

/// Splits `text` into the unit strings of one level, in reading order.
pub fn split_level(text: &str, level: AtomLevel) -> Vec<String> {
    match level {
        AtomLevel::Paragraph => paragraphs(text).map(str::to_string).collect(),
        AtomLevel::Sentence => paragraphs(text).flat_map(sentences).collect(),
        AtomLevel::Word => words(text).map(str::to_string).collect(),
        AtomLevel::Syllable => words(text).flat_map(syllables).collect(),
        AtomLevel::GlyphSeed => text
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .map(String::from)
            .collect(),
    }
}

/// Atomizes `text` at every level for `document_id`.
pub fn atomize(document_id: DocumentId, text: &str) -> Vec<Atom> {
    AtomLevel::ALL
        .into_iter()
        .flat_map(|level| {
            split_level(text, level)
                .into_iter()
                .zip(1u32..)
                .map(move |(content, ordinal)| Atom::new(document_id, level, ordinal, content))
        })
        .collect()
}

fn paragraphs(text: &str) -> impl Iterator<Item = &str> {
    PARAGRAPH_SPLIT_RE
        .split(text)
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
}

fn sentences(paragraph: &str) -> Vec<String> {
    SENTENCE_RE
        .find_iter(paragraph)
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|sentence| sentence.chars().any(char::is_alphanumeric))
        .collect()
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    WORD_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|word| word.chars().any(|ch| ch != '\''))
}

/// Cuts after each vowel group; trailing consonants join the last chunk.
fn syllables(word: &str) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    let mut chunks = Vec::new();
    let mut current = String::new();

    for (index, ch) in chars.iter().enumerate() {
        current.push(*ch);
        let ends_vowel_group =
            is_vowel(*ch) && chars.get(index + 1).map_or(true, |next| !is_vowel(*next));
        let vowels_follow = chars[index + 1..].iter().any(|next| is_vowel(*next));
        if ends_vowel_group && vowels_follow {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

const VOWELS: &str = "aeiouyàáâäèéêëìíîïòóôöùúûüæœ";

fn is_vowel(ch: char) -> bool {
    VOWELS.contains(ch.to_lowercase().next().unwrap_or(ch))
}

#[cfg(test)]
mod tests {
    use super::{atomize, split_level, syllables};
    use crate::model::atom::{join_atoms, Atom, AtomLevel};
    use uuid::Uuid;

    const TEXT: &str = "The knight rode north. He wrote!\n\n  Winter came   slowly";

    #[test]
    fn paragraphs_split_on_blank_lines() {
        assert_eq!(
            split_level(TEXT, AtomLevel::Paragraph),
            vec!["The knight rode north. He wrote!", "Winter came   slowly"]
        );
    }

    #[test]
    fn sentences_keep_terminators_and_normalize_spacing() {
        assert_eq!(
            split_level(TEXT, AtomLevel::Sentence),
            vec!["The knight rode north.", "He wrote!", "Winter came slowly"]
        );
    }

    #[test]
    fn words_keep_apostrophes() {
        assert_eq!(
            split_level("don't stop, 42 times", AtomLevel::Word),
            vec!["don't", "stop", "42", "times"]
        );
    }

    #[test]
    fn syllables_attach_trailing_consonants() {
        assert_eq!(syllables("knight"), vec!["knight"]);
        assert_eq!(syllables("wrote"), vec!["wro", "te"]);
        assert_eq!(syllables("winter"), vec!["wi", "nter"]);
        assert_eq!(syllables("rhythm"), vec!["rhythm"]);
        assert_eq!(syllables("evening"), vec!["e", "ve", "ning"]);
        assert_eq!(syllables("psst"), vec!["psst"]);
    }

    #[test]
    fn glyph_seeds_skip_whitespace() {
        assert_eq!(split_level("a b\nc", AtomLevel::GlyphSeed), vec!["a", "b", "c"]);
    }

    #[test]
    fn atomize_numbers_each_level_from_one() {
        let doc = Uuid::new_v4();
        let atoms = atomize(doc, TEXT);
        for level in AtomLevel::ALL {
            let ordinals: Vec<u32> = atoms
                .iter()
                .filter(|atom| atom.level == level)
                .map(|atom| atom.ordinal)
                .collect();
            assert!(!ordinals.is_empty());
            assert_eq!(ordinals, (1..=ordinals.len() as u32).collect::<Vec<_>>());
        }

        let words: Vec<Atom> = atoms
            .into_iter()
            .filter(|atom| atom.level == AtomLevel::Word)
            .collect();
        assert_eq!(
            join_atoms(&words),
            "The knight rode north He wrote Winter came slowly"
        );
    }
}
