//! Remix composition engine.
//!
//! # Responsibility
//! - Resolve each remix side to text, preferring atoms at the granularity the
//!   strategy favours.
//! - Recombine the two texts with a seeded strategy and report which atoms
//!   contributed.
//!
//! # Invariants
//! - The RNG is keyed by `(strategy, seed, sha256(source), sha256(target),
//!   atom_levels)`; equal inputs always give equal output.
//! - Both sides must resolve to non-empty text.
//! - `glyph_collide` never emits more than [`GLYPH_COLLIDE_LIMIT`] characters.

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha20Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::digest::sha256_hex;
use crate::merge::interleave_tokens;
use crate::model::atom::{join_atoms, Atom, AtomLevel};
use crate::model::remix::{AtomRef, AtomRole};
use crate::rng::seeded_rng;

/// Upper bound on characters compared by `glyph_collide`.
pub const GLYPH_COLLIDE_LIMIT: usize = 2000;
/// A target paragraph is overlaid when the draw exceeds this.
const OVERLAY_THRESHOLD: f64 = 0.3;
const OVERLAY_PREFIX: &str = "[temporal overlay] ";

static SENTENCE_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+").expect("valid sentence split regex"));
static PARAGRAPH_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("valid paragraph split regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemixStrategy {
    Interleave,
    ThematicBlend,
    TemporalLayer,
    GlyphCollide,
}

impl RemixStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interleave => "interleave",
            Self::ThematicBlend => "thematic_blend",
            Self::TemporalLayer => "temporal_layer",
            Self::GlyphCollide => "glyph_collide",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "interleave" => Some(Self::Interleave),
            "thematic_blend" => Some(Self::ThematicBlend),
            "temporal_layer" => Some(Self::TemporalLayer),
            "glyph_collide" => Some(Self::GlyphCollide),
            _ => None,
        }
    }

    /// Atom levels in the order this strategy prefers them.
    pub fn level_preference(self) -> [AtomLevel; 5] {
        use AtomLevel::{GlyphSeed, Paragraph, Sentence, Syllable, Word};
        match self {
            Self::Interleave => [Word, Syllable, Sentence, Paragraph, GlyphSeed],
            Self::ThematicBlend => [Sentence, Paragraph, Word, Syllable, GlyphSeed],
            Self::TemporalLayer => [Paragraph, Sentence, Word, Syllable, GlyphSeed],
            Self::GlyphCollide => [GlyphSeed, Syllable, Word, Sentence, Paragraph],
        }
    }
}

impl Display for RemixStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemixError {
    /// The given side resolved to empty or whitespace-only text.
    EmptyInput(AtomRole),
}

impl Display for RemixError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyInput(role) => write!(f, "remix {} text is empty", role.as_str()),
        }
    }
}

impl Error for RemixError {}

/// One side of a remix before resolution.
#[derive(Debug, Clone, Default)]
pub struct RemixInput {
    /// Whole extracted or branch text.
    pub text: String,
    /// Atoms available for this side, any levels. Branch inputs have none.
    pub atoms: Vec<Atom>,
}

/// One side after granularity resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInput {
    pub text: String,
    /// `None` when the whole text was used.
    pub level: Option<AtomLevel>,
    pub atoms: Vec<Atom>,
}

/// Picks the most-preferred requested level that has atoms, else falls back
/// to the whole text.
pub fn resolve_input(
    input: &RemixInput,
    strategy: RemixStrategy,
    atom_levels: &[AtomLevel],
) -> ResolvedInput {
    for level in strategy.level_preference() {
        if !atom_levels.contains(&level) {
            continue;
        }
        let mut atoms: Vec<Atom> = input
            .atoms
            .iter()
            .filter(|atom| atom.level == level)
            .cloned()
            .collect();
        if atoms.is_empty() {
            continue;
        }
        atoms.sort_by_key(|atom| atom.ordinal);
        return ResolvedInput {
            text: join_atoms(&atoms),
            level: Some(level),
            atoms,
        };
    }

    ResolvedInput {
        text: input.text.clone(),
        level: None,
        atoms: Vec::new(),
    }
}

/// Sorted, de-duplicated level list used for hashing.
pub fn normalize_levels(atom_levels: &[AtomLevel]) -> Vec<AtomLevel> {
    let mut levels = atom_levels.to_vec();
    levels.sort();
    levels.dedup();
    levels
}

/// Generator for one composition.
pub fn remix_rng(
    strategy: RemixStrategy,
    seed: i64,
    source_text: &str,
    target_text: &str,
    atom_levels: &[AtomLevel],
) -> ChaCha20Rng {
    let levels = normalize_levels(atom_levels)
        .iter()
        .map(|level| level.as_str())
        .collect::<Vec<_>>()
        .join(",");
    seeded_rng(&[
        strategy.as_str(),
        &seed.to_string(),
        &sha256_hex(source_text),
        &sha256_hex(target_text),
        &levels,
    ])
}

/// Recombines two texts with `strategy`.
pub fn apply_strategy<R: Rng + ?Sized>(
    source: &str,
    target: &str,
    strategy: RemixStrategy,
    rng: &mut R,
) -> String {
    match strategy {
        RemixStrategy::Interleave => interleave_tokens(source, target),
        RemixStrategy::ThematicBlend => thematic_blend(source, target, rng),
        RemixStrategy::TemporalLayer => temporal_layer(source, target, rng),
        RemixStrategy::GlyphCollide => glyph_collide(source, target, rng),
    }
}

fn thematic_blend<R: Rng + ?Sized>(source: &str, target: &str, rng: &mut R) -> String {
    let source_sentences = split_sentences(source);
    let target_sentences = split_sentences(target);
    let take = source_sentences.len().max(target_sentences.len()).max(1);

    let mut pool: Vec<&str> = source_sentences
        .into_iter()
        .chain(target_sentences)
        .collect();
    pool.shuffle(rng);
    pool.truncate(take);
    pool.join(". ")
}

fn temporal_layer<R: Rng + ?Sized>(source: &str, target: &str, rng: &mut R) -> String {
    let source_paragraphs = split_paragraphs(source);
    let target_paragraphs = split_paragraphs(target);
    let mut layers = Vec::new();

    for index in 0..source_paragraphs.len().max(target_paragraphs.len()) {
        if let Some(paragraph) = source_paragraphs.get(index) {
            layers.push((*paragraph).to_string());
        }
        if let Some(paragraph) = target_paragraphs.get(index) {
            if rng.gen::<f64>() > OVERLAY_THRESHOLD {
                layers.push(format!("{OVERLAY_PREFIX}{paragraph}"));
            }
        }
    }
    layers.join("\n\n")
}

fn glyph_collide<R: Rng + ?Sized>(source: &str, target: &str, rng: &mut R) -> String {
    let source_glyphs: Vec<char> = source.chars().filter(|ch| !ch.is_whitespace()).collect();
    let target_glyphs: Vec<char> = target.chars().filter(|ch| !ch.is_whitespace()).collect();
    let length = source_glyphs
        .len()
        .max(target_glyphs.len())
        .min(GLYPH_COLLIDE_LIMIT);

    (0..length)
        .filter_map(|index| {
            match (source_glyphs.get(index), target_glyphs.get(index)) {
                (Some(s), Some(t)) if s == t => Some(*s),
                (Some(s), Some(t)) => Some(if rng.gen_bool(0.5) { *s } else { *t }),
                (Some(only), None) | (None, Some(only)) => Some(*only),
                (None, None) => None,
            }
        })
        .collect()
}

fn split_sentences(text: &str) -> Vec<&str> {
    SENTENCE_SPLIT_RE
        .split(text)
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .collect()
}

fn split_paragraphs(text: &str) -> Vec<&str> {
    PARAGRAPH_SPLIT_RE
        .split(text)
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .collect()
}

/// Output of [`compose`].
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub remixed_text: String,
    pub source: ResolvedInput,
    pub target: ResolvedInput,
    /// Source atoms first, then target atoms, each in ordinal order.
    pub atom_refs: Vec<AtomRef>,
}

/// Resolves both sides, seeds the RNG and applies `strategy`.
///
/// # Errors
/// - [`RemixError::EmptyInput`] when either side resolves to blank text.
pub fn compose(
    source: &RemixInput,
    target: &RemixInput,
    strategy: RemixStrategy,
    seed: i64,
    atom_levels: &[AtomLevel],
) -> Result<Composition, RemixError> {
    let source = resolve_input(source, strategy, atom_levels);
    if source.text.trim().is_empty() {
        return Err(RemixError::EmptyInput(AtomRole::Source));
    }
    let target = resolve_input(target, strategy, atom_levels);
    if target.text.trim().is_empty() {
        return Err(RemixError::EmptyInput(AtomRole::Target));
    }

    let mut rng = remix_rng(strategy, seed, &source.text, &target.text, atom_levels);
    let remixed_text = apply_strategy(&source.text, &target.text, strategy, &mut rng);

    let atom_refs = atom_refs(&source.atoms, AtomRole::Source)
        .chain(atom_refs(&target.atoms, AtomRole::Target))
        .collect();

    Ok(Composition {
        remixed_text,
        source,
        target,
        atom_refs,
    })
}

fn atom_refs(atoms: &[Atom], role: AtomRole) -> impl Iterator<Item = AtomRef> + '_ {
    atoms.iter().map(move |atom| AtomRef {
        atom_id: atom.id,
        atom_level: atom.level,
        ordinal: atom.ordinal,
        role,
    })
}

#[cfg(test)]
mod tests {
    use super::{
        apply_strategy, compose, remix_rng, RemixError, RemixInput, RemixStrategy,
        GLYPH_COLLIDE_LIMIT,
    };
    use crate::model::atom::{Atom, AtomLevel};
    use crate::model::remix::AtomRole;
    use crate::rng::seeded_rng;
    use uuid::Uuid;

    fn text_input(text: &str) -> RemixInput {
        RemixInput {
            text: text.to_string(),
            atoms: Vec::new(),
        }
    }

    #[test]
    fn interleave_alternates_source_first() {
        let mut rng = seeded_rng(&["any"]);
        assert_eq!(
            apply_strategy(
                "one two three",
                "alpha beta gamma",
                RemixStrategy::Interleave,
                &mut rng
            ),
            "one alpha two beta gamma three"
        );
    }

    #[test]
    fn glyph_collide_length_is_bounded() {
        let mut rng = seeded_rng(&["any"]);
        let output = apply_strategy("ab cd", "xyz", RemixStrategy::GlyphCollide, &mut rng);
        assert_eq!(output.chars().count(), 4);

        let long = "q".repeat(GLYPH_COLLIDE_LIMIT + 50);
        let output = apply_strategy(&long, "short", RemixStrategy::GlyphCollide, &mut rng);
        assert_eq!(output.chars().count(), GLYPH_COLLIDE_LIMIT);
    }

    #[test]
    fn glyph_collide_passes_identical_chars_through() {
        let mut rng = seeded_rng(&["any"]);
        let output = apply_strategy("same", "same", RemixStrategy::GlyphCollide, &mut rng);
        assert_eq!(output, "same");
    }

    #[test]
    fn thematic_blend_keeps_larger_sentence_count() {
        let mut rng = seeded_rng(&["any"]);
        let output = apply_strategy(
            "One. Two. Three.",
            "Alpha! Beta?",
            RemixStrategy::ThematicBlend,
            &mut rng,
        );
        assert_eq!(output.split(". ").count(), 3);
    }

    #[test]
    fn temporal_layer_keeps_every_source_paragraph_in_order() {
        let mut rng = seeded_rng(&["any"]);
        let output = apply_strategy(
            "first\n\nsecond",
            "overlay one\n\noverlay two",
            RemixStrategy::TemporalLayer,
            &mut rng,
        );
        let first = output.find("first").unwrap();
        let second = output.find("second").unwrap();
        assert!(first < second);
        for paragraph in output.split("\n\n") {
            assert!(
                paragraph == "first"
                    || paragraph == "second"
                    || paragraph.starts_with("[temporal overlay] overlay")
            );
        }
    }

    #[test]
    fn compose_is_deterministic() {
        let source = text_input("the old tale of the sea. a ship sails.");
        let target = text_input("stars burn. rivers run. winds turn.");
        let first = compose(&source, &target, RemixStrategy::ThematicBlend, 9, &[]).unwrap();
        let second = compose(&source, &target, RemixStrategy::ThematicBlend, 9, &[]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rng_depends_on_levels() {
        use rand::Rng;
        let a: u64 = remix_rng(RemixStrategy::Interleave, 1, "s", "t", &[]).gen();
        let b: u64 =
            remix_rng(RemixStrategy::Interleave, 1, "s", "t", &[AtomLevel::Word]).gen();
        assert_ne!(a, b);
    }

    #[test]
    fn compose_prefers_strategy_level_and_records_refs() {
        let doc = Uuid::new_v4();
        let source = RemixInput {
            text: "ignored whole text".to_string(),
            atoms: vec![
                Atom::new(doc, AtomLevel::Word, 2, "beta"),
                Atom::new(doc, AtomLevel::Word, 1, "alpha"),
                Atom::new(doc, AtomLevel::Sentence, 1, "alpha beta."),
            ],
        };
        let target = text_input("gamma delta");
        let composition = compose(
            &source,
            &target,
            RemixStrategy::Interleave,
            0,
            &[AtomLevel::Sentence, AtomLevel::Word],
        )
        .unwrap();

        assert_eq!(composition.source.level, Some(AtomLevel::Word));
        assert_eq!(composition.target.level, None);
        assert_eq!(composition.remixed_text, "alpha gamma beta delta");
        let ordinals: Vec<u32> = composition.atom_refs.iter().map(|r| r.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2]);
        assert!(composition
            .atom_refs
            .iter()
            .all(|r| r.role == AtomRole::Source));
    }

    #[test]
    fn empty_side_is_rejected() {
        let err = compose(
            &text_input("words"),
            &text_input("   "),
            RemixStrategy::Interleave,
            0,
            &[],
        )
        .unwrap_err();
        assert_eq!(err, RemixError::EmptyInput(AtomRole::Target));
    }
}
