//! Text merge strategies and conflict diagnostics.
//!
//! # Invariants
//! - `conflict_semantics` is diagnostic only; it never feeds back into the
//!   merged text.
//! - `interleave` alternates whitespace tokens left-first and then appends
//!   the longer side's remainder.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use crate::digest::sha256_hex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    LeftWins,
    RightWins,
    Interleave,
}

impl MergeStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LeftWins => "left_wins",
            Self::RightWins => "right_wins",
            Self::Interleave => "interleave",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "left_wins" => Some(Self::LeftWins),
            "right_wins" => Some(Self::RightWins),
            "interleave" => Some(Self::Interleave),
            _ => None,
        }
    }

    fn resolution(self) -> &'static str {
        match self {
            Self::LeftWins => "left_preferred",
            Self::RightWins => "right_preferred",
            Self::Interleave => "interleaved",
        }
    }
}

impl Display for MergeStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Word and character counts of one text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStats {
    pub words: usize,
    pub chars: usize,
}

impl TextStats {
    fn of(text: &str) -> Self {
        Self {
            words: text.split_whitespace().count(),
            chars: text.chars().count(),
        }
    }
}

/// Diagnostic metadata recorded with every merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictSemantics {
    /// `identical_inputs`, `left_preferred`, `right_preferred` or `interleaved`.
    pub resolution: String,
    pub strategy: MergeStrategy,
    pub left: TextStats,
    pub right: TextStats,
    pub merged: TextStats,
    pub shared_words: usize,
    pub left_only_words: usize,
    pub right_only_words: usize,
    pub common_prefix_chars: usize,
    pub common_suffix_chars: usize,
}

pub fn merge_texts(left: &str, right: &str, strategy: MergeStrategy) -> String {
    match strategy {
        MergeStrategy::LeftWins => left.to_string(),
        MergeStrategy::RightWins => right.to_string(),
        MergeStrategy::Interleave => interleave_tokens(left, right),
    }
}

/// Alternates whitespace tokens, `first` leading, then the longer remainder.
pub fn interleave_tokens(first: &str, second: &str) -> String {
    let first: Vec<&str> = first.split_whitespace().collect();
    let second: Vec<&str> = second.split_whitespace().collect();
    let mut tokens = Vec::with_capacity(first.len() + second.len());
    for index in 0..first.len().max(second.len()) {
        if let Some(token) = first.get(index) {
            tokens.push(*token);
        }
        if let Some(token) = second.get(index) {
            tokens.push(*token);
        }
    }
    tokens.join(" ")
}

pub fn conflict_semantics(
    left: &str,
    right: &str,
    merged: &str,
    strategy: MergeStrategy,
) -> ConflictSemantics {
    let resolution = if sha256_hex(left) == sha256_hex(right) {
        "identical_inputs"
    } else {
        strategy.resolution()
    };

    let left_words: BTreeSet<&str> = left.split_whitespace().collect();
    let right_words: BTreeSet<&str> = right.split_whitespace().collect();
    let shared_words = left_words.intersection(&right_words).count();

    let left_chars: Vec<char> = left.chars().collect();
    let right_chars: Vec<char> = right.chars().collect();
    let common_prefix_chars = left_chars
        .iter()
        .zip(&right_chars)
        .take_while(|(a, b)| a == b)
        .count();
    // Suffix may not reuse characters already counted in the prefix.
    let suffix_budget = left_chars.len().min(right_chars.len()) - common_prefix_chars;
    let common_suffix_chars = left_chars
        .iter()
        .rev()
        .zip(right_chars.iter().rev())
        .take(suffix_budget)
        .take_while(|(a, b)| a == b)
        .count();

    ConflictSemantics {
        resolution: resolution.to_string(),
        strategy,
        left: TextStats::of(left),
        right: TextStats::of(right),
        merged: TextStats::of(merged),
        shared_words,
        left_only_words: left_words.len() - shared_words,
        right_only_words: right_words.len() - shared_words,
        common_prefix_chars,
        common_suffix_chars,
    }
}

#[cfg(test)]
mod tests {
    use super::{conflict_semantics, merge_texts, MergeStrategy};

    #[test]
    fn interleave_continues_with_longer_side() {
        assert_eq!(
            merge_texts("one two", "alpha beta gamma", MergeStrategy::Interleave),
            "one alpha two beta gamma"
        );
    }

    #[test]
    fn winner_strategies_discard_other_side() {
        assert_eq!(merge_texts("l", "r", MergeStrategy::LeftWins), "l");
        assert_eq!(merge_texts("l", "r", MergeStrategy::RightWins), "r");
    }

    #[test]
    fn identical_inputs_are_labelled() {
        let semantics = conflict_semantics(
            "same text",
            "same text",
            "same text",
            MergeStrategy::RightWins,
        );
        assert_eq!(semantics.resolution, "identical_inputs");
        assert_eq!(semantics.common_prefix_chars, 9);
        assert_eq!(semantics.common_suffix_chars, 0);
    }

    #[test]
    fn word_sets_and_affixes_are_reported() {
        let merged = merge_texts("the red fox", "the blue fox", MergeStrategy::Interleave);
        let semantics = conflict_semantics(
            "the red fox",
            "the blue fox",
            &merged,
            MergeStrategy::Interleave,
        );
        assert_eq!(semantics.resolution, "interleaved");
        assert_eq!(semantics.shared_words, 2);
        assert_eq!(semantics.left_only_words, 1);
        assert_eq!(semantics.right_only_words, 1);
        assert_eq!(semantics.common_prefix_chars, 4);
        assert_eq!(semantics.common_suffix_chars, 4);
        assert_eq!(semantics.merged.words, 6);
    }
}
