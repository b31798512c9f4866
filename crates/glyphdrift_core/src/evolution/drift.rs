//! Sound-shift tables for `natural_drift` and `reverse_drift`.
//!
//! # Invariants
//! - Forward rules apply in table order, each as a full pass over the text.
//! - Reverse rules apply in one left-to-right pass, longest pattern first,
//!   table order breaking ties. Replacement output is never rescanned.
//! - Matching is case-insensitive; a capitalized match yields a capitalized
//!   replacement.
//! - The reverse table is lossy: `n`, `r`, `k`, `u` and `i` have no inverse,
//!   and `æ` always restores `ea` even when it came from `ae`.

/// `(pattern, replacement)` pairs applied in order by `natural_drift`.
pub const NATURAL_DRIFT_RULES: &[(&str, &str)] = &[
    ("th", "þ"),
    ("ph", "f"),
    ("kn", "n"),
    ("wr", "r"),
    ("gh", "ȝ"),
    ("tion", "ʃon"),
    ("sh", "ʃ"),
    ("ch", "ç"),
    ("ck", "k"),
    ("qu", "kw"),
    ("wh", "hw"),
    ("ee", "ē"),
    ("oo", "ō"),
    ("ea", "æ"),
    ("ae", "æ"),
    ("ou", "ū"),
    ("ng", "ŋ"),
    ("ai", "ǣ"),
    ("ie", "ī"),
    ("ss", "ſ"),
    ("ll", "ł"),
    ("w", "ƿ"),
    ("x", "ks"),
    ("v", "u"),
    ("j", "i"),
];

/// `(pattern, replacement)` pairs used by `reverse_drift`.
pub const REVERSE_DRIFT_RULES: &[(&str, &str)] = &[
    ("þ", "th"),
    ("f", "ph"),
    ("ȝ", "gh"),
    ("ʃon", "tion"),
    ("ʃ", "sh"),
    ("ç", "ch"),
    ("kw", "qu"),
    ("hw", "wh"),
    ("ē", "ee"),
    ("ō", "oo"),
    ("æ", "ea"),
    ("ū", "ou"),
    ("ŋ", "ng"),
    ("ǣ", "ai"),
    ("ī", "ie"),
    ("ſ", "ss"),
    ("ł", "ll"),
    ("ƿ", "w"),
    ("ks", "x"),
];

/// Count of one rule's replacements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleHit {
    pub pattern: &'static str,
    pub replacement: &'static str,
    pub count: usize,
}

/// Result of a drift pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftResult {
    pub text: String,
    pub hits: Vec<RuleHit>,
    /// Forward: matches that consumed characters produced by an earlier rule.
    /// Reverse: replacements whose glyph has more than one forward source.
    pub collisions: usize,
}

impl DriftResult {
    pub fn replacements(&self) -> usize {
        self.hits.iter().map(|hit| hit.count).sum()
    }
}

/// Applies [`NATURAL_DRIFT_RULES`] in order.
pub fn drift_forward(text: &str) -> DriftResult {
    let mut chars: Vec<char> = text.chars().collect();
    let mut drifted = vec![false; chars.len()];
    let mut hits = Vec::new();
    let mut collisions = 0;

    for &(pattern, replacement) in NATURAL_DRIFT_RULES {
        let folded: Vec<char> = pattern.chars().collect();
        let mut next_chars = Vec::with_capacity(chars.len());
        let mut next_drifted = Vec::with_capacity(chars.len());
        let mut count = 0;
        let mut index = 0;

        while index < chars.len() {
            if matches_at(&chars, index, &folded) {
                let span = index..index + folded.len();
                if drifted[span.clone()].iter().any(|flag| *flag) {
                    collisions += 1;
                }
                for ch in cased(replacement, chars[index].is_uppercase()) {
                    next_chars.push(ch);
                    next_drifted.push(true);
                }
                count += 1;
                index = span.end;
            } else {
                next_chars.push(chars[index]);
                next_drifted.push(drifted[index]);
                index += 1;
            }
        }

        chars = next_chars;
        drifted = next_drifted;
        if count > 0 {
            hits.push(RuleHit {
                pattern,
                replacement,
                count,
            });
        }
    }

    DriftResult {
        text: chars.into_iter().collect(),
        hits,
        collisions,
    }
}

/// Applies [`REVERSE_DRIFT_RULES`] in a single longest-first pass.
pub fn drift_reverse(text: &str) -> DriftResult {
    let mut rules: Vec<(Vec<char>, &'static str, &'static str)> = REVERSE_DRIFT_RULES
        .iter()
        .map(|&(pattern, replacement)| (pattern.chars().collect(), pattern, replacement))
        .collect();
    // Stable sort keeps table order among equal lengths.
    rules.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let chars: Vec<char> = text.chars().collect();
    let mut output = String::with_capacity(text.len());
    let mut counts = vec![0usize; rules.len()];
    let mut collisions = 0;
    let mut index = 0;

    while index < chars.len() {
        let matched = rules
            .iter()
            .position(|(folded, _, _)| matches_at(&chars, index, folded));
        match matched {
            Some(rule_index) => {
                let (folded, pattern, replacement) = &rules[rule_index];
                output.extend(cased(replacement, chars[index].is_uppercase()));
                counts[rule_index] += 1;
                if forward_sources(pattern) > 1 {
                    collisions += 1;
                }
                index += folded.len();
            }
            None => {
                output.push(chars[index]);
                index += 1;
            }
        }
    }

    // Report hits in table order, not match-priority order.
    let hits = REVERSE_DRIFT_RULES
        .iter()
        .filter_map(|&(pattern, replacement)| {
            let rule_index = rules.iter().position(|(_, p, _)| *p == pattern)?;
            let count = counts[rule_index];
            (count > 0).then_some(RuleHit {
                pattern,
                replacement,
                count,
            })
        })
        .collect();

    DriftResult {
        text: output,
        hits,
        collisions,
    }
}

fn forward_sources(glyph: &str) -> usize {
    NATURAL_DRIFT_RULES
        .iter()
        .filter(|(_, replacement)| *replacement == glyph)
        .count()
}

fn matches_at(haystack: &[char], index: usize, folded_pattern: &[char]) -> bool {
    index + folded_pattern.len() <= haystack.len()
        && folded_pattern
            .iter()
            .zip(&haystack[index..])
            .all(|(expected, actual)| fold(*actual) == *expected)
}

fn fold(ch: char) -> char {
    ch.to_lowercase().next().unwrap_or(ch)
}

fn cased(replacement: &str, capitalize: bool) -> Vec<char> {
    let mut chars = replacement.chars();
    match chars.next() {
        Some(first) if capitalize => first.to_uppercase().chain(chars).collect(),
        _ => replacement.chars().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::{drift_forward, drift_reverse, NATURAL_DRIFT_RULES};

    #[test]
    fn forward_table_has_expected_size() {
        assert_eq!(NATURAL_DRIFT_RULES.len(), 25);
    }

    #[test]
    fn forward_drift_shifts_knight() {
        let result = drift_forward("the knight wrote");
        assert_eq!(result.text, "þe niȝt rote");
        assert_eq!(result.replacements(), 4);
        assert_eq!(result.collisions, 0);
    }

    #[test]
    fn forward_drift_preserves_capitalization() {
        assert_eq!(drift_forward("Think").text, "Þink");
    }

    #[test]
    fn later_rule_over_drifted_output_counts_collision() {
        // "wh" -> "hw", then "w" -> "ƿ" rewrites the produced "w".
        let result = drift_forward("whale");
        assert_eq!(result.text, "hƿale");
        assert_eq!(result.collisions, 1);
    }

    #[test]
    fn reverse_drift_is_lossy() {
        assert_eq!(drift_reverse("fun").text, "phun");
        assert_eq!(drift_reverse(&drift_forward("the phone").text).text, "the phone");
    }

    #[test]
    fn reverse_drift_prefers_longest_pattern() {
        assert_eq!(drift_reverse("naʃon").text, "nation");
        assert_eq!(drift_reverse("ʃks").text, "shx");
    }

    #[test]
    fn reverse_drift_counts_ambiguous_glyphs() {
        let result = drift_reverse("æ");
        assert_eq!(result.text, "ea");
        assert_eq!(result.collisions, 1);
    }
}
