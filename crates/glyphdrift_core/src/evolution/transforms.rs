//! Transform bodies. Each returns `(output_text, diff_summary)`; common
//! fields (`event_type`, `seed`, hashes) are added by the caller.

use once_cell::sync::Lazy;
use rand::Rng;
use rand_chacha::ChaCha20Rng;
use regex::{Captures, Regex};
use serde_json::{json, Value};

use super::drift::{drift_forward, drift_reverse, DriftResult};
use super::Phase;

static ALPHA_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\p{Alphabetic}+").expect("valid alphabetic token regex"));
static SEGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\S+|\s+").expect("valid segment regex"));

/// Elder futhark runes used as mutation replacements.
const MUTATION_GLYPHS: &[&str] = &[
    "ᚠ", "ᚢ", "ᚦ", "ᚨ", "ᚱ", "ᚲ", "ᚷ", "ᚹ", "ᚺ", "ᚾ", "ᛁ", "ᛃ", "ᛇ", "ᛈ", "ᛉ", "ᛊ", "ᛏ",
    "ᛒ", "ᛖ", "ᛗ", "ᛚ", "ᛜ", "ᛞ", "ᛟ",
];
const PEAK_WORDS: &[&str] = &["ZENITH", "BLAZE", "CROWN", "APEX", "SURGE"];
const MYTHIC_WORDS: &[&str] = &["myth", "omen", "echo", "saga", "rune", "dawn", "ember", "tide"];

const COMPRESSION_VOWEL_DROP: f64 = 0.5;
const REBIRTH_VOWEL_DROP: f64 = 0.25;
const PEAK_INSERTION: f64 = 0.15;
const EXPANSION_BASE_INTERVAL: f64 = 6.0;

pub(super) fn natural_drift(text: &str) -> (String, Value) {
    let result = drift_forward(text);
    let summary = drift_summary(&result, "collisions");
    (result.text, summary)
}

pub(super) fn reverse_drift(text: &str) -> (String, Value) {
    let result = drift_reverse(text);
    let summary = drift_summary(&result, "ambiguous_replacements");
    (result.text, summary)
}

fn drift_summary(result: &DriftResult, collision_key: &str) -> Value {
    let rules: Vec<Value> = result
        .hits
        .iter()
        .map(|hit| json!({ "from": hit.pattern, "to": hit.replacement, "count": hit.count }))
        .collect();
    let mut summary = json!({
        "rules_applied": rules,
        "replacements": result.replacements(),
    });
    if let Some(object) = summary.as_object_mut() {
        object.insert(collision_key.to_string(), json!(result.collisions));
    }
    summary
}

pub(super) fn synthetic_mutation(
    text: &str,
    mutation_rate: f64,
    rng: &mut ChaCha20Rng,
) -> (String, Value) {
    let mut tokens_seen = 0usize;
    let mut tokens_mutated = 0usize;
    let output = ALPHA_TOKEN_RE
        .replace_all(text, |caps: &Captures<'_>| {
            tokens_seen += 1;
            if rng.gen::<f64>() < mutation_rate {
                tokens_mutated += 1;
                MUTATION_GLYPHS[rng.gen_range(0..MUTATION_GLYPHS.len())].to_string()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned();

    let summary = json!({
        "mutation_rate": mutation_rate,
        "tokens_seen": tokens_seen,
        "tokens_mutated": tokens_mutated,
    });
    (output, summary)
}

pub(super) fn phase_shift(
    text: &str,
    phase: Phase,
    acceleration: f64,
    rng: &mut ChaCha20Rng,
) -> (String, Value) {
    let (output, detail) = match phase {
        Phase::Compression => drop_vowels(text, COMPRESSION_VOWEL_DROP * acceleration, rng),
        Phase::Rebirth => drop_vowels(text, REBIRTH_VOWEL_DROP * acceleration, rng),
        Phase::Peak => peak(text, PEAK_INSERTION * acceleration, rng),
        Phase::Expansion => expand(text, acceleration, rng),
    };
    let mut summary = json!({ "phase": phase, "acceleration": acceleration });
    if let (Some(object), Value::Object(extra)) = (summary.as_object_mut(), detail) {
        object.extend(extra);
    }
    (output, summary)
}

/// Drops non-initial vowels of each word with probability `intensity`.
fn drop_vowels(text: &str, intensity: f64, rng: &mut ChaCha20Rng) -> (String, Value) {
    let probability = intensity.min(1.0);
    let mut removed = 0usize;
    let mut output = String::with_capacity(text.len());

    for segment in SEGMENT_RE.find_iter(text).map(|m| m.as_str()) {
        if is_whitespace_segment(segment) {
            output.push_str(segment);
            continue;
        }
        for (position, ch) in segment.chars().enumerate() {
            if position > 0 && is_vowel(ch) && rng.gen::<f64>() < probability {
                removed += 1;
            } else {
                output.push(ch);
            }
        }
    }

    (
        output,
        json!({ "vowels_removed": removed, "probability": probability }),
    )
}

/// Uppercases the text and inserts peak words after words.
fn peak(text: &str, intensity: f64, rng: &mut ChaCha20Rng) -> (String, Value) {
    let probability = intensity.min(1.0);
    let upper = text.to_uppercase();
    let mut inserted = 0usize;
    let mut output = String::with_capacity(upper.len());

    for segment in SEGMENT_RE.find_iter(&upper).map(|m| m.as_str()) {
        output.push_str(segment);
        if !is_whitespace_segment(segment) && rng.gen::<f64>() < probability {
            output.push(' ');
            output.push_str(PEAK_WORDS[rng.gen_range(0..PEAK_WORDS.len())]);
            inserted += 1;
        }
    }

    (
        output,
        json!({ "uppercased": true, "words_inserted": inserted, "probability": probability }),
    )
}

/// Inserts a mythic word after every `interval`-th word.
fn expand(text: &str, acceleration: f64, rng: &mut ChaCha20Rng) -> (String, Value) {
    let interval = ((EXPANSION_BASE_INTERVAL / acceleration).round() as usize).max(1);
    let mut inserted = 0usize;
    let mut words = 0usize;
    let mut output = String::with_capacity(text.len());

    for segment in SEGMENT_RE.find_iter(text).map(|m| m.as_str()) {
        output.push_str(segment);
        if is_whitespace_segment(segment) {
            continue;
        }
        words += 1;
        if words % interval == 0 {
            output.push(' ');
            output.push_str(MYTHIC_WORDS[rng.gen_range(0..MYTHIC_WORDS.len())]);
            inserted += 1;
        }
    }

    (
        output,
        json!({ "interval": interval, "words_inserted": inserted }),
    )
}

pub(super) fn glyph_fusion(text: &str, left: &str, right: &str, fused: &str) -> (String, Value) {
    let pair = format!("{left}{right}");
    let occurrences = text.matches(pair.as_str()).count();
    let output = text.replace(pair.as_str(), fused);
    (
        output,
        json!({ "pair": pair, "fused": fused, "occurrences": occurrences }),
    )
}

/// Records externally computed text as the event output.
pub(super) fn pass_through(text: &str, replacement: &str, mut summary: Value) -> (String, Value) {
    if let Some(object) = summary.as_object_mut() {
        object.insert("input_chars".to_string(), json!(text.chars().count()));
        object.insert("output_chars".to_string(), json!(replacement.chars().count()));
    }
    (replacement.to_string(), summary)
}

fn is_whitespace_segment(segment: &str) -> bool {
    segment.chars().next().is_some_and(char::is_whitespace)
}

fn is_vowel(ch: char) -> bool {
    matches!(ch.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}
