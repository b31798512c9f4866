use glyphdrift_core::evolution::{apply, EvolutionEvent, TransformError};
use glyphdrift_core::EventKind;
use serde_json::json;

#[test]
fn natural_drift_matches_sound_shift_table() {
    let outcome = apply("the knight wrote", "natural_drift", &json!({})).unwrap();
    assert_eq!(outcome.text, "þe niȝt rote");
    assert_eq!(outcome.diff_summary["replacements"], json!(4));
    assert_eq!(outcome.diff_summary["event_type"], json!("natural_drift"));
}

#[test]
fn reverse_drift_restores_digraphs_lossily() {
    let outcome = apply("fun", "reverse_drift", &json!({ "seed": 3 })).unwrap();
    assert_eq!(outcome.text, "phun");

    let drifted = apply("the phone", "natural_drift", &json!({})).unwrap();
    let restored = apply(&drifted.text, "reverse_drift", &json!({})).unwrap();
    assert_eq!(restored.text, "the phone");
}

#[test]
fn seeded_transforms_are_deterministic() {
    let text = "The river carried every lantern toward the sleeping harbour.";
    let payload = json!({ "seed": 42, "mutation_rate": 0.5 });

    let first = apply(text, "synthetic_mutation", &payload).unwrap();
    let second = apply(text, "synthetic_mutation", &payload).unwrap();
    assert_eq!(first, second);

    let phase = json!({ "seed": 9, "phase": "expansion", "acceleration": 2.0 });
    assert_eq!(
        apply(text, "phase_shift", &phase).unwrap(),
        apply(text, "phase_shift", &phase).unwrap()
    );
}

#[test]
fn different_seeds_change_mutations() {
    let text = "one two three four five six seven eight nine ten eleven twelve";
    let outputs: Vec<String> = (0..4)
        .map(|seed| {
            apply(
                text,
                "synthetic_mutation",
                &json!({ "seed": seed, "mutation_rate": 0.5 }),
            )
            .unwrap()
            .text
        })
        .collect();
    assert!(outputs.iter().any(|output| output != &outputs[0]));
}

#[test]
fn peak_phase_uppercases() {
    let outcome = apply("quiet hills", "phase_shift", &json!({ "phase": "peak" })).unwrap();
    assert!(outcome.text.starts_with("QUIET"));
    assert!(!outcome.text.chars().any(char::is_lowercase));
}

#[test]
fn glyph_fusion_uses_defaults_and_custom_pairs() {
    let custom = apply(
        "rose over the moor",
        "glyph_fusion",
        &json!({ "left": "o", "right": "o", "fused": "ø" }),
    )
    .unwrap();
    assert_eq!(custom.text, "rose over the mør");
    assert_eq!(custom.diff_summary["occurrences"], json!(1));
}

#[test]
fn unknown_event_type_is_rejected() {
    let err = apply("text", "teleport", &json!({})).unwrap_err();
    assert_eq!(err, TransformError::UnknownEventType("teleport".to_string()));
}

#[test]
fn invalid_payloads_are_rejected() {
    let rate = EvolutionEvent::parse("synthetic_mutation", &json!({ "mutation_rate": 5.0 }))
        .unwrap_err();
    assert!(matches!(
        rate,
        TransformError::InvalidPayload {
            event_type: EventKind::SyntheticMutation,
            ..
        }
    ));

    let phase = EvolutionEvent::parse("phase_shift", &json!({ "phase": "sunset" })).unwrap_err();
    assert!(matches!(phase, TransformError::InvalidPayload { .. }));

    let fusion = EvolutionEvent::parse("glyph_fusion", &json!({ "left": "ab" })).unwrap_err();
    assert!(matches!(fusion, TransformError::InvalidPayload { .. }));
}

#[test]
fn canonical_payload_fills_defaults() {
    let event = EvolutionEvent::parse("synthetic_mutation", &json!({ "seed": 4 })).unwrap();
    assert_eq!(event.payload(), json!({ "seed": 4, "mutation_rate": 0.1 }));
    assert_eq!(event.kind(), EventKind::SyntheticMutation);
}

#[test]
fn diff_summary_carries_hashes() {
    let outcome = apply("thin", "natural_drift", &json!({ "seed": 1 })).unwrap();
    assert_eq!(
        outcome.diff_summary["input_hash"],
        json!(glyphdrift_core::digest::sha256_hex("thin"))
    );
    assert_eq!(
        outcome.diff_summary["output_hash"],
        json!(glyphdrift_core::digest::sha256_hex(&outcome.text))
    );
    assert_eq!(outcome.diff_summary["seed"], json!(1));
}
