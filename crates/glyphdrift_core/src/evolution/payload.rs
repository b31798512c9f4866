//! Typed, validated event payloads.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::{Display, Formatter};

use super::transforms;
use super::{EventKind, TransformError, TransformOutcome};
use crate::digest::sha256_hex;
use crate::merge::MergeStrategy;
use crate::model::branch::BranchId;
use crate::remix::RemixStrategy;
use crate::rng::seeded_rng;

/// Acceleration values above this are capped, not rejected.
pub const ACCELERATION_CEILING: f64 = 4.0;

const DEFAULT_MUTATION_RATE: f64 = 0.1;

/// Payload for transforms that only take a seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SeedPayload {
    #[serde(default)]
    pub seed: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationPayload {
    #[serde(default)]
    pub seed: i64,
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
}

/// Narrative phase driving `phase_shift`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Expansion,
    Peak,
    Compression,
    Rebirth,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expansion => "expansion",
            Self::Peak => "peak",
            Self::Compression => "compression",
            Self::Rebirth => "rebirth",
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseShiftPayload {
    #[serde(default)]
    pub seed: i64,
    pub phase: Phase,
    #[serde(default = "default_acceleration")]
    pub acceleration: f64,
}

impl PhaseShiftPayload {
    /// Acceleration after applying [`ACCELERATION_CEILING`].
    pub fn effective_acceleration(&self) -> f64 {
        self.acceleration.min(ACCELERATION_CEILING)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlyphFusionPayload {
    #[serde(default)]
    pub seed: i64,
    #[serde(default = "default_left")]
    pub left: String,
    #[serde(default = "default_right")]
    pub right: String,
    #[serde(default = "default_fused")]
    pub fused: String,
}

/// Pass-through of text computed by the remix composer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemixPayload {
    #[serde(default)]
    pub seed: i64,
    pub strategy: RemixStrategy,
    pub remixed_text: String,
}

/// Pass-through of text computed by the merge engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergePayload {
    #[serde(default)]
    pub seed: i64,
    pub strategy: MergeStrategy,
    pub merged_text: String,
    #[serde(default)]
    pub left_branch_id: Option<BranchId>,
    #[serde(default)]
    pub right_branch_id: Option<BranchId>,
    #[serde(default)]
    pub left_hash: Option<String>,
    #[serde(default)]
    pub right_hash: Option<String>,
    #[serde(default)]
    pub conflict_semantics: Value,
}

/// A validated event, one variant per [`EventKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum EvolutionEvent {
    NaturalDrift(SeedPayload),
    ReverseDrift(SeedPayload),
    SyntheticMutation(MutationPayload),
    PhaseShift(PhaseShiftPayload),
    GlyphFusion(GlyphFusionPayload),
    Remix(RemixPayload),
    Merge(MergePayload),
}

impl EvolutionEvent {
    /// Decodes and validates a raw payload for `event_type`.
    ///
    /// A `null` payload is treated as `{}` so seed-only events can omit it.
    pub fn parse(event_type: &str, payload: &Value) -> Result<Self, TransformError> {
        let kind = EventKind::parse(event_type)?;
        let event = match kind {
            EventKind::NaturalDrift => Self::NaturalDrift(decode(kind, payload)?),
            EventKind::ReverseDrift => Self::ReverseDrift(decode(kind, payload)?),
            EventKind::SyntheticMutation => Self::SyntheticMutation(decode(kind, payload)?),
            EventKind::PhaseShift => Self::PhaseShift(decode(kind, payload)?),
            EventKind::GlyphFusion => Self::GlyphFusion(decode(kind, payload)?),
            EventKind::Remix => Self::Remix(decode(kind, payload)?),
            EventKind::Merge => Self::Merge(decode(kind, payload)?),
        };
        event.validate()?;
        Ok(event)
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::NaturalDrift(_) => EventKind::NaturalDrift,
            Self::ReverseDrift(_) => EventKind::ReverseDrift,
            Self::SyntheticMutation(_) => EventKind::SyntheticMutation,
            Self::PhaseShift(_) => EventKind::PhaseShift,
            Self::GlyphFusion(_) => EventKind::GlyphFusion,
            Self::Remix(_) => EventKind::Remix,
            Self::Merge(_) => EventKind::Merge,
        }
    }

    pub fn seed(&self) -> i64 {
        match self {
            Self::NaturalDrift(p) | Self::ReverseDrift(p) => p.seed,
            Self::SyntheticMutation(p) => p.seed,
            Self::PhaseShift(p) => p.seed,
            Self::GlyphFusion(p) => p.seed,
            Self::Remix(p) => p.seed,
            Self::Merge(p) => p.seed,
        }
    }

    /// Phase set by this event, if it is a `phase_shift`.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::PhaseShift(p) => Some(p.phase),
            _ => None,
        }
    }

    /// Canonical payload as stored on the event row, defaults filled in.
    pub fn payload(&self) -> Value {
        match self {
            Self::NaturalDrift(p) | Self::ReverseDrift(p) => json!({ "seed": p.seed }),
            Self::SyntheticMutation(p) => json!({
                "seed": p.seed,
                "mutation_rate": p.mutation_rate,
            }),
            Self::PhaseShift(p) => json!({
                "seed": p.seed,
                "phase": p.phase,
                "acceleration": p.acceleration,
            }),
            Self::GlyphFusion(p) => json!({
                "seed": p.seed,
                "left": p.left,
                "right": p.right,
                "fused": p.fused,
            }),
            Self::Remix(p) => json!({
                "seed": p.seed,
                "strategy": p.strategy,
                "remixed_text": p.remixed_text,
            }),
            Self::Merge(p) => json!({
                "seed": p.seed,
                "strategy": p.strategy,
                "merged_text": p.merged_text,
                "left_branch_id": p.left_branch_id,
                "right_branch_id": p.right_branch_id,
                "left_hash": p.left_hash,
                "right_hash": p.right_hash,
                "conflict_semantics": p.conflict_semantics,
            }),
        }
    }

    /// Applies this event to `text`. Validation already happened in
    /// [`EvolutionEvent::parse`], so application cannot fail.
    pub fn apply(&self, text: &str) -> TransformOutcome {
        let kind = self.kind();
        let seed = self.seed().to_string();
        let text_hash = sha256_hex(text);
        let mut rng = seeded_rng(&[kind.as_str(), &seed, &text_hash]);

        let (output, mut diff_summary) = match self {
            Self::NaturalDrift(_) => transforms::natural_drift(text),
            Self::ReverseDrift(_) => transforms::reverse_drift(text),
            Self::SyntheticMutation(p) => {
                transforms::synthetic_mutation(text, p.mutation_rate, &mut rng)
            }
            Self::PhaseShift(p) => transforms::phase_shift(
                text,
                p.phase,
                p.effective_acceleration(),
                &mut rng,
            ),
            Self::GlyphFusion(p) => transforms::glyph_fusion(text, &p.left, &p.right, &p.fused),
            Self::Remix(p) => transforms::pass_through(
                text,
                &p.remixed_text,
                json!({ "strategy": p.strategy }),
            ),
            Self::Merge(p) => transforms::pass_through(
                text,
                &p.merged_text,
                json!({
                    "strategy": p.strategy,
                    "conflict_semantics": p.conflict_semantics,
                }),
            ),
        };

        if let Some(summary) = diff_summary.as_object_mut() {
            summary.insert("event_type".to_string(), json!(kind));
            summary.insert("seed".to_string(), json!(self.seed()));
            summary.insert("input_hash".to_string(), json!(text_hash));
            summary.insert("output_hash".to_string(), json!(sha256_hex(&output)));
        }

        TransformOutcome {
            text: output,
            diff_summary,
        }
    }

    fn validate(&self) -> Result<(), TransformError> {
        let invalid = |message: String| TransformError::InvalidPayload {
            event_type: self.kind(),
            message,
        };
        match self {
            Self::SyntheticMutation(p) => {
                if !p.mutation_rate.is_finite() || !(0.0..=1.0).contains(&p.mutation_rate) {
                    return Err(invalid(format!(
                        "mutation_rate must be within [0, 1], got {}",
                        p.mutation_rate
                    )));
                }
            }
            Self::PhaseShift(p) => {
                if !p.acceleration.is_finite() || p.acceleration <= 0.0 {
                    return Err(invalid(format!(
                        "acceleration must be a positive number, got {}",
                        p.acceleration
                    )));
                }
            }
            Self::GlyphFusion(p) => {
                if p.left.chars().count() != 1 || p.right.chars().count() != 1 {
                    return Err(invalid(
                        "left and right must each be exactly one character".to_string(),
                    ));
                }
                if p.fused.is_empty() {
                    return Err(invalid("fused must not be empty".to_string()));
                }
            }
            Self::NaturalDrift(_) | Self::ReverseDrift(_) | Self::Remix(_) | Self::Merge(_) => {}
        }
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(kind: EventKind, payload: &Value) -> Result<T, TransformError> {
    let object = match payload {
        Value::Null => Value::Object(serde_json::Map::new()),
        Value::Object(_) => payload.clone(),
        _ => {
            return Err(TransformError::InvalidPayload {
                event_type: kind,
                message: "payload must be a JSON object".to_string(),
            })
        }
    };
    serde_json::from_value(object).map_err(|err| TransformError::InvalidPayload {
        event_type: kind,
        message: err.to_string(),
    })
}

fn default_mutation_rate() -> f64 {
    DEFAULT_MUTATION_RATE
}

fn default_acceleration() -> f64 {
    1.0
}

fn default_left() -> String {
    "a".to_string()
}

fn default_right() -> String {
    "e".to_string()
}

fn default_fused() -> String {
    "æ".to_string()
}

#[cfg(test)]
mod tests {
    use super::{EvolutionEvent, Phase, ACCELERATION_CEILING};
    use crate::evolution::{EventKind, TransformError};
    use serde_json::json;

    #[test]
    fn null_payload_defaults_seed() {
        let event = EvolutionEvent::parse("natural_drift", &json!(null)).unwrap();
        assert_eq!(event.seed(), 0);
        assert_eq!(event.payload(), json!({ "seed": 0 }));
    }

    #[test]
    fn unknown_phase_is_a_validation_error() {
        let err = EvolutionEvent::parse("phase_shift", &json!({ "phase": "twilight" }))
            .unwrap_err();
        assert!(matches!(
            err,
            TransformError::InvalidPayload {
                event_type: EventKind::PhaseShift,
                ..
            }
        ));
    }

    #[test]
    fn acceleration_above_ceiling_is_capped() {
        let event = EvolutionEvent::parse(
            "phase_shift",
            &json!({ "phase": "peak", "acceleration": 50.0 }),
        )
        .unwrap();
        let EvolutionEvent::PhaseShift(payload) = &event else {
            panic!("expected phase shift");
        };
        assert_eq!(payload.effective_acceleration(), ACCELERATION_CEILING);
        assert_eq!(event.phase(), Some(Phase::Peak));
    }

    #[test]
    fn non_positive_acceleration_is_rejected() {
        assert!(EvolutionEvent::parse(
            "phase_shift",
            &json!({ "phase": "peak", "acceleration": 0.0 }),
        )
        .is_err());
    }

    #[test]
    fn glyph_fusion_requires_single_characters() {
        let err = EvolutionEvent::parse(
            "glyph_fusion",
            &json!({ "left": "th", "right": "e", "fused": "x" }),
        )
        .unwrap_err();
        assert!(err.to_string().contains("exactly one character"));
    }

    #[test]
    fn merge_requires_merged_text() {
        assert!(EvolutionEvent::parse("merge", &json!({ "strategy": "left_wins" })).is_err());
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(EvolutionEvent::parse("reverse_drift", &json!([1, 2])).is_err());
    }
}
