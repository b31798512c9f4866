//! Event transform library.
//!
//! # Responsibility
//! - Validate `(event_type, payload)` pairs into typed [`EvolutionEvent`]s.
//! - Apply events to text as pure functions returning text plus a diff
//!   summary.
//!
//! # Invariants
//! - Unknown event types and out-of-range payload fields are rejected before
//!   any text is touched; there is no silent no-op fallback.
//! - Seeded transforms draw from a stream keyed by
//!   `(event_type, seed, sha256(text))` and nothing else.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod drift;
mod payload;
mod transforms;

pub use payload::{
    EvolutionEvent, GlyphFusionPayload, MergePayload, MutationPayload, Phase, PhaseShiftPayload,
    RemixPayload, SeedPayload, ACCELERATION_CEILING,
};

/// Closed set of event kinds a branch can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NaturalDrift,
    ReverseDrift,
    SyntheticMutation,
    PhaseShift,
    GlyphFusion,
    Remix,
    Merge,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::NaturalDrift,
        EventKind::ReverseDrift,
        EventKind::SyntheticMutation,
        EventKind::PhaseShift,
        EventKind::GlyphFusion,
        EventKind::Remix,
        EventKind::Merge,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NaturalDrift => "natural_drift",
            Self::ReverseDrift => "reverse_drift",
            Self::SyntheticMutation => "synthetic_mutation",
            Self::PhaseShift => "phase_shift",
            Self::GlyphFusion => "glyph_fusion",
            Self::Remix => "remix",
            Self::Merge => "merge",
        }
    }

    pub fn parse(value: &str) -> Result<Self, TransformError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| TransformError::UnknownEventType(value.to_string()))
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation failures raised before an event is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformError {
    UnknownEventType(String),
    InvalidPayload {
        event_type: EventKind,
        message: String,
    },
}

impl Display for TransformError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEventType(value) => write!(f, "unsupported event_type `{value}`"),
            Self::InvalidPayload {
                event_type,
                message,
            } => write!(f, "invalid {event_type} payload: {message}"),
        }
    }
}

impl Error for TransformError {}

/// Text and diff statistics produced by one event.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutcome {
    pub text: String,
    pub diff_summary: Value,
}

/// Validates and applies one event in a single call.
///
/// # Errors
/// - [`TransformError::UnknownEventType`] for names outside [`EventKind`].
/// - [`TransformError::InvalidPayload`] for missing or out-of-range fields.
pub fn apply(
    text: &str,
    event_type: &str,
    payload: &Value,
) -> Result<TransformOutcome, TransformError> {
    let event = EvolutionEvent::parse(event_type, payload)?;
    Ok(event.apply(text))
}
