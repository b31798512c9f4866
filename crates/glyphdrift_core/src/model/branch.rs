//! Branch lineage model.
//!
//! # Responsibility
//! - Define branches (lineage nodes), their events and replay checkpoints.
//!
//! # Invariants
//! - A branch has a parent, a root document, or both; never neither.
//! - `event_index` is monotonic per branch and starts at 1; indexes are not
//!   globally ordered across branches.
//! - `(branch_id, event_index)` is unique for events and for checkpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

use crate::digest::{preview, sha256_hex};
use crate::evolution::EventKind;
use crate::model::document::DocumentId;

pub type BranchId = Uuid;
pub type EventId = Uuid;
pub type CheckpointId = Uuid;

/// Output policy mode recorded on branches and remix artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BranchMode {
    #[default]
    Public,
    Raw,
}

impl BranchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Raw => "raw",
        }
    }

    /// Case-insensitive parse (`PUBLIC`, `raw`, ...).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "public" => Some(Self::Public),
            "raw" => Some(Self::Raw),
            _ => None,
        }
    }
}

impl Display for BranchMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text state captured on a branch at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub current_text: String,
    /// Last phase applied by a `phase_shift` anywhere in the lineage.
    pub phase: Option<String>,
    pub text_hash: String,
}

impl StateSnapshot {
    pub fn new(current_text: impl Into<String>, phase: Option<String>) -> Self {
        let current_text = current_text.into();
        Self {
            text_hash: sha256_hex(&current_text),
            current_text,
            phase,
        }
    }
}

/// Named point-in-time state in an evolution lineage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    /// `None` for lineage roots, including children whose parent was deleted.
    pub parent_branch_id: Option<BranchId>,
    pub root_document_id: Option<DocumentId>,
    pub mode: BranchMode,
    pub state_snapshot: StateSnapshot,
    /// Epoch ms.
    pub created_at: i64,
}

/// Hash plus preview of the text an event produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSnapshot {
    pub text_hash: String,
    pub preview: String,
}

impl ResultSnapshot {
    pub fn of(text: &str, preview_chars: usize) -> Self {
        Self {
            text_hash: sha256_hex(text),
            preview: preview(text, preview_chars),
        }
    }
}

/// One transform applied within a branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchEvent {
    pub id: EventId,
    pub branch_id: BranchId,
    pub event_index: u32,
    pub event_type: EventKind,
    /// Canonical validated payload; replay re-parses it.
    pub event_payload: Value,
    pub diff_summary: Value,
    pub result_snapshot: ResultSnapshot,
    pub created_at: i64,
}

/// Compressed replay snapshot for one branch position.
///
/// `event_index` counts events in the flattened lineage order ending at
/// this branch, so a checkpoint on an ancestor stays a valid prefix for
/// every descendant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchCheckpoint {
    pub id: CheckpointId,
    pub branch_id: BranchId,
    pub event_index: u32,
    pub snapshot_blob: String,
    pub created_at: i64,
}
