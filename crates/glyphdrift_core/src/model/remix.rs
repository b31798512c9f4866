//! Remix provenance records.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::atom::{AtomId, AtomLevel};
use crate::model::branch::{BranchId, BranchMode};
use crate::model::document::DocumentId;
use crate::remix::RemixStrategy;

pub type ArtifactId = Uuid;

/// Which side of a remix an atom came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtomRole {
    Source,
    Target,
}

impl AtomRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Target => "target",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "source" => Some(Self::Source),
            "target" => Some(Self::Target),
            _ => None,
        }
    }
}

/// One contributing atom, keeping its original document ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomRef {
    pub atom_id: AtomId,
    pub atom_level: AtomLevel,
    pub ordinal: u32,
    pub role: AtomRole,
}

/// Persisted record of one remix composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemixArtifact {
    pub id: ArtifactId,
    pub strategy: RemixStrategy,
    pub seed: i64,
    pub source_document_id: Option<DocumentId>,
    pub source_branch_id: Option<BranchId>,
    pub target_document_id: Option<DocumentId>,
    pub target_branch_id: Option<BranchId>,
    pub atom_levels: Vec<AtomLevel>,
    pub remixed_text: String,
    pub text_hash: String,
    pub payload_hash: String,
    /// Branch spawned from this remix, if any.
    pub branch_id: Option<BranchId>,
    pub mode: BranchMode,
    pub created_at: i64,
}

/// Per-atom provenance row of a remix artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemixSourceLink {
    pub id: Uuid,
    pub artifact_id: ArtifactId,
    /// 0-based position in the artifact's `atom_refs` list.
    pub position: u32,
    pub atom: AtomRef,
}
