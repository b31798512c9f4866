//! Remix use-case service.
//!
//! # Responsibility
//! - Resolve remix sides from documents (with atoms) or branches (text).
//! - Run the composition and optionally persist it as an artifact and as a
//!   new branch holding one `remix` event.
//!
//! # Invariants
//! - Artifact, links and spawned branch commit together or not at all.
//! - `payload_hash` covers strategy, seed, input hashes, levels and output,
//!   so equal inputs always produce equal hashes.

use log::info;
use serde::Serialize;
use serde_json::json;
use std::time::Instant;
use uuid::Uuid;

use super::evolution_service::{EvolutionService, EvolveOutcome};
use super::{EngineError, EngineResult};
use crate::digest::sha256_hex;
use crate::evolution::RemixPayload;
use crate::model::atom::AtomLevel;
use crate::model::branch::{BranchId, BranchMode};
use crate::model::document::DocumentId;
use crate::model::remix::{ArtifactId, AtomRef, RemixArtifact, RemixSourceLink};
use crate::remix::{compose, normalize_levels, RemixInput, RemixStrategy};
use crate::repo::branch_repo::BranchRepository;
use crate::repo::document_repo::DocumentRepository;
use crate::repo::now_ms;
use crate::repo::remix_repo::RemixRepository;

/// One side of a remix: a branch tip wins over a document when both are set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemixSide {
    pub document_id: Option<DocumentId>,
    pub branch_id: Option<BranchId>,
}

impl RemixSide {
    pub fn document(id: DocumentId) -> Self {
        Self {
            document_id: Some(id),
            branch_id: None,
        }
    }

    pub fn branch(id: BranchId) -> Self {
        Self {
            document_id: None,
            branch_id: Some(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeRequest {
    pub source: RemixSide,
    pub target: RemixSide,
    pub strategy: RemixStrategy,
    pub seed: i64,
    pub atom_levels: Vec<AtomLevel>,
    pub create_branch: bool,
    pub persist_artifact: bool,
    pub mode: BranchMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposeOutcome {
    pub remixed_text: String,
    pub text_hash: String,
    pub payload_hash: String,
    pub source_level: Option<AtomLevel>,
    pub target_level: Option<AtomLevel>,
    pub source_atom_refs: Vec<AtomRef>,
    pub remix_artifact_id: Option<ArtifactId>,
    pub new_branch_id: Option<BranchId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactView {
    pub artifact: RemixArtifact,
    pub links: Vec<RemixSourceLink>,
}

pub struct RemixService<D, B, R>
where
    D: DocumentRepository,
    B: BranchRepository,
    R: RemixRepository,
{
    engine: EvolutionService<D, B>,
    documents: D,
    artifacts: R,
}

impl<D, B, R> RemixService<D, B, R>
where
    D: DocumentRepository,
    B: BranchRepository,
    R: RemixRepository,
{
    /// `documents` is used for atom lookup; `engine` resolves branch text
    /// and spawns remix branches.
    pub fn new(engine: EvolutionService<D, B>, documents: D, artifacts: R) -> Self {
        Self {
            engine,
            documents,
            artifacts,
        }
    }

    /// Composes two sides with `request.strategy`.
    ///
    /// # Errors
    /// - `Validation` when a side names neither a document nor a branch, or
    ///   resolves to blank text.
    /// - `NotFound` for missing documents or branches.
    pub fn compose(&self, request: &ComposeRequest) -> EngineResult<ComposeOutcome> {
        let started_at = Instant::now();
        let levels = normalize_levels(&request.atom_levels);
        let source = self.load_side(request.source, &levels, "source")?;
        let target = self.load_side(request.target, &levels, "target")?;

        let composition = compose(&source, &target, request.strategy, request.seed, &levels)?;
        let text_hash = sha256_hex(&composition.remixed_text);
        let level_names: Vec<&str> = levels.iter().map(|level| level.as_str()).collect();
        let payload_hash = sha256_hex(
            &json!({
                "strategy": request.strategy,
                "seed": request.seed,
                "source_hash": sha256_hex(&composition.source.text),
                "target_hash": sha256_hex(&composition.target.text),
                "atom_levels": level_names,
                "text_hash": text_hash,
            })
            .to_string(),
        );

        let mut outcome = ComposeOutcome {
            remixed_text: composition.remixed_text.clone(),
            text_hash,
            payload_hash,
            source_level: composition.source.level,
            target_level: composition.target.level,
            source_atom_refs: composition.atom_refs.clone(),
            remix_artifact_id: None,
            new_branch_id: None,
        };

        if request.create_branch || request.persist_artifact {
            let (artifact_id, branch_id) = self.artifacts.atomic(|| -> EngineResult<_> {
                let branch_id = if request.create_branch {
                    Some(self.spawn_branch(request, &composition.remixed_text)?.branch_id)
                } else {
                    None
                };
                let artifact_id = if request.persist_artifact {
                    Some(self.persist(request, &levels, &outcome, branch_id)?)
                } else {
                    None
                };
                Ok((artifact_id, branch_id))
            })?;
            outcome.remix_artifact_id = artifact_id;
            outcome.new_branch_id = branch_id;
        }

        info!(
            "event=remix_compose module=remix status=ok strategy={} seed={} text_hash={} atom_refs={} artifact_id={} branch_id={} duration_ms={}",
            request.strategy,
            request.seed,
            outcome.text_hash,
            outcome.source_atom_refs.len(),
            display_optional(outcome.remix_artifact_id),
            display_optional(outcome.new_branch_id),
            started_at.elapsed().as_millis()
        );
        Ok(outcome)
    }

    /// Stored artifact with its provenance links in position order.
    pub fn get_artifact(&self, artifact_id: ArtifactId) -> EngineResult<ArtifactView> {
        let artifact = self
            .artifacts
            .get_artifact(artifact_id)?
            .ok_or_else(|| EngineError::not_found("remix artifact", artifact_id))?;
        let links = self.artifacts.list_links(artifact_id)?;
        Ok(ArtifactView { artifact, links })
    }

    fn load_side(
        &self,
        side: RemixSide,
        levels: &[AtomLevel],
        role: &str,
    ) -> EngineResult<RemixInput> {
        if let Some(branch_id) = side.branch_id {
            let replay = self.engine.replay(branch_id, true)?;
            return Ok(RemixInput {
                text: replay.text,
                atoms: Vec::new(),
            });
        }
        let Some(document_id) = side.document_id else {
            return Err(EngineError::validation(format!(
                "remix {role} needs a document or a branch"
            )));
        };
        let document = self
            .documents
            .get_document(document_id)?
            .ok_or_else(|| EngineError::not_found("document", document_id))?;

        let mut atoms = Vec::new();
        for level in levels {
            atoms.extend(self.documents.list_atoms(document_id, Some(*level))?);
        }
        Ok(RemixInput {
            text: document.extracted_text().to_string(),
            atoms,
        })
    }

    fn spawn_branch(
        &self,
        request: &ComposeRequest,
        remixed_text: &str,
    ) -> EngineResult<EvolveOutcome> {
        let payload = RemixPayload {
            seed: request.seed,
            strategy: request.strategy,
            remixed_text: remixed_text.to_string(),
        };
        let payload = serde_json::to_value(&payload).map_err(|err| {
            EngineError::validation(format!("cannot encode remix payload: {err}"))
        })?;
        let (parent, root) = match request.source.branch_id {
            Some(branch_id) => (Some(branch_id), None),
            None => (None, request.source.document_id),
        };
        self.engine
            .evolve_branch(parent, root, "remix", &payload, request.mode)
    }

    fn persist(
        &self,
        request: &ComposeRequest,
        levels: &[AtomLevel],
        outcome: &ComposeOutcome,
        branch_id: Option<BranchId>,
    ) -> EngineResult<ArtifactId> {
        let artifact = RemixArtifact {
            id: Uuid::new_v4(),
            strategy: request.strategy,
            seed: request.seed,
            source_document_id: request.source.document_id,
            source_branch_id: request.source.branch_id,
            target_document_id: request.target.document_id,
            target_branch_id: request.target.branch_id,
            atom_levels: levels.to_vec(),
            remixed_text: outcome.remixed_text.clone(),
            text_hash: outcome.text_hash.clone(),
            payload_hash: outcome.payload_hash.clone(),
            branch_id,
            mode: request.mode,
            created_at: now_ms(),
        };
        let links: Vec<RemixSourceLink> = outcome
            .source_atom_refs
            .iter()
            .zip(0u32..)
            .map(|(atom, position)| RemixSourceLink {
                id: Uuid::new_v4(),
                artifact_id: artifact.id,
                position,
                atom: atom.clone(),
            })
            .collect();
        self.artifacts.insert_artifact(&artifact, &links)?;
        Ok(artifact.id)
    }
}

fn display_optional(id: Option<Uuid>) -> String {
    id.map_or_else(|| "none".to_string(), |id| id.to_string())
}
