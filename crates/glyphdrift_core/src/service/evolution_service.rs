//! Branch evolution, replay and merge service.
//!
//! # Responsibility
//! - Spawn single-event branches from a parent branch or a root document.
//! - Replay a lineage from its root document, optionally resuming from the
//!   newest usable checkpoint.
//! - Merge two branch tips and assemble lineage graphs for display.
//!
//! # Invariants
//! - Every spawn writes exactly one branch and one event, atomically.
//! - `multi_evolve` is all-or-nothing across the whole chain.
//! - Replay with and without checkpoints yields identical text; a checkpoint
//!   that fails to decode or belongs to a different lineage is ignored.
//! - Logs carry ids, hashes and counts only.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use uuid::Uuid;

use super::{EngineError, EngineResult};
use crate::checkpoint::{
    compress, latest_checkpoint, lineage_fingerprint, restore_text, text_snapshot,
};
use crate::config::EngineConfig;
use crate::digest::{preview, sha256_hex};
use crate::evolution::{EventKind, EvolutionEvent, MergePayload};
use crate::lineage::{find_lca, resolve_lineage};
use crate::merge::{conflict_semantics, merge_texts, ConflictSemantics, MergeStrategy};
use crate::model::branch::{
    Branch, BranchCheckpoint, BranchEvent, BranchId, BranchMode, EventId, ResultSnapshot,
    StateSnapshot,
};
use crate::model::document::DocumentId;
use crate::repo::branch_repo::BranchRepository;
use crate::repo::document_repo::DocumentRepository;
use crate::repo::{now_ms, RepoError};

/// One step of a `multi_evolve` chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventStep {
    pub event_type: String,
    #[serde(default)]
    pub event_payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvolveOutcome {
    pub branch_id: BranchId,
    pub event_id: EventId,
    pub diff_summary: Value,
    pub branch: Branch,
    pub event: BranchEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultiEvolveOutcome {
    pub branch_ids: Vec<BranchId>,
    pub event_ids: Vec<EventId>,
    pub final_branch_id: BranchId,
    pub final_text_hash: String,
    pub final_preview: String,
}

/// Full replay result.
#[derive(Debug, Clone, PartialEq)]
pub struct Replay {
    pub text: String,
    pub phase: Option<String>,
    /// Root to tip.
    pub lineage: Vec<Branch>,
    /// Flattened lineage events in replay order.
    pub events: Vec<BranchEvent>,
    /// `event_index` of the checkpoint replay resumed from, if any.
    pub resumed_from: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub branch_id: BranchId,
    pub text_hash: String,
    pub preview: String,
    pub phase: Option<String>,
    pub event_count: usize,
    pub resumed_from: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timeline {
    pub branch: Branch,
    pub lineage: Vec<BranchId>,
    pub events: Vec<BranchEvent>,
    pub replay_snapshot: ReplaySummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeOutcome {
    pub branch_id: BranchId,
    pub event_id: EventId,
    pub lca_branch_id: Option<BranchId>,
    pub merged_text_hash: String,
    pub conflict_semantics: ConflictSemantics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineageRole {
    Primary,
    /// Reached only through a merge event's right-hand side.
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: EventId,
    pub branch_id: BranchId,
    pub branch_name: String,
    pub event_index: u32,
    pub event_type: EventKind,
    pub text_hash: String,
    pub preview: String,
    pub lineage: LineageRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Consecutive events inside one branch.
    Sequence,
    /// Last event of a parent branch to first event of its child.
    Parent,
    /// Right-hand tip of a merge to the merge event.
    MergeParent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub from: EventId,
    pub to: EventId,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphSummary {
    pub tip_branch_id: BranchId,
    pub root_document_id: Option<DocumentId>,
    pub primary_branches: usize,
    pub secondary_branches: usize,
    pub node_count: usize,
    pub edge_count: usize,
    pub merge_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Visualization {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub summary: GraphSummary,
}

/// Position of a branch tip inside its flattened lineage.
struct LineageCursor {
    ids: Vec<BranchId>,
    event_count: usize,
}

pub struct EvolutionService<D: DocumentRepository, B: BranchRepository> {
    documents: D,
    branches: B,
    config: EngineConfig,
}

impl<D: DocumentRepository, B: BranchRepository> EvolutionService<D, B> {
    pub fn new(documents: D, branches: B, config: EngineConfig) -> Self {
        Self {
            documents,
            branches,
            config,
        }
    }

    /// # Errors
    /// - `NotFound` when the branch does not exist.
    pub fn get_branch(&self, id: BranchId) -> EngineResult<Branch> {
        self.branches
            .get_branch(id)?
            .ok_or_else(|| EngineError::not_found("branch", id))
    }

    /// Applies one event on top of a parent branch or a root document and
    /// records the result as a new branch.
    ///
    /// A parent takes precedence when both ids are given.
    ///
    /// # Errors
    /// - `Validation` for unknown event types, bad payloads, or when neither
    ///   base id is given.
    /// - `NotFound` for a missing parent branch or root document.
    pub fn evolve_branch(
        &self,
        parent_branch_id: Option<BranchId>,
        root_document_id: Option<DocumentId>,
        event_type: &str,
        event_payload: &Value,
        mode: BranchMode,
    ) -> EngineResult<EvolveOutcome> {
        let started_at = Instant::now();
        let event = EvolutionEvent::parse(event_type, event_payload)
            .inspect_err(|err| log_rejected("branch_evolve", event_type, err))?;
        let base = self.resolve_base(parent_branch_id, root_document_id)?;

        let (branch, event) = self.branches.atomic(|| -> EngineResult<_> {
            let mut cursor = self.cursor_for(base.parent.as_ref())?;
            self.spawn(&base, &event, mode, &mut cursor)
        })?;

        info!(
            "event=branch_evolve module=evolution status=ok branch_id={} event_id={} event_type={} text_hash={} duration_ms={}",
            branch.id,
            event.id,
            event.event_type,
            branch.state_snapshot.text_hash,
            started_at.elapsed().as_millis()
        );
        Ok(EvolveOutcome {
            branch_id: branch.id,
            event_id: event.id,
            diff_summary: event.diff_summary.clone(),
            branch,
            event,
        })
    }

    /// Chains `events` as consecutive single-event branches.
    ///
    /// Every event is validated before the first write, and the whole chain
    /// commits or rolls back as one unit.
    pub fn multi_evolve(
        &self,
        parent_branch_id: Option<BranchId>,
        root_document_id: Option<DocumentId>,
        events: &[EventStep],
        mode: BranchMode,
    ) -> EngineResult<MultiEvolveOutcome> {
        let started_at = Instant::now();
        if events.is_empty() {
            return Err(EngineError::validation("multi_evolve needs at least one event"));
        }
        let parsed = events
            .iter()
            .enumerate()
            .map(|(position, step)| {
                EvolutionEvent::parse(&step.event_type, &step.event_payload).map_err(|err| {
                    log_rejected("branch_multi_evolve", &step.event_type, &err);
                    EngineError::validation(format!("event #{}: {err}", position + 1))
                })
            })
            .collect::<EngineResult<Vec<_>>>()?;
        let base = self.resolve_base(parent_branch_id, root_document_id)?;

        let spawned = self.branches.atomic(|| -> EngineResult<Vec<(Branch, BranchEvent)>> {
            let mut cursor = self.cursor_for(base.parent.as_ref())?;
            let mut base = base;
            let mut spawned = Vec::with_capacity(parsed.len());
            for event in &parsed {
                let (branch, event) = self.spawn(&base, event, mode, &mut cursor)?;
                base = Base::from_parent(branch.clone());
                spawned.push((branch, event));
            }
            Ok(spawned)
        })?;

        let (tip, _) = spawned
            .last()
            .ok_or_else(|| EngineError::validation("multi_evolve produced no branches"))?;
        let outcome = MultiEvolveOutcome {
            branch_ids: spawned.iter().map(|(branch, _)| branch.id).collect(),
            event_ids: spawned.iter().map(|(_, event)| event.id).collect(),
            final_branch_id: tip.id,
            final_text_hash: tip.state_snapshot.text_hash.clone(),
            final_preview: preview(&tip.state_snapshot.current_text, self.config.preview_chars),
        };
        info!(
            "event=branch_multi_evolve module=evolution status=ok final_branch_id={} steps={} text_hash={} duration_ms={}",
            outcome.final_branch_id,
            outcome.branch_ids.len(),
            outcome.final_text_hash,
            started_at.elapsed().as_millis()
        );
        Ok(outcome)
    }

    /// Rebuilds the text of `branch_id` from its root document.
    pub fn replay(&self, branch_id: BranchId, use_checkpoints: bool) -> EngineResult<Replay> {
        let tip = self.get_branch(branch_id)?;
        let lineage = resolve_lineage(tip, |id| self.branches.get_branch(id))?;
        let root = lineage
            .first()
            .ok_or_else(|| EngineError::validation("lineage resolved to no branches"))?;
        let root_document_id = root.root_document_id.ok_or_else(|| {
            EngineError::validation(format!("lineage root {} has no root document", root.id))
        })?;
        let document = self
            .documents
            .get_document(root_document_id)?
            .ok_or_else(|| EngineError::not_found("document", root_document_id))?;

        let mut events = Vec::new();
        for branch in &lineage {
            events.extend(self.branches.list_events(branch.id)?);
        }

        let mut text = document.extracted_text().to_string();
        let mut phase = None;
        let mut start = 0usize;
        let mut resumed_from = None;
        if use_checkpoints {
            if let Some((restored_text, restored_phase, index)) =
                self.restore_checkpoint(&lineage, events.len())?
            {
                text = restored_text;
                phase = restored_phase;
                start = index;
                resumed_from = u32::try_from(index).ok();
            }
        }

        for stored in &events[start..] {
            let event = EvolutionEvent::parse(stored.event_type.as_str(), &stored.event_payload)
                .map_err(|err| {
                    RepoError::InvalidData(format!("stored event {} is invalid: {err}", stored.id))
                })?;
            text = event.apply(&text).text;
            if let Some(next) = event.phase() {
                phase = Some(next.as_str().to_string());
            }
        }

        Ok(Replay {
            text,
            phase,
            lineage,
            events,
            resumed_from,
        })
    }

    /// Replays and summarizes one branch tip.
    pub fn replay_branch(
        &self,
        branch_id: BranchId,
        use_checkpoints: bool,
    ) -> EngineResult<ReplaySummary> {
        let started_at = Instant::now();
        let replay = self.replay(branch_id, use_checkpoints)?;
        let summary = self.summarize(branch_id, &replay);
        info!(
            "event=branch_replay module=evolution status=ok branch_id={} event_count={} resumed_from={:?} text_hash={} duration_ms={}",
            branch_id,
            summary.event_count,
            summary.resumed_from,
            summary.text_hash,
            started_at.elapsed().as_millis()
        );
        Ok(summary)
    }

    /// Branch, its lineage ids, every lineage event and a replay summary.
    pub fn get_timeline(&self, branch_id: BranchId) -> EngineResult<Timeline> {
        let replay = self.replay(branch_id, true)?;
        let replay_snapshot = self.summarize(branch_id, &replay);
        let lineage: Vec<BranchId> = replay.lineage.iter().map(|branch| branch.id).collect();
        let branch = replay
            .lineage
            .last()
            .cloned()
            .ok_or_else(|| EngineError::not_found("branch", branch_id))?;
        Ok(Timeline {
            branch,
            lineage,
            events: replay.events,
            replay_snapshot,
        })
    }

    /// Writes a checkpoint of the replayed tip state of `branch_id`.
    ///
    /// Returns the stored checkpoint; an existing checkpoint at the same
    /// position is returned unchanged.
    pub fn create_checkpoint(&self, branch_id: BranchId) -> EngineResult<BranchCheckpoint> {
        let replay = self.replay(branch_id, true)?;
        let ids: Vec<BranchId> = replay.lineage.iter().map(|branch| branch.id).collect();
        let event_index = u32::try_from(replay.events.len())
            .map_err(|_| EngineError::validation("lineage has too many events to checkpoint"))?;
        self.branches.atomic(|| -> EngineResult<_> {
            self.write_checkpoint(
                branch_id,
                event_index,
                &replay.text,
                replay.phase.as_deref(),
                &ids,
            )
        })
    }

    /// Merges the replayed texts of two branches into a new branch whose
    /// parent is `left_branch_id`.
    pub fn merge_branches(
        &self,
        left_branch_id: BranchId,
        right_branch_id: BranchId,
        strategy: MergeStrategy,
        mode: BranchMode,
    ) -> EngineResult<MergeOutcome> {
        let started_at = Instant::now();
        let left = self.replay(left_branch_id, true)?;
        let right = self.replay(right_branch_id, true)?;
        let lca_branch_id = find_lca(&left.lineage, &right.lineage);

        let merged_text = merge_texts(&left.text, &right.text, strategy);
        let semantics = conflict_semantics(&left.text, &right.text, &merged_text, strategy);
        let conflict_value = serde_json::to_value(&semantics).map_err(|err| {
            RepoError::InvalidData(format!("cannot encode conflict semantics: {err}"))
        })?;
        let event = EvolutionEvent::Merge(MergePayload {
            seed: 0,
            strategy,
            merged_text,
            left_branch_id: Some(left_branch_id),
            right_branch_id: Some(right_branch_id),
            left_hash: Some(sha256_hex(&left.text)),
            right_hash: Some(sha256_hex(&right.text)),
            conflict_semantics: conflict_value,
        });

        let left_tip = left
            .lineage
            .last()
            .cloned()
            .ok_or_else(|| EngineError::not_found("branch", left_branch_id))?;
        let base = Base {
            text: left.text,
            phase: left.phase,
            root_document_id: left_tip.root_document_id,
            parent: Some(left_tip),
        };
        let cursor_seed = LineageCursor {
            ids: left.lineage.iter().map(|branch| branch.id).collect(),
            event_count: left.events.len(),
        };

        let (branch, event) = self.branches.atomic(|| -> EngineResult<_> {
            let mut cursor = cursor_seed;
            self.spawn(&base, &event, mode, &mut cursor)
        })?;

        info!(
            "event=branch_merge module=evolution status=ok branch_id={} left_branch_id={} right_branch_id={} lca_branch_id={} strategy={} resolution={} duration_ms={}",
            branch.id,
            left_branch_id,
            right_branch_id,
            lca_branch_id.map_or_else(|| "none".to_string(), |id| id.to_string()),
            strategy,
            semantics.resolution,
            started_at.elapsed().as_millis()
        );
        Ok(MergeOutcome {
            branch_id: branch.id,
            event_id: event.id,
            lca_branch_id,
            merged_text_hash: branch.state_snapshot.text_hash,
            conflict_semantics: semantics,
        })
    }

    /// Event-level graph of `branch_id`'s lineage plus the lineages merged
    /// into it.
    pub fn get_visualization(&self, branch_id: BranchId) -> EngineResult<Visualization> {
        let tip = self.get_branch(branch_id)?;
        let primary = resolve_lineage(tip, |id| self.branches.get_branch(id))?;
        let root_document_id = primary.first().and_then(|branch| branch.root_document_id);

        let mut rendered: Vec<(Branch, LineageRole, Vec<BranchEvent>)> = Vec::new();
        let mut seen: HashSet<BranchId> = HashSet::new();
        for branch in primary {
            seen.insert(branch.id);
            let events = self.branches.list_events(branch.id)?;
            rendered.push((branch, LineageRole::Primary, events));
        }

        let mut cursor = 0;
        while cursor < rendered.len() {
            let merged_from: Vec<BranchId> = rendered[cursor]
                .2
                .iter()
                .filter_map(merge_right_branch)
                .collect();
            for right_id in merged_from {
                let Some(right_tip) = self.branches.get_branch(right_id)? else {
                    continue;
                };
                for branch in resolve_lineage(right_tip, |id| self.branches.get_branch(id))? {
                    if seen.insert(branch.id) {
                        let events = self.branches.list_events(branch.id)?;
                        rendered.push((branch, LineageRole::Secondary, events));
                    }
                }
            }
            cursor += 1;
        }

        let first_event: HashMap<BranchId, EventId> = rendered
            .iter()
            .filter_map(|(branch, _, events)| events.first().map(|event| (branch.id, event.id)))
            .collect();
        let last_event: HashMap<BranchId, EventId> = rendered
            .iter()
            .filter_map(|(branch, _, events)| events.last().map(|event| (branch.id, event.id)))
            .collect();

        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        let mut merge_count = 0;
        for (branch, role, events) in &rendered {
            for event in events {
                nodes.push(GraphNode {
                    id: event.id,
                    branch_id: branch.id,
                    branch_name: branch.name.clone(),
                    event_index: event.event_index,
                    event_type: event.event_type,
                    text_hash: event.result_snapshot.text_hash.clone(),
                    preview: event.result_snapshot.preview.clone(),
                    lineage: *role,
                });
                if let Some(right_id) = merge_right_branch(event) {
                    merge_count += 1;
                    if let Some(from) = last_event.get(&right_id) {
                        edges.push(GraphEdge {
                            from: *from,
                            to: event.id,
                            kind: EdgeKind::MergeParent,
                        });
                    }
                }
            }
            for pair in events.windows(2) {
                edges.push(GraphEdge {
                    from: pair[0].id,
                    to: pair[1].id,
                    kind: EdgeKind::Sequence,
                });
            }
            if let Some(parent_id) = branch.parent_branch_id {
                if let (Some(from), Some(to)) =
                    (last_event.get(&parent_id), first_event.get(&branch.id))
                {
                    edges.push(GraphEdge {
                        from: *from,
                        to: *to,
                        kind: EdgeKind::Parent,
                    });
                }
            }
        }

        let primary_branches = rendered
            .iter()
            .filter(|(_, role, _)| *role == LineageRole::Primary)
            .count();
        let summary = GraphSummary {
            tip_branch_id: branch_id,
            root_document_id,
            primary_branches,
            secondary_branches: rendered.len() - primary_branches,
            node_count: nodes.len(),
            edge_count: edges.len(),
            merge_count,
        };
        Ok(Visualization {
            nodes,
            edges,
            summary,
        })
    }

    /// Deletes one branch with its events and checkpoints. Children become
    /// lineage roots.
    pub fn delete_branch(&self, branch_id: BranchId) -> EngineResult<()> {
        let children = self.branches.list_children(branch_id)?.len();
        self.branches.delete_branch(branch_id)?;
        info!(
            "event=branch_delete module=evolution status=ok branch_id={branch_id} orphaned_children={children}"
        );
        Ok(())
    }

    fn resolve_base(
        &self,
        parent_branch_id: Option<BranchId>,
        root_document_id: Option<DocumentId>,
    ) -> EngineResult<Base> {
        if let Some(parent_id) = parent_branch_id {
            return Ok(Base::from_parent(self.get_branch(parent_id)?));
        }
        let Some(document_id) = root_document_id else {
            return Err(EngineError::validation(
                "either parent_branch_id or root_document_id is required",
            ));
        };
        let document = self
            .documents
            .get_document(document_id)?
            .ok_or_else(|| EngineError::not_found("document", document_id))?;
        Ok(Base {
            text: document.extracted_text().to_string(),
            phase: None,
            root_document_id: Some(document_id),
            parent: None,
        })
    }

    fn cursor_for(&self, parent: Option<&Branch>) -> EngineResult<LineageCursor> {
        let Some(parent) = parent else {
            return Ok(LineageCursor {
                ids: Vec::new(),
                event_count: 0,
            });
        };
        let lineage = resolve_lineage(parent.clone(), |id| self.branches.get_branch(id))?;
        let mut event_count = 0;
        for branch in &lineage {
            event_count += self.branches.list_events(branch.id)?.len();
        }
        Ok(LineageCursor {
            ids: lineage.iter().map(|branch| branch.id).collect(),
            event_count,
        })
    }

    /// Writes one branch plus its single event, then an automatic
    /// checkpoint when due. Callers own the unit of work.
    fn spawn(
        &self,
        base: &Base,
        event: &EvolutionEvent,
        mode: BranchMode,
        cursor: &mut LineageCursor,
    ) -> EngineResult<(Branch, BranchEvent)> {
        let outcome = event.apply(&base.text);
        let phase = event
            .phase()
            .map(|phase| phase.as_str().to_string())
            .or_else(|| base.phase.clone());
        let kind = event.kind();
        let created_at = now_ms();
        let branch_id = Uuid::new_v4();

        let branch = Branch {
            id: branch_id,
            name: format!("{kind}-{}", &branch_id.simple().to_string()[..8]),
            parent_branch_id: base.parent.as_ref().map(|parent| parent.id),
            root_document_id: base.root_document_id,
            mode,
            state_snapshot: StateSnapshot::new(outcome.text.clone(), phase.clone()),
            created_at,
        };
        self.branches.create_branch(&branch)?;

        let stored = BranchEvent {
            id: Uuid::new_v4(),
            branch_id,
            event_index: self.branches.next_event_index(branch_id)?,
            event_type: kind,
            event_payload: event.payload(),
            diff_summary: outcome.diff_summary,
            result_snapshot: ResultSnapshot::of(&outcome.text, self.config.preview_chars),
            created_at,
        };
        self.branches.create_event(&stored)?;

        cursor.ids.push(branch_id);
        cursor.event_count += 1;
        if self.config.checkpoint_due(cursor.event_count) {
            let event_index = u32::try_from(cursor.event_count).map_err(|_| {
                EngineError::validation("lineage has too many events to checkpoint")
            })?;
            self.write_checkpoint(
                branch_id,
                event_index,
                &outcome.text,
                phase.as_deref(),
                &cursor.ids,
            )?;
        }

        Ok((branch, stored))
    }

    fn write_checkpoint(
        &self,
        branch_id: BranchId,
        event_index: u32,
        text: &str,
        phase: Option<&str>,
        lineage: &[BranchId],
    ) -> EngineResult<BranchCheckpoint> {
        let snapshot = text_snapshot(text, phase, &lineage_fingerprint(lineage));
        let snapshot_blob = compress(&snapshot).map_err(|err| {
            RepoError::InvalidData(format!("cannot encode checkpoint snapshot: {err}"))
        })?;
        let checkpoint = BranchCheckpoint {
            id: Uuid::new_v4(),
            branch_id,
            event_index,
            snapshot_blob,
            created_at: now_ms(),
        };
        if self.branches.create_checkpoint(&checkpoint)? {
            info!(
                "event=checkpoint_write module=evolution status=ok branch_id={branch_id} event_index={event_index} blob_bytes={}",
                checkpoint.snapshot_blob.len()
            );
            return Ok(checkpoint);
        }
        self.branches
            .get_checkpoint(branch_id, event_index)?
            .ok_or_else(|| EngineError::not_found("checkpoint", checkpoint.id))
    }

    /// Newest usable checkpoint as `(text, phase, events_to_skip)`.
    fn restore_checkpoint(
        &self,
        lineage: &[Branch],
        event_count: usize,
    ) -> EngineResult<Option<(String, Option<String>, usize)>> {
        let ids: Vec<BranchId> = lineage.iter().map(|branch| branch.id).collect();
        let checkpoints = self.branches.list_checkpoints(&ids)?;
        let Some(checkpoint) = latest_checkpoint(&checkpoints, lineage) else {
            return Ok(None);
        };

        let restored = match restore_text(&checkpoint.snapshot_blob) {
            Ok(restored) => restored,
            Err(err) => {
                warn!(
                    "event=checkpoint_restore module=evolution status=fallback checkpoint_id={} reason=decode error={err}",
                    checkpoint.id
                );
                return Ok(None);
            }
        };

        let prefix_len = ids
            .iter()
            .position(|id| *id == checkpoint.branch_id)
            .map_or(0, |position| position + 1);
        let expected = lineage_fingerprint(&ids[..prefix_len]);
        if restored.lineage.as_deref().is_some_and(|stored| stored != expected) {
            warn!(
                "event=checkpoint_restore module=evolution status=fallback checkpoint_id={} reason=lineage_mismatch",
                checkpoint.id
            );
            return Ok(None);
        }

        let skip = (checkpoint.event_index as usize).min(event_count);
        Ok(Some((restored.current_text, restored.phase, skip)))
    }

    fn summarize(&self, branch_id: BranchId, replay: &Replay) -> ReplaySummary {
        let snapshot = ResultSnapshot::of(&replay.text, self.config.preview_chars);
        ReplaySummary {
            branch_id,
            text_hash: snapshot.text_hash,
            preview: snapshot.preview,
            phase: replay.phase.clone(),
            event_count: replay.events.len(),
            resumed_from: replay.resumed_from,
        }
    }
}

/// Text a new branch starts from.
struct Base {
    text: String,
    phase: Option<String>,
    root_document_id: Option<DocumentId>,
    parent: Option<Branch>,
}

impl Base {
    fn from_parent(parent: Branch) -> Self {
        Self {
            text: parent.state_snapshot.current_text.clone(),
            phase: parent.state_snapshot.phase.clone(),
            root_document_id: parent.root_document_id,
            parent: Some(parent),
        }
    }
}

fn merge_right_branch(event: &BranchEvent) -> Option<BranchId> {
    if event.event_type != EventKind::Merge {
        return None;
    }
    event
        .event_payload
        .get("right_branch_id")
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
}

fn log_rejected(operation: &str, event_type: &str, err: &impl std::fmt::Display) {
    let event_type: String = event_type.chars().take(40).collect();
    warn!(
        "event={operation} module=evolution status=rejected error_code=validation event_type={event_type:?} error={err}"
    );
}
