//! Branch, event and checkpoint repository contracts and SQLite
//! implementation.
//!
//! # Responsibility
//! - Persist lineage nodes, their events and replay checkpoints.
//! - Provide the unit of work that keeps a branch and its first event
//!   together.
//!
//! # Invariants
//! - Events are listed by `event_index ASC` within one branch.
//! - `next_event_index` is `max + 1` per branch, starting at 1.
//! - Deleting a branch cascades its events and checkpoints and sets
//!   children's `parent_branch_uuid` to NULL.

use rusqlite::{params, Connection, Row};

use super::{
    atomic, parse_json, parse_optional_uuid, parse_u32, parse_uuid, to_json, RepoError,
    RepoResult,
};
use crate::evolution::EventKind;
use crate::model::branch::{Branch, BranchCheckpoint, BranchEvent, BranchId, BranchMode};

const BRANCH_SELECT_SQL: &str = "SELECT
    branch_uuid,
    name,
    parent_branch_uuid,
    root_document_uuid,
    mode,
    state_snapshot,
    created_at
FROM branches";

const EVENT_SELECT_SQL: &str = "SELECT
    event_uuid,
    branch_uuid,
    event_index,
    event_type,
    event_payload,
    diff_summary,
    result_snapshot,
    created_at
FROM branch_events";

const CHECKPOINT_SELECT_SQL: &str = "SELECT
    checkpoint_uuid,
    branch_uuid,
    event_index,
    snapshot_blob,
    created_at
FROM branch_checkpoints";

pub trait BranchRepository {
    fn create_branch(&self, branch: &Branch) -> RepoResult<()>;
    fn get_branch(&self, id: BranchId) -> RepoResult<Option<Branch>>;
    fn list_children(&self, id: BranchId) -> RepoResult<Vec<Branch>>;
    /// Deletes one branch; fails with `NotFound` when absent.
    fn delete_branch(&self, id: BranchId) -> RepoResult<()>;

    fn create_event(&self, event: &BranchEvent) -> RepoResult<()>;
    fn list_events(&self, branch_id: BranchId) -> RepoResult<Vec<BranchEvent>>;
    fn next_event_index(&self, branch_id: BranchId) -> RepoResult<u32>;

    /// Stores a checkpoint; returns `false` when `(branch, event_index)`
    /// already had one and nothing was written.
    fn create_checkpoint(&self, checkpoint: &BranchCheckpoint) -> RepoResult<bool>;
    fn get_checkpoint(
        &self,
        branch_id: BranchId,
        event_index: u32,
    ) -> RepoResult<Option<BranchCheckpoint>>;
    fn list_checkpoints(&self, branch_ids: &[BranchId]) -> RepoResult<Vec<BranchCheckpoint>>;

    fn atomic<T, E>(&self, work: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepoError>;
}

pub struct SqliteBranchRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBranchRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl BranchRepository for SqliteBranchRepository<'_> {
    fn create_branch(&self, branch: &Branch) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO branches (
                branch_uuid,
                name,
                parent_branch_uuid,
                root_document_uuid,
                mode,
                state_snapshot,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                branch.id.to_string(),
                branch.name.as_str(),
                branch.parent_branch_id.map(|id| id.to_string()),
                branch.root_document_id.map(|id| id.to_string()),
                branch.mode.as_str(),
                to_json(&branch.state_snapshot, "branches.state_snapshot")?,
                branch.created_at,
            ],
        )?;
        Ok(())
    }

    fn get_branch(&self, id: BranchId) -> RepoResult<Option<Branch>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{BRANCH_SELECT_SQL} WHERE branch_uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_branch_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_children(&self, id: BranchId) -> RepoResult<Vec<Branch>> {
        let mut stmt = self.conn.prepare(&format!(
            "{BRANCH_SELECT_SQL}
             WHERE parent_branch_uuid = ?1
             ORDER BY created_at ASC, branch_uuid ASC;"
        ))?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut branches = Vec::new();
        while let Some(row) = rows.next()? {
            branches.push(parse_branch_row(row)?);
        }
        Ok(branches)
    }

    fn delete_branch(&self, id: BranchId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM branches WHERE branch_uuid = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "branch",
                id,
            });
        }
        Ok(())
    }

    fn create_event(&self, event: &BranchEvent) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO branch_events (
                event_uuid,
                branch_uuid,
                event_index,
                event_type,
                event_payload,
                diff_summary,
                result_snapshot,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                event.id.to_string(),
                event.branch_id.to_string(),
                i64::from(event.event_index),
                event.event_type.as_str(),
                to_json(&event.event_payload, "branch_events.event_payload")?,
                to_json(&event.diff_summary, "branch_events.diff_summary")?,
                to_json(&event.result_snapshot, "branch_events.result_snapshot")?,
                event.created_at,
            ],
        )?;
        Ok(())
    }

    fn list_events(&self, branch_id: BranchId) -> RepoResult<Vec<BranchEvent>> {
        let mut stmt = self.conn.prepare(&format!(
            "{EVENT_SELECT_SQL}
             WHERE branch_uuid = ?1
             ORDER BY event_index ASC;"
        ))?;
        let mut rows = stmt.query([branch_id.to_string()])?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_event_row(row)?);
        }
        Ok(events)
    }

    fn next_event_index(&self, branch_id: BranchId) -> RepoResult<u32> {
        let next: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(event_index), 0) + 1
             FROM branch_events
             WHERE branch_uuid = ?1;",
            [branch_id.to_string()],
            |row| row.get(0),
        )?;
        parse_u32(next, "branch_events.event_index")
    }

    fn create_checkpoint(&self, checkpoint: &BranchCheckpoint) -> RepoResult<bool> {
        let inserted = self.conn.execute(
            "INSERT INTO branch_checkpoints (
                checkpoint_uuid,
                branch_uuid,
                event_index,
                snapshot_blob,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (branch_uuid, event_index) DO NOTHING;",
            params![
                checkpoint.id.to_string(),
                checkpoint.branch_id.to_string(),
                i64::from(checkpoint.event_index),
                checkpoint.snapshot_blob.as_str(),
                checkpoint.created_at,
            ],
        )?;
        Ok(inserted == 1)
    }

    fn get_checkpoint(
        &self,
        branch_id: BranchId,
        event_index: u32,
    ) -> RepoResult<Option<BranchCheckpoint>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CHECKPOINT_SELECT_SQL}
             WHERE branch_uuid = ?1
               AND event_index = ?2;"
        ))?;
        let mut rows = stmt.query(params![branch_id.to_string(), i64::from(event_index)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_checkpoint_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_checkpoints(&self, branch_ids: &[BranchId]) -> RepoResult<Vec<BranchCheckpoint>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CHECKPOINT_SELECT_SQL}
             WHERE branch_uuid = ?1
             ORDER BY event_index ASC, created_at ASC;"
        ))?;
        let mut checkpoints = Vec::new();
        for branch_id in branch_ids {
            let mut rows = stmt.query([branch_id.to_string()])?;
            while let Some(row) = rows.next()? {
                checkpoints.push(parse_checkpoint_row(row)?);
            }
        }
        Ok(checkpoints)
    }

    fn atomic<T, E>(&self, work: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepoError>,
    {
        atomic(self.conn, work)
    }
}

fn parse_branch_row(row: &Row<'_>) -> RepoResult<Branch> {
    let id: String = row.get("branch_uuid")?;
    let mode: String = row.get("mode")?;
    let snapshot: String = row.get("state_snapshot")?;
    Ok(Branch {
        id: parse_uuid(&id, "branches.branch_uuid")?,
        name: row.get("name")?,
        parent_branch_id: parse_optional_uuid(
            row.get("parent_branch_uuid")?,
            "branches.parent_branch_uuid",
        )?,
        root_document_id: parse_optional_uuid(
            row.get("root_document_uuid")?,
            "branches.root_document_uuid",
        )?,
        mode: BranchMode::parse(&mode).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid mode `{mode}` in branches.mode"))
        })?,
        state_snapshot: parse_json(&snapshot, "branches.state_snapshot")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_event_row(row: &Row<'_>) -> RepoResult<BranchEvent> {
    let id: String = row.get("event_uuid")?;
    let branch_id: String = row.get("branch_uuid")?;
    let event_type: String = row.get("event_type")?;
    let payload: String = row.get("event_payload")?;
    let diff_summary: String = row.get("diff_summary")?;
    let result_snapshot: String = row.get("result_snapshot")?;
    Ok(BranchEvent {
        id: parse_uuid(&id, "branch_events.event_uuid")?,
        branch_id: parse_uuid(&branch_id, "branch_events.branch_uuid")?,
        event_index: parse_u32(row.get("event_index")?, "branch_events.event_index")?,
        event_type: EventKind::parse(&event_type).map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid event type `{event_type}` in branch_events.event_type"
            ))
        })?,
        event_payload: parse_json(&payload, "branch_events.event_payload")?,
        diff_summary: parse_json(&diff_summary, "branch_events.diff_summary")?,
        result_snapshot: parse_json(&result_snapshot, "branch_events.result_snapshot")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_checkpoint_row(row: &Row<'_>) -> RepoResult<BranchCheckpoint> {
    let id: String = row.get("checkpoint_uuid")?;
    let branch_id: String = row.get("branch_uuid")?;
    Ok(BranchCheckpoint {
        id: parse_uuid(&id, "branch_checkpoints.checkpoint_uuid")?,
        branch_id: parse_uuid(&branch_id, "branch_checkpoints.branch_uuid")?,
        event_index: parse_u32(row.get("event_index")?, "branch_checkpoints.event_index")?,
        snapshot_blob: row.get("snapshot_blob")?,
        created_at: row.get("created_at")?,
    })
}
