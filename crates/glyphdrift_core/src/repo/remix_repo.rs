//! Remix artifact repository contract and SQLite implementation.

use rusqlite::{params, Connection, Row};

use super::{
    atomic, parse_json, parse_optional_uuid, parse_u32, parse_uuid, to_json, RepoError,
    RepoResult,
};
use crate::model::atom::AtomLevel;
use crate::model::branch::BranchMode;
use crate::model::remix::{ArtifactId, AtomRef, AtomRole, RemixArtifact, RemixSourceLink};
use crate::remix::RemixStrategy;

pub trait RemixRepository {
    /// Inserts the artifact row and all of its links.
    fn insert_artifact(&self, artifact: &RemixArtifact, links: &[RemixSourceLink])
        -> RepoResult<()>;
    fn get_artifact(&self, id: ArtifactId) -> RepoResult<Option<RemixArtifact>>;
    /// Links of one artifact by `position ASC`.
    fn list_links(&self, artifact_id: ArtifactId) -> RepoResult<Vec<RemixSourceLink>>;
    fn atomic<T, E>(&self, work: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepoError>;
}

pub struct SqliteRemixRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRemixRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl RemixRepository for SqliteRemixRepository<'_> {
    fn insert_artifact(
        &self,
        artifact: &RemixArtifact,
        links: &[RemixSourceLink],
    ) -> RepoResult<()> {
        self.atomic(|| {
            self.conn.execute(
                "INSERT INTO remix_artifacts (
                    artifact_uuid,
                    strategy,
                    seed,
                    source_document_uuid,
                    source_branch_uuid,
                    target_document_uuid,
                    target_branch_uuid,
                    atom_levels,
                    remixed_text,
                    text_hash,
                    payload_hash,
                    branch_uuid,
                    mode,
                    created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14);",
                params![
                    artifact.id.to_string(),
                    artifact.strategy.as_str(),
                    artifact.seed,
                    artifact.source_document_id.map(|id| id.to_string()),
                    artifact.source_branch_id.map(|id| id.to_string()),
                    artifact.target_document_id.map(|id| id.to_string()),
                    artifact.target_branch_id.map(|id| id.to_string()),
                    to_json(&artifact.atom_levels, "remix_artifacts.atom_levels")?,
                    artifact.remixed_text.as_str(),
                    artifact.text_hash.as_str(),
                    artifact.payload_hash.as_str(),
                    artifact.branch_id.map(|id| id.to_string()),
                    artifact.mode.as_str(),
                    artifact.created_at,
                ],
            )?;

            let mut stmt = self.conn.prepare(
                "INSERT INTO remix_source_links (
                    link_uuid,
                    artifact_uuid,
                    role,
                    atom_uuid,
                    atom_level,
                    ordinal,
                    position
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            )?;
            for link in links {
                stmt.execute(params![
                    link.id.to_string(),
                    link.artifact_id.to_string(),
                    link.atom.role.as_str(),
                    link.atom.atom_id.to_string(),
                    link.atom.atom_level.as_str(),
                    i64::from(link.atom.ordinal),
                    i64::from(link.position),
                ])?;
            }
            Ok(())
        })
    }

    fn get_artifact(&self, id: ArtifactId) -> RepoResult<Option<RemixArtifact>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                artifact_uuid,
                strategy,
                seed,
                source_document_uuid,
                source_branch_uuid,
                target_document_uuid,
                target_branch_uuid,
                atom_levels,
                remixed_text,
                text_hash,
                payload_hash,
                branch_uuid,
                mode,
                created_at
             FROM remix_artifacts
             WHERE artifact_uuid = ?1;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_artifact_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_links(&self, artifact_id: ArtifactId) -> RepoResult<Vec<RemixSourceLink>> {
        let mut stmt = self.conn.prepare(
            "SELECT link_uuid, artifact_uuid, role, atom_uuid, atom_level, ordinal, position
             FROM remix_source_links
             WHERE artifact_uuid = ?1
             ORDER BY position ASC;",
        )?;
        let mut rows = stmt.query([artifact_id.to_string()])?;
        let mut links = Vec::new();
        while let Some(row) = rows.next()? {
            links.push(parse_link_row(row)?);
        }
        Ok(links)
    }

    fn atomic<T, E>(&self, work: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepoError>,
    {
        atomic(self.conn, work)
    }
}

fn parse_artifact_row(row: &Row<'_>) -> RepoResult<RemixArtifact> {
    let id: String = row.get("artifact_uuid")?;
    let strategy: String = row.get("strategy")?;
    let atom_levels: String = row.get("atom_levels")?;
    let mode: String = row.get("mode")?;
    Ok(RemixArtifact {
        id: parse_uuid(&id, "remix_artifacts.artifact_uuid")?,
        strategy: RemixStrategy::parse(&strategy).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid strategy `{strategy}` in remix_artifacts.strategy"
            ))
        })?,
        seed: row.get("seed")?,
        source_document_id: parse_optional_uuid(
            row.get("source_document_uuid")?,
            "remix_artifacts.source_document_uuid",
        )?,
        source_branch_id: parse_optional_uuid(
            row.get("source_branch_uuid")?,
            "remix_artifacts.source_branch_uuid",
        )?,
        target_document_id: parse_optional_uuid(
            row.get("target_document_uuid")?,
            "remix_artifacts.target_document_uuid",
        )?,
        target_branch_id: parse_optional_uuid(
            row.get("target_branch_uuid")?,
            "remix_artifacts.target_branch_uuid",
        )?,
        atom_levels: parse_json(&atom_levels, "remix_artifacts.atom_levels")?,
        remixed_text: row.get("remixed_text")?,
        text_hash: row.get("text_hash")?,
        payload_hash: row.get("payload_hash")?,
        branch_id: parse_optional_uuid(row.get("branch_uuid")?, "remix_artifacts.branch_uuid")?,
        mode: BranchMode::parse(&mode).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid mode `{mode}` in remix_artifacts.mode"))
        })?,
        created_at: row.get("created_at")?,
    })
}

fn parse_link_row(row: &Row<'_>) -> RepoResult<RemixSourceLink> {
    let id: String = row.get("link_uuid")?;
    let artifact_id: String = row.get("artifact_uuid")?;
    let role: String = row.get("role")?;
    let atom_id: String = row.get("atom_uuid")?;
    let level: String = row.get("atom_level")?;
    Ok(RemixSourceLink {
        id: parse_uuid(&id, "remix_source_links.link_uuid")?,
        artifact_id: parse_uuid(&artifact_id, "remix_source_links.artifact_uuid")?,
        position: parse_u32(row.get("position")?, "remix_source_links.position")?,
        atom: AtomRef {
            atom_id: parse_uuid(&atom_id, "remix_source_links.atom_uuid")?,
            atom_level: AtomLevel::parse(&level).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid atom level `{level}` in remix_source_links.atom_level"
                ))
            })?,
            ordinal: parse_u32(row.get("ordinal")?, "remix_source_links.ordinal")?,
            role: AtomRole::parse(&role).ok_or_else(|| {
                RepoError::InvalidData(format!("invalid role `{role}` in remix_source_links.role"))
            })?,
        },
    })
}
