//! Document and atom repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Atoms are listed in `(level, ordinal)` order, smallest level first.
//! - `replace_atoms` swaps the whole atom set of a document.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{
    atomic, now_ms, parse_json, parse_u32, parse_uuid, to_json, RepoError, RepoResult,
};
use crate::model::atom::{Atom, AtomLevel};
use crate::model::document::{Document, DocumentId};

const DOCUMENT_SELECT_SQL: &str = "SELECT
    document_uuid,
    title,
    checksum,
    provenance,
    created_at
FROM documents";

pub trait DocumentRepository {
    fn insert_document(&self, document: &Document) -> RepoResult<()>;
    /// Updates title and provenance of an existing row.
    fn update_document(&self, document: &Document) -> RepoResult<()>;
    fn get_document(&self, id: DocumentId) -> RepoResult<Option<Document>>;
    /// Oldest document with `checksum`, if any.
    fn find_by_checksum(&self, checksum: &str) -> RepoResult<Option<Document>>;
    /// Deletes existing atoms of `document_id` and inserts `atoms`.
    fn replace_atoms(&self, document_id: DocumentId, atoms: &[Atom]) -> RepoResult<usize>;
    /// Atoms of one document, optionally restricted to one level.
    fn list_atoms(&self, document_id: DocumentId, level: Option<AtomLevel>)
        -> RepoResult<Vec<Atom>>;
    fn atomic<T, E>(&self, work: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepoError>;
}

pub struct SqliteDocumentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDocumentRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl DocumentRepository for SqliteDocumentRepository<'_> {
    fn insert_document(&self, document: &Document) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO documents (
                document_uuid,
                title,
                checksum,
                provenance,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?5);",
            params![
                document.id.to_string(),
                document.title.as_str(),
                document.checksum.as_str(),
                to_json(&document.provenance, "documents.provenance")?,
                document.created_at,
            ],
        )?;
        Ok(())
    }

    fn update_document(&self, document: &Document) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE documents
             SET title = ?2,
                 checksum = ?3,
                 provenance = ?4,
                 updated_at = ?5
             WHERE document_uuid = ?1;",
            params![
                document.id.to_string(),
                document.title.as_str(),
                document.checksum.as_str(),
                to_json(&document.provenance, "documents.provenance")?,
                now_ms(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "document",
                id: document.id,
            });
        }
        Ok(())
    }

    fn get_document(&self, id: DocumentId) -> RepoResult<Option<Document>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{DOCUMENT_SELECT_SQL} WHERE document_uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_document_row(row)?)),
            None => Ok(None),
        }
    }

    fn find_by_checksum(&self, checksum: &str) -> RepoResult<Option<Document>> {
        let id: Option<String> = self
            .conn
            .query_row(
                "SELECT document_uuid
                 FROM documents
                 WHERE checksum = ?1
                 ORDER BY created_at ASC, document_uuid ASC
                 LIMIT 1;",
                [checksum],
                |row| row.get(0),
            )
            .optional()?;
        match id {
            Some(id) => self.get_document(parse_uuid(&id, "documents.document_uuid")?),
            None => Ok(None),
        }
    }

    fn replace_atoms(&self, document_id: DocumentId, atoms: &[Atom]) -> RepoResult<usize> {
        self.atomic(|| {
            self.conn.execute(
                "DELETE FROM atoms WHERE document_uuid = ?1;",
                [document_id.to_string()],
            )?;
            let mut stmt = self.conn.prepare(
                "INSERT INTO atoms (atom_uuid, document_uuid, atom_level, ordinal, content)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
            )?;
            for atom in atoms {
                stmt.execute(params![
                    atom.id.to_string(),
                    document_id.to_string(),
                    atom.level.as_str(),
                    i64::from(atom.ordinal),
                    atom.content.as_str(),
                ])?;
            }
            Ok(atoms.len())
        })
    }

    fn list_atoms(
        &self,
        document_id: DocumentId,
        level: Option<AtomLevel>,
    ) -> RepoResult<Vec<Atom>> {
        let mut stmt = self.conn.prepare(
            "SELECT atom_uuid, document_uuid, atom_level, ordinal, content
             FROM atoms
             WHERE document_uuid = ?1
               AND (?2 IS NULL OR atom_level = ?2)
             ORDER BY ordinal ASC;",
        )?;
        let mut rows = stmt.query(params![
            document_id.to_string(),
            level.map(AtomLevel::as_str)
        ])?;

        let mut atoms = Vec::new();
        while let Some(row) = rows.next()? {
            atoms.push(parse_atom_row(row)?);
        }
        atoms.sort_by_key(|atom| (atom.level, atom.ordinal));
        Ok(atoms)
    }

    fn atomic<T, E>(&self, work: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepoError>,
    {
        atomic(self.conn, work)
    }
}

fn parse_document_row(row: &Row<'_>) -> RepoResult<Document> {
    let id: String = row.get("document_uuid")?;
    let provenance: String = row.get("provenance")?;
    Ok(Document {
        id: parse_uuid(&id, "documents.document_uuid")?,
        title: row.get("title")?,
        checksum: row.get("checksum")?,
        provenance: parse_json(&provenance, "documents.provenance")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_atom_row(row: &Row<'_>) -> RepoResult<Atom> {
    let id: String = row.get("atom_uuid")?;
    let document_id: String = row.get("document_uuid")?;
    let level: String = row.get("atom_level")?;
    Ok(Atom {
        id: parse_uuid(&id, "atoms.atom_uuid")?,
        document_id: parse_uuid(&document_id, "atoms.document_uuid")?,
        level: AtomLevel::parse(&level).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid atom level `{level}` in atoms.atom_level"))
        })?,
        ordinal: parse_u32(row.get("ordinal")?, "atoms.ordinal")?,
        content: row.get("content")?,
    })
}
