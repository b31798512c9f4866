//! Document ingest use-case service.
//!
//! # Responsibility
//! - Store plain text as a document and atomize it at every level.
//! - Deduplicate re-ingest of identical text by checksum.
//!
//! # Invariants
//! - The document row and its atoms are written in one unit of work.
//! - Extracted text of an existing document never changes; `force`
//!   rebuilds atoms only.

use log::info;
use serde::Serialize;
use std::time::Instant;

use super::{EngineError, EngineResult};
use crate::atomize::atomize;
use crate::digest::sha256_hex;
use crate::model::atom::{Atom, AtomLevel};
use crate::model::document::{Document, DocumentId};
use crate::repo::document_repo::DocumentRepository;
use crate::repo::now_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    Created,
    /// Same checksum already stored and `force` was not set.
    Unchanged,
    /// Same checksum already stored; atoms rebuilt under `force`.
    Replaced,
}

impl IngestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Unchanged => "unchanged",
            Self::Replaced => "replaced",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub status: IngestStatus,
    pub document: Document,
    pub atom_count: usize,
}

pub struct DocumentService<R: DocumentRepository> {
    repo: R,
}

impl<R: DocumentRepository> DocumentService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Ingests `text` under `title`.
    ///
    /// # Errors
    /// - `Validation` when `text` is blank.
    pub fn ingest_text(
        &self,
        title: impl Into<String>,
        text: impl Into<String>,
        force: bool,
    ) -> EngineResult<IngestOutcome> {
        let started_at = Instant::now();
        let title = title.into();
        let text = text.into();
        if text.trim().is_empty() {
            return Err(EngineError::validation("document text must not be empty"));
        }

        let checksum = sha256_hex(&text);
        let outcome = self.repo.atomic(|| -> EngineResult<IngestOutcome> {
            if let Some(mut existing) = self.repo.find_by_checksum(&checksum)? {
                if !force {
                    let atom_count = self.repo.list_atoms(existing.id, None)?.len();
                    return Ok(IngestOutcome {
                        status: IngestStatus::Unchanged,
                        document: existing,
                        atom_count,
                    });
                }
                existing.title = title.clone();
                self.repo.update_document(&existing)?;
                let atoms = atomize(existing.id, existing.extracted_text());
                let atom_count = self.repo.replace_atoms(existing.id, &atoms)?;
                return Ok(IngestOutcome {
                    status: IngestStatus::Replaced,
                    document: existing,
                    atom_count,
                });
            }

            let mut document = Document::from_text(title.clone(), text.clone());
            document.created_at = now_ms();
            self.repo.insert_document(&document)?;
            let atoms = atomize(document.id, &text);
            let atom_count = self.repo.replace_atoms(document.id, &atoms)?;
            Ok(IngestOutcome {
                status: IngestStatus::Created,
                document,
                atom_count,
            })
        })?;

        info!(
            "event=document_ingest module=document status=ok document_id={} ingest_status={} checksum={} atom_count={} duration_ms={}",
            outcome.document.id,
            outcome.status.as_str(),
            outcome.document.checksum,
            outcome.atom_count,
            started_at.elapsed().as_millis()
        );
        Ok(outcome)
    }

    /// # Errors
    /// - `NotFound` when the document does not exist.
    pub fn get_document(&self, id: DocumentId) -> EngineResult<Document> {
        self.repo
            .get_document(id)?
            .ok_or_else(|| EngineError::not_found("document", id))
    }

    /// Atoms of one document in ordinal order, optionally one level only.
    pub fn list_atoms(
        &self,
        document_id: DocumentId,
        level: Option<AtomLevel>,
    ) -> EngineResult<Vec<Atom>> {
        self.get_document(document_id)?;
        Ok(self.repo.list_atoms(document_id, level)?)
    }
}
