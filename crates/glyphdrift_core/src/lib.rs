//! Core engine for glyphdrift.
//! Branching text-evolution lineages with deterministic replay, merge and
//! remix. This crate is the single source of truth for engine invariants.

pub mod atomize;
pub mod checkpoint;
pub mod config;
pub mod db;
pub mod digest;
pub mod evolution;
pub mod lineage;
pub mod logging;
pub mod merge;
pub mod model;
pub mod remix;
pub mod repo;
pub mod rng;
pub mod service;

pub use config::{ConfigError, EngineConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use evolution::{apply, EventKind, EvolutionEvent, TransformError, TransformOutcome};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use merge::MergeStrategy;
pub use model::atom::{Atom, AtomId, AtomLevel};
pub use model::branch::{Branch, BranchCheckpoint, BranchEvent, BranchId, BranchMode};
pub use model::document::{Document, DocumentId};
pub use model::remix::{ArtifactId, AtomRef, AtomRole, RemixArtifact, RemixSourceLink};
pub use remix::RemixStrategy;
pub use repo::branch_repo::{BranchRepository, SqliteBranchRepository};
pub use repo::document_repo::{DocumentRepository, SqliteDocumentRepository};
pub use repo::remix_repo::{RemixRepository, SqliteRemixRepository};
pub use repo::{RepoError, RepoResult};
pub use service::document_service::{DocumentService, IngestOutcome, IngestStatus};
pub use service::evolution_service::{
    EventStep, EvolutionService, EvolveOutcome, MergeOutcome, MultiEvolveOutcome, Replay,
    ReplaySummary, Timeline, Visualization,
};
pub use service::remix_service::{ComposeOutcome, ComposeRequest, RemixService, RemixSide};
pub use service::{EngineError, EngineResult};

/// SQLite-backed evolution service over one connection.
pub type SqliteEvolutionService<'conn> =
    EvolutionService<SqliteDocumentRepository<'conn>, SqliteBranchRepository<'conn>>;

/// SQLite-backed remix service over one connection.
pub type SqliteRemixService<'conn> = RemixService<
    SqliteDocumentRepository<'conn>,
    SqliteBranchRepository<'conn>,
    SqliteRemixRepository<'conn>,
>;

/// Builds the evolution service with every repository on `conn`.
pub fn evolution_service(
    conn: &rusqlite::Connection,
    config: EngineConfig,
) -> SqliteEvolutionService<'_> {
    EvolutionService::new(
        SqliteDocumentRepository::new(conn),
        SqliteBranchRepository::new(conn),
        config,
    )
}

/// Builds the remix service with every repository on `conn`, so remix
/// branches and artifacts share one unit of work.
pub fn remix_service(conn: &rusqlite::Connection, config: EngineConfig) -> SqliteRemixService<'_> {
    RemixService::new(
        evolution_service(conn, config),
        SqliteDocumentRepository::new(conn),
        SqliteRemixRepository::new(conn),
    )
}

/// Builds the document ingest service on `conn`.
pub fn document_service(
    conn: &rusqlite::Connection,
) -> DocumentService<SqliteDocumentRepository<'_>> {
    DocumentService::new(SqliteDocumentRepository::new(conn))
}
