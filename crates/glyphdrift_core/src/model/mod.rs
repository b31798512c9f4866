//! Domain model for documents, atoms, branch lineages and remix records.
//!
//! # Responsibility
//! - Define canonical data structures used by the evolution and remix engines.
//! - Keep persisted shapes serde-friendly so services can return them as-is.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Branches, events, checkpoints and remix artifacts are immutable after
//!   creation; new state is always a new row.

pub mod atom;
pub mod branch;
pub mod document;
pub mod remix;
