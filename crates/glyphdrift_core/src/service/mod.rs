//! Engine use-case services.
//!
//! # Responsibility
//! - Orchestrate repositories and pure engine modules into the operations
//!   callers invoke.
//! - Map lower-layer failures into one error taxonomy.
//!
//! # Invariants
//! - Validation and not-found checks complete before the first write.
//! - Multi-row operations run inside one unit of work.

use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

use crate::evolution::TransformError;
use crate::remix::RemixError;
use crate::repo::RepoError;

pub mod document_service;
pub mod evolution_service;
pub mod remix_service;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug)]
pub enum EngineError {
    /// Bad input rejected before any state change.
    Validation(String),
    NotFound { entity: &'static str, id: Uuid },
    Repo(RepoError),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    /// Stable code used in log records.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound { .. } => "not_found",
            Self::Repo(_) => "repo",
        }
    }
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "validation failed: {message}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for EngineError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Repo(other),
        }
    }
}

impl From<TransformError> for EngineError {
    fn from(value: TransformError) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<RemixError> for EngineError {
    fn from(value: RemixError) -> Self {
        Self::Validation(value.to_string())
    }
}
