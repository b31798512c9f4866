//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define persistence contracts for documents, branches and remix
//!   artifacts.
//! - Keep SQL details out of the service layer.
//!
//! # Invariants
//! - Read paths reject malformed persisted rows with `InvalidData` instead
//!   of masking them.
//! - All repositories built on one connection share its unit of work; see
//!   [`atomic`].

use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::de::DeserializeOwned;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::db::DbError;

pub mod branch_repo;
pub mod document_repo;
pub mod remix_repo;

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound { entity: &'static str, id: Uuid },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Runs `work` inside one IMMEDIATE transaction on `conn`.
///
/// Nested calls join the enclosing transaction. Any error returned by `work`
/// rolls back every write it made, through any repository sharing `conn`.
pub fn atomic<T, E>(conn: &Connection, work: impl FnOnce() -> Result<T, E>) -> Result<T, E>
where
    E: From<RepoError>,
{
    if !conn.is_autocommit() {
        return work();
    }

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(RepoError::from)?;
    let value = work()?;
    tx.commit().map_err(RepoError::from)?;
    Ok(value)
}

/// Current wall-clock time in epoch milliseconds.
pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_optional_uuid(
    value: Option<String>,
    column: &'static str,
) -> RepoResult<Option<Uuid>> {
    value.map(|value| parse_uuid(&value, column)).transpose()
}

pub(crate) fn parse_json<T: DeserializeOwned>(value: &str, column: &'static str) -> RepoResult<T> {
    serde_json::from_str(value)
        .map_err(|err| RepoError::InvalidData(format!("invalid JSON in {column}: {err}")))
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T, column: &'static str) -> RepoResult<String> {
    serde_json::to_string(value)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode {column}: {err}")))
}

pub(crate) fn parse_u32(value: i64, column: &'static str) -> RepoResult<u32> {
    u32::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("out of range value `{value}` in {column}")))
}
