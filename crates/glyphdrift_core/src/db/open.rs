//! Connection bootstrap.
//!
//! # Invariants
//! - `foreign_keys=ON` on every returned connection; branch deletes depend
//!   on `ON DELETE CASCADE` for events and `SET NULL` for child branches.
//! - File databases run in WAL mode with a busy timeout.
//! - Migrations are fully applied before a connection is handed out.

use super::migrations::apply_migrations;
use super::DbResult;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Storage {
    File,
    Memory,
}

impl Storage {
    fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Memory => "memory",
        }
    }
}

/// Opens (creating if needed) a database file and migrates it.
///
/// Missing parent directories are created.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    open_with(Storage::File, || {
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Connection::open(path)?)
    })
}

/// Opens a migrated in-memory database. Used by tests and by CLI runs
/// without `--db`.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_with(Storage::Memory, || Ok(Connection::open_in_memory()?))
}

fn open_with(
    storage: Storage,
    connect: impl FnOnce() -> DbResult<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = storage.as_str();

    let result = connect().and_then(|mut conn| {
        configure(&conn, storage)?;
        apply_migrations(&mut conn)?;
        Ok(conn)
    });

    match &result {
        Ok(_) => info!(
            "event=db_open module=db status=ok mode={mode} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error mode={mode} duration_ms={} error={err}",
            started_at.elapsed().as_millis()
        ),
    }
    result
}

fn configure(conn: &Connection, storage: Storage) -> DbResult<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    if storage == Storage::File {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
    }
    Ok(())
}
