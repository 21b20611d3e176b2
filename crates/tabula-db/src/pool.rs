//! Connection pools for Tabula databases.
//!
//! Every pooled connection is prepared for the engine's child tables:
//! foreign keys are enforced, so deleting a parent row cascades to its array
//! elements and a primary-key swap carries the elements along. File
//! databases run in WAL mode so readers never wait on the single writer.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};

use crate::error::DbError;

/// Path that selects a private in-memory database.
pub const MEMORY_PATH: &str = ":memory:";

/// Runtime tunables for pooled connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// How long a statement waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled connections. Ignored for [`MEMORY_PATH`].
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

/// Pool of connections to one Tabula database.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Number of connections a pool for `db_path` may hold.
///
/// Each connection to `:memory:` opens its own empty database, so an
/// in-memory pool holds exactly one connection and every model shares it.
pub fn effective_pool_size(db_path: &str, settings: DbRuntimeSettings) -> u32 {
    if db_path == MEMORY_PATH {
        1
    } else {
        settings.pool_max_size.max(1)
    }
}

/// Builds the pool for `db_path`.
///
/// # Errors
///
/// Returns `DbError::Pool` if the first connection cannot be opened or
/// prepared.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, DbError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let in_memory = db_path == MEMORY_PATH;

    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(flags)
        .with_init(move |conn| prepare_connection(conn, in_memory, settings.busy_timeout_ms));

    let pool = Pool::builder()
        .max_size(effective_pool_size(db_path, settings))
        .build(manager)?;

    Ok(pool)
}

fn prepare_connection(
    conn: &mut Connection,
    in_memory: bool,
    busy_timeout_ms: u64,
) -> Result<(), rusqlite::Error> {
    if !in_memory {
        let journal_mode: String =
            conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
        if !journal_mode.eq_ignore_ascii_case("wal") {
            return Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("failed to set WAL journal mode, got: {journal_mode}")),
            ));
        }
    }
    conn.execute_batch(&format!(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = {busy_timeout_ms};"
    ))
}
