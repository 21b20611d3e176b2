//! Explicit open/close handle around the connection pool.

use parking_lot::RwLock;
use rusqlite::{Connection, OpenFlags};

use crate::error::DbError;
use crate::pool::{create_pool, DbPool, DbRuntimeSettings, MEMORY_PATH};

/// A lazily opened, explicitly closed SQLite database.
///
/// Models share one `Database` (usually behind an `Arc`). Opening is
/// idempotent: concurrent callers racing on a closed handle build exactly one
/// pool. Every operation after [`close`](Self::close) fails with
/// [`DbError::NoDb`] until the handle is opened again.
pub struct Database {
    path: String,
    settings: DbRuntimeSettings,
    pool: RwLock<Option<DbPool>>,
}

impl Database {
    /// Creates a closed handle for the database at `path`.
    pub fn new(path: impl Into<String>, settings: DbRuntimeSettings) -> Self {
        Self {
            path: path.into(),
            settings,
            pool: RwLock::new(None),
        }
    }

    /// Creates a closed handle for a private in-memory database.
    pub fn in_memory() -> Self {
        Self::new(MEMORY_PATH, DbRuntimeSettings::default())
    }

    /// Path this handle opens.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the pool is currently open.
    pub fn is_open(&self) -> bool {
        self.pool.read().is_some()
    }

    /// Opens the database if it is not open yet and returns the pool.
    ///
    /// # Errors
    ///
    /// Returns `DbError::NotADatabase` if the file exists but is not a SQLite
    /// database, or `DbError::Pool` if the pool cannot be built.
    pub fn open(&self) -> Result<DbPool, DbError> {
        if let Some(pool) = self.pool.read().as_ref() {
            return Ok(pool.clone());
        }

        let mut slot = self.pool.write();
        // Another caller may have opened it while we waited for the lock.
        if let Some(pool) = slot.as_ref() {
            return Ok(pool.clone());
        }

        if self.path != MEMORY_PATH {
            probe(&self.path)?;
        }

        let pool = create_pool(&self.path, self.settings)?;
        tracing::info!(
            path = %self.path,
            pool_max_size = pool.max_size(),
            "database opened"
        );
        *slot = Some(pool.clone());
        Ok(pool)
    }

    /// Returns the pool of an open database.
    ///
    /// # Errors
    ///
    /// Returns `DbError::NoDb` if the database is closed.
    pub fn pool(&self) -> Result<DbPool, DbError> {
        self.pool.read().clone().ok_or(DbError::NoDb)
    }

    /// Closes the database. Returns `false` if it was not open.
    ///
    /// Connections still checked out by running operations stay valid until
    /// they are returned; the pool is released once the last one is dropped.
    pub fn close(&self) -> bool {
        let closed = self.pool.write().take().is_some();
        if closed {
            tracing::info!(path = %self.path, "database closed");
        }
        closed
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("settings", &self.settings)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Touches the file header so a non-database file is reported as such
/// instead of surfacing later as an opaque pool error.
fn probe(path: &str) -> Result<(), DbError> {
    const PROBE: &str = "PRAGMA schema_version";

    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
    let conn = Connection::open_with_flags(path, flags).map_err(|e| DbError::sql(e, PROBE, &[]))?;
    conn.query_row(PROBE, [], |row| row.get::<_, i64>(0))
        .map_err(|e| DbError::sql(e, PROBE, &[]))?;
    Ok(())
}
