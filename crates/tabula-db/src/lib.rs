//! Storage layer for the Tabula engine.
//!
//! Provides SQLite connection pooling (via `r2d2`), an explicit open/close
//! database handle, the transactional executor every higher layer runs its
//! statements through, and DDL rendering for table rebuilds.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: a single-writer, file-backed store. WAL mode
//!   allows concurrent readers while writes serialize at the driver.
//! - **`r2d2` connection pool**: bounded connection reuse without manual
//!   lifetime management. The pool is owned by a [`Database`] handle that is
//!   passed explicitly to every model instead of living in a global.
//! - **Manual transactions**: [`multi_run`] issues `BEGIN`/`COMMIT` itself
//!   and reports a failed `ROLLBACK` alongside the original error.
//! - **Normalized failures**: every driver error leaves this crate as a
//!   [`DbError`] carrying the statement and its parameters.

mod database;
mod ddl;
mod error;
mod executor;
mod pool;

pub use database::Database;
pub use ddl::{ColumnDdl, ForeignKey, TableDdl, UniqueIndex};
pub use error::{DbError, RollbackError};
pub use executor::{
    all, exec, get, multi_run, reset, run, transaction, Row, RunInfo, SqlValue, Statement,
};
pub use pool::{create_pool, effective_pool_size, DbPool, DbRuntimeSettings, MEMORY_PATH};
