//! Error types for the storage layer.

use rusqlite::ffi::ErrorCode;
use tabula_types::ErrorKind;
use thiserror::Error;

use crate::executor::SqlValue;

/// Errors raised by the pool, the database handle and the executor.
#[derive(Debug, Error)]
pub enum DbError {
    /// An operation was attempted before [`Database::open`](crate::Database::open)
    /// or after [`Database::close`](crate::Database::close).
    #[error("database is not open")]
    NoDb,

    /// The backend rejected a statement.
    #[error("sql error: {source} (statement: {sql}; params: [{}])", .params.join(", "))]
    Sql {
        /// The underlying SQLite error.
        source: rusqlite::Error,
        /// The statement text.
        sql: String,
        /// Rendered bound parameters.
        params: Vec<String>,
    },

    /// The file exists but is not a SQLite database.
    #[error("file is not a database: {0}")]
    NotADatabase(String),

    /// Failed to build the connection pool or check out a connection.
    #[error("database connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A transaction failed and the rollback failed as well.
    #[error("{source}; rollback also failed: {rollback}")]
    Rollback {
        /// The error that aborted the transaction.
        source: Box<DbError>,
        /// The error raised by `ROLLBACK`.
        rollback: Box<DbError>,
    },
}

impl DbError {
    /// Wraps a driver error together with the statement that caused it.
    pub fn sql(source: rusqlite::Error, sql: &str, params: &[SqlValue]) -> Self {
        if is_not_a_database(&source) {
            return Self::NotADatabase(source.to_string());
        }
        Self::Sql {
            source,
            sql: sql.to_string(),
            params: params.iter().map(render_param).collect(),
        }
    }

    /// Flat taxonomy kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoDb => ErrorKind::NoDb,
            Self::Sql { .. } | Self::Pool(_) => ErrorKind::SqlError,
            Self::NotADatabase(_) => ErrorKind::SqlNotADatabase,
            Self::Rollback { source, .. } => source.kind(),
        }
    }

    /// Whether the backend refused the statement on a constraint
    /// (unique, not-null, foreign key, primary key).
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            Self::Sql {
                source: rusqlite::Error::SqliteFailure(code, _),
                ..
            } => code.code == ErrorCode::ConstraintViolation,
            Self::Rollback { source, .. } => source.is_constraint_violation(),
            _ => false,
        }
    }
}

/// Errors that can carry a failed rollback next to the original failure.
///
/// [`transaction`](crate::transaction) is generic over the caller's error
/// type; this trait lets it attach the rollback failure without discarding
/// either error.
pub trait RollbackError: From<DbError> {
    /// Returns `self` extended with the error raised by `ROLLBACK`.
    fn with_rollback_failure(self, rollback: DbError) -> Self;
}

impl RollbackError for DbError {
    fn with_rollback_failure(self, rollback: DbError) -> Self {
        Self::Rollback {
            source: Box::new(self),
            rollback: Box::new(rollback),
        }
    }
}

fn is_not_a_database(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(code, _) if code.code == ErrorCode::NotADatabase
    )
}

fn render_param(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Real(f) => f.to_string(),
        SqlValue::Text(s) => format!("{s:?}"),
        SqlValue::Blob(b) => format!("<{} bytes>", b.len()),
    }
}
