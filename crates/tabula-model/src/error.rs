//! Error type for model operations.

use tabula_db::{DbError, RollbackError};
use tabula_schema::{AdapterError, SchemaError};
use tabula_sql::BuildError;
use tabula_types::ErrorKind;

/// Errors returned by [`Model`](crate::Model) operations.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// An insert or update was called without data.
    #[error("no data supplied")]
    NoData,

    /// An operation that needs an id was called without one.
    #[error("no id supplied")]
    NoId,

    /// No row has the given key.
    #[error("no entry with {key} = {id}")]
    NoEntry { key: String, id: String },

    /// A page size of zero was requested.
    #[error("page size must be at least 1")]
    NoSize,

    /// A key is not a usable column of the table.
    #[error("table '{table}': invalid key '{key}'")]
    BadKey { table: String, key: String },

    /// A single-row operation matched several rows.
    #[error("{count} entries match {key} = {id}, expected one")]
    MultiAction { key: String, id: String, count: usize },

    /// An insert reported success but returned no primary key.
    #[error("insert into '{0}' returned no primary key")]
    NoPrimary(String),

    /// A change callback rejected an update.
    #[error("update vetoed: {0}")]
    Vetoed(String),

    /// A blocking database task panicked or was cancelled.
    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The operation failed and so did the rollback that followed.
    #[error("{source} (rollback failed: {rollback})")]
    RollbackFailed {
        source: Box<ModelError>,
        rollback: DbError,
    },

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl ModelError {
    pub(crate) fn no_entry(key: &str, id: &serde_json::Value) -> Self {
        Self::NoEntry {
            key: key.to_string(),
            id: id.to_string(),
        }
    }

    /// Flat taxonomy kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoData => ErrorKind::NoData,
            Self::NoId => ErrorKind::NoId,
            Self::NoEntry { .. } => ErrorKind::NoEntry,
            Self::NoSize => ErrorKind::NoSize,
            Self::BadKey { .. } => ErrorKind::BadKey,
            Self::MultiAction { .. } => ErrorKind::MultiAction,
            Self::NoPrimary(_) => ErrorKind::NoPrimary,
            Self::Vetoed(_) => ErrorKind::Vetoed,
            Self::Task(_) => ErrorKind::Internal,
            Self::RollbackFailed { source, .. } => source.kind(),
            Self::Db(e) => e.kind(),
            Self::Schema(e) => e.kind(),
            Self::Adapter(_) => ErrorKind::Adapter,
        }
    }
}

impl From<BuildError> for ModelError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::BadKey { table, key } => Self::BadKey { table, key },
            BuildError::NoData(_) => Self::NoData,
        }
    }
}

impl RollbackError for ModelError {
    fn with_rollback_failure(self, rollback: DbError) -> Self {
        Self::RollbackFailed {
            source: Box::new(self),
            rollback,
        }
    }
}
