//! Error type for statement construction.

use tabula_types::ErrorKind;

/// Errors raised while turning arguments into SQL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// A key is not a column of the table, or cannot be used where it was.
    #[error("table '{table}': invalid key '{key}'")]
    BadKey { table: String, key: String },

    /// An insert was requested without rows.
    #[error("table '{0}': no rows to insert")]
    NoData(String),
}

impl BuildError {
    pub(crate) fn bad_key(table: &str, key: &str) -> Self {
        Self::BadKey {
            table: table.to_string(),
            key: key.to_string(),
        }
    }

    /// Flat taxonomy kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadKey { .. } => ErrorKind::BadKey,
            Self::NoData(_) => ErrorKind::NoData,
        }
    }
}
