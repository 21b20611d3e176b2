//! Flat error taxonomy shared by every crate.

use serde::{Deserialize, Serialize};

/// The kind of failure behind any Tabula error.
///
/// Each crate keeps its own error enum; `kind()` on those enums maps into
/// this list so callers can translate failures into responses without
/// matching nested variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Operation attempted before the database was opened.
    NoDb,
    /// The backend rejected a statement.
    SqlError,
    /// The database file exists but is not a valid store.
    SqlNotADatabase,
    /// Empty payload passed to a mutating call.
    NoData,
    /// Missing identifier argument.
    NoId,
    /// Identifier is well formed but matches no row.
    NoEntry,
    /// Pagination called without a page size.
    NoSize,
    /// Referenced column is not part of the schema.
    BadKey,
    /// An id-scoped mutation matched more than one row.
    MultiAction,
    /// An identifier failed the injection guard.
    InjectionError,
    /// A generated primary key could not be recovered after insert.
    NoPrimary,
    /// The schema declaration is malformed.
    Config,
    /// A value could not be converted between representations.
    Adapter,
    /// A change callback refused an update.
    Vetoed,
    /// Background task failure.
    Internal,
}

impl ErrorKind {
    /// Returns the canonical label for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoDb => "NoDb",
            Self::SqlError => "SqlError",
            Self::SqlNotADatabase => "SqlNotADatabase",
            Self::NoData => "NoData",
            Self::NoId => "NoID",
            Self::NoEntry => "NoEntry",
            Self::NoSize => "NoSize",
            Self::BadKey => "BadKey",
            Self::MultiAction => "MultiAction",
            Self::InjectionError => "InjectionError",
            Self::NoPrimary => "NoPrimary",
            Self::Config => "Config",
            Self::Adapter => "Adapter",
            Self::Vetoed => "Vetoed",
            Self::Internal => "Internal",
        }
    }

    /// Whether this kind points at a programming or configuration mistake
    /// rather than a per-call condition.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            Self::Config | Self::InjectionError | Self::SqlNotADatabase
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
