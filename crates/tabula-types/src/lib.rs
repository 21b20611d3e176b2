//! Shared types and constants for the Tabula data-access engine.
//!
//! This crate provides the foundational vocabulary used across all Tabula
//! crates: the column-type enum and its type table, the insertion conflict
//! policy, the filter tree used by searches, the flat error-kind taxonomy
//! and the engine-wide constants.
//!
//! No crate in the workspace depends on anything *except* `tabula-types` for
//! cross-cutting type definitions.

mod column;
mod error;
mod filter;

pub use column::{ColumnType, ParseColumnTypeError};
pub use error::ErrorKind;
pub use filter::Filter;

use serde::{Deserialize, Serialize};

/// A transient mapping of column name to value.
///
/// Records are either in *user* representation (after decoding) or in
/// *storage* representation (before encoding / straight from a row).
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Delimiter used to join child-table values in aggregated selects.
///
/// `U+001F` (unit separator) never appears in text a user types.
pub const DEFAULT_DELIMITER: &str = "\u{1f}";

/// Name given to a synthesized primary key on a top-level table.
pub const DEFAULT_PRIMARY_ID: &str = "id";

/// Name given to a synthesized primary key on a child table.
pub const CHILD_PRIMARY_ID: &str = "child_id";

/// Child-table column referencing the parent row.
pub const CHILD_FOREIGN_ID: &str = "foreign_id";

/// Child-table column holding the element position.
pub const CHILD_INDEX: &str = "array_index";

/// Child-table column holding the element value.
pub const CHILD_VALUE: &str = "array_value";

/// Page sizes offered alongside the requested one.
pub const DEFAULT_PAGE_SIZES: &[usize] = &[5, 10, 25, 50, 100];

/// Insertion conflict policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IfExists {
    /// Plain insert; a conflicting key is a constraint error.
    #[default]
    Default,
    /// Same as `Default`, spelled out by callers that want to be explicit.
    Abort,
    /// Conflicting rows are silently skipped (`INSERT OR IGNORE`).
    Skip,
    /// Conflicting rows are replaced (`INSERT OR REPLACE`).
    Overwrite,
}

impl IfExists {
    /// Returns the conflict clause inserted after `INSERT`.
    pub fn conflict_clause(self) -> &'static str {
        match self {
            Self::Default | Self::Abort => "",
            Self::Skip => " OR IGNORE",
            Self::Overwrite => " OR REPLACE",
        }
    }

    /// Returns the canonical label for this policy.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Abort => "abort",
            Self::Skip => "skip",
            Self::Overwrite => "overwrite",
        }
    }
}

impl std::fmt::Display for IfExists {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IfExists {
    type Err = ParseIfExistsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "abort" => Ok(Self::Abort),
            "skip" | "ignore" => Ok(Self::Skip),
            "overwrite" | "replace" => Ok(Self::Overwrite),
            _ => Err(ParseIfExistsError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown if-exists policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown if-exists policy: {0}")]
pub struct ParseIfExistsError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn if_exists_conflict_clauses() {
        assert_eq!(IfExists::Default.conflict_clause(), "");
        assert_eq!(IfExists::Abort.conflict_clause(), "");
        assert_eq!(IfExists::Skip.conflict_clause(), " OR IGNORE");
        assert_eq!(IfExists::Overwrite.conflict_clause(), " OR REPLACE");
    }

    #[test]
    fn if_exists_parses_aliases() {
        assert_eq!("skip".parse::<IfExists>().unwrap(), IfExists::Skip);
        assert_eq!("IGNORE".parse::<IfExists>().unwrap(), IfExists::Skip);
        assert_eq!("replace".parse::<IfExists>().unwrap(), IfExists::Overwrite);
        assert!("merge".parse::<IfExists>().is_err());
    }

    #[test]
    fn if_exists_deserializes_lowercase() {
        let parsed: IfExists = serde_json::from_str("\"overwrite\"").unwrap();
        assert_eq!(parsed, IfExists::Overwrite);
    }
}
