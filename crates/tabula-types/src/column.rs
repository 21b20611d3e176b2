//! Column base types and the per-type table.

use serde::{Deserialize, Serialize};

/// Base type of a column, before array/optional modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Free text.
    String,
    /// RFC 4122 identifier stored as text.
    Uuid,
    /// Standard base64 text.
    Base64,
    /// URL-safe base64 text.
    Base64Url,
    /// Hexadecimal text.
    Hex,
    /// Calendar date, stored as epoch milliseconds.
    Date,
    /// Instant in time, stored as epoch milliseconds.
    DateTime,
    /// Flag stored as `0`/`1`.
    Boolean,
    /// Signed 64-bit integer.
    Int,
    /// Double precision float.
    Float,
    /// Structured JSON value stored as text.
    Object,
    /// Untyped value stored as-is.
    Any,
}

impl ColumnType {
    /// All column types in declaration order.
    pub const ALL: [ColumnType; 12] = [
        Self::String,
        Self::Uuid,
        Self::Base64,
        Self::Base64Url,
        Self::Hex,
        Self::Date,
        Self::DateTime,
        Self::Boolean,
        Self::Int,
        Self::Float,
        Self::Object,
        Self::Any,
    ];

    /// Returns the canonical name used in type strings.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Uuid => "uuid",
            Self::Base64 => "b64",
            Self::Base64Url => "b64url",
            Self::Hex => "hex",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Boolean => "boolean",
            Self::Int => "int",
            Self::Float => "float",
            Self::Object => "object",
            Self::Any => "any",
        }
    }

    /// SQLite column affinity used when no explicit storage type is given.
    pub fn affinity(self) -> &'static str {
        match self {
            Self::String | Self::Uuid | Self::Base64 | Self::Base64Url | Self::Hex => "TEXT",
            Self::Object => "TEXT",
            Self::Date | Self::DateTime | Self::Boolean | Self::Int => "INTEGER",
            Self::Float => "REAL",
            Self::Any => "BLOB",
        }
    }

    /// Form-input hint derived for columns that do not declare one.
    pub fn ui_hint(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::DateTime => "datetime-local",
            Self::Boolean => "checkbox",
            Self::Int | Self::Float => "number",
            Self::Object => "textarea",
            _ => "text",
        }
    }

    /// Whether the type carries a built-in decode/encode pair.
    pub fn has_default_adapter(self) -> bool {
        matches!(
            self,
            Self::Object | Self::Date | Self::DateTime | Self::Boolean | Self::Int | Self::Float
        )
    }

    /// Whether values of this type are stored as SQLite integers.
    pub fn is_integer_backed(self) -> bool {
        self.affinity() == "INTEGER"
    }

    /// Whether partial matching on this type means substring search.
    pub fn is_textual(self) -> bool {
        matches!(
            self,
            Self::String | Self::Uuid | Self::Base64 | Self::Base64Url | Self::Hex
        )
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ColumnType {
    type Err = ParseColumnTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" | "str" => Ok(Self::String),
            "uuid" => Ok(Self::Uuid),
            "b64" | "base64" => Ok(Self::Base64),
            "b64url" | "base64url" | "base64-url" => Ok(Self::Base64Url),
            "hex" => Ok(Self::Hex),
            "date" => Ok(Self::Date),
            "datetime" => Ok(Self::DateTime),
            "bool" | "boolean" => Ok(Self::Boolean),
            "int" | "integer" => Ok(Self::Int),
            "float" | "number" => Ok(Self::Float),
            "object" | "json" => Ok(Self::Object),
            "any" => Ok(Self::Any),
            _ => Err(ParseColumnTypeError(s.to_string())),
        }
    }
}

/// Error returned when a base type name is not in the type table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown column type: {0}")]
pub struct ParseColumnTypeError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_parse_back() {
        for ty in ColumnType::ALL {
            assert_eq!(ty.as_str().parse::<ColumnType>().unwrap(), ty);
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = "money".parse::<ColumnType>().unwrap_err();
        assert_eq!(err.0, "money");
    }

    #[test]
    fn type_table_affinities() {
        assert_eq!(ColumnType::String.affinity(), "TEXT");
        assert_eq!(ColumnType::Boolean.affinity(), "INTEGER");
        assert_eq!(ColumnType::Float.affinity(), "REAL");
        assert_eq!(ColumnType::Any.affinity(), "BLOB");
        assert!(ColumnType::Date.is_integer_backed());
        assert!(!ColumnType::Object.is_integer_backed());
    }

    #[test]
    fn default_adapters_only_for_converting_types() {
        assert!(ColumnType::Object.has_default_adapter());
        assert!(ColumnType::Int.has_default_adapter());
        assert!(!ColumnType::String.has_default_adapter());
        assert!(!ColumnType::Hex.has_default_adapter());
    }
}
