//! Error types for schema construction and value adapters.

use tabula_types::ErrorKind;

/// Configuration-time errors raised while building a schema.
///
/// All of these indicate a programming or configuration mistake and are
/// reported when a model is constructed, before any query runs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    /// A name destined for interpolated SQL failed the injection guard.
    #[error("unsafe identifier {value:?} in {context}: {reason}")]
    Injection {
        /// The rejected value.
        value: String,
        /// Table or setting the value belongs to.
        context: String,
        /// Which rule was violated.
        reason: &'static str,
    },

    /// The base type of a type string is not in the type table.
    #[error("column '{column}': unknown type '{type_str}'")]
    UnknownType { column: String, type_str: String },

    /// A non-primary column declared no type.
    #[error("column '{0}': no type declared")]
    MissingType(String),

    /// A modifier was used with a type that does not support it.
    #[error("column '{column}': {reason}")]
    InvalidFlag { column: String, reason: &'static str },

    /// More than one column declared itself primary.
    #[error("table '{table}': both '{first}' and '{second}' are marked primary")]
    MultiplePrimary {
        table: String,
        first: String,
        second: String,
    },

    /// The primary column is array-typed.
    #[error("table '{table}': primary column '{column}' cannot be an array")]
    ArrayPrimary { table: String, column: String },

    /// The synthesized primary key name is taken by a non-primary column.
    #[error("table '{table}': column '{column}' clashes with the derived primary key")]
    PrimaryNameTaken { table: String, column: String },

    /// No column maps to a storage type.
    #[error("table '{0}': no column maps to a storage type")]
    NoStorage(String),

    /// Two column names differ only by case.
    #[error("table '{table}': duplicate column '{column}'")]
    DuplicateColumn { table: String, column: String },
}

impl SchemaError {
    /// Flat taxonomy kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Injection { .. } => ErrorKind::InjectionError,
            _ => ErrorKind::Config,
        }
    }
}

/// Errors raised while converting a value between user and storage form.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdapterError {
    /// The value cannot be interpreted as the column's type.
    #[error("expected {expected}, got {value}")]
    Invalid {
        expected: &'static str,
        value: String,
    },

    /// An array element contains the child-table delimiter.
    #[error("array element {0:?} contains the reserved delimiter")]
    Delimiter(String),

    /// Raised by a caller-supplied adapter.
    #[error("{0}")]
    Custom(String),

    /// Any of the above, attributed to a column by the pipeline.
    #[error("column '{column}': {source}")]
    Column {
        column: String,
        source: Box<AdapterError>,
    },
}

impl AdapterError {
    pub(crate) fn invalid(expected: &'static str, value: &serde_json::Value) -> Self {
        Self::Invalid {
            expected,
            value: value.to_string(),
        }
    }

    pub(crate) fn in_column(self, column: &str) -> Self {
        match self {
            already @ Self::Column { .. } => already,
            other => Self::Column {
                column: column.to_string(),
                source: Box::new(other),
            },
        }
    }
}
