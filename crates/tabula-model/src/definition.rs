//! Model definitions as written in configuration.

use indexmap::IndexMap;
use serde::Deserialize;
use tabula_schema::{ColumnDecl, Schema, SchemaError, SchemaOptions, TableKind};
use tabula_types::DEFAULT_DELIMITER;

/// Everything needed to build a [`Model`](crate::Model).
///
/// Column order is preserved from the source document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelDefinition {
    pub table: String,
    /// Display name; the table name when unset.
    #[serde(default)]
    pub title: Option<String>,
    /// Route prefix; `/<table>` when unset.
    #[serde(default)]
    pub url: Option<String>,
    /// Joins child-table values; `U+001F` when unset.
    #[serde(default)]
    pub delimiter: Option<String>,
    #[serde(default)]
    pub columns: IndexMap<String, ColumnDecl>,
}

impl ModelDefinition {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Appends a column.
    pub fn column(mut self, name: impl Into<String>, decl: ColumnDecl) -> Self {
        self.columns.insert(name.into(), decl);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    /// Validates the definition and builds its schema.
    pub(crate) fn build_schema(&self) -> Result<Schema, SchemaError> {
        let delimiter = self.delimiter.as_deref().unwrap_or(DEFAULT_DELIMITER);
        Schema::build(
            &self.table,
            self.columns.clone(),
            &SchemaOptions {
                kind: TableKind::Table,
                delimiter: delimiter.to_string(),
            },
        )
    }

    pub(crate) fn resolved_title(&self) -> String {
        self.title.clone().unwrap_or_else(|| self.table.clone())
    }

    pub(crate) fn resolved_url(&self) -> String {
        self.url
            .clone()
            .unwrap_or_else(|| format!("/{}", self.table))
    }
}
