//! The validated, immutable table schema.

use std::collections::HashMap;

use indexmap::IndexMap;
use tabula_types::{Record, CHILD_PRIMARY_ID, DEFAULT_DELIMITER, DEFAULT_PRIMARY_ID};

use crate::children::ChildTable;
use crate::column::{Column, ColumnDecl};
use crate::error::SchemaError;
use crate::guard::{check_delimiter, check_identifier};

/// Whether a schema describes a top-level table or a derived child table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TableKind {
    #[default]
    Table,
    Child,
}

impl TableKind {
    /// Name given to a synthesized primary key.
    pub fn default_primary_id(self) -> &'static str {
        match self {
            Self::Table => DEFAULT_PRIMARY_ID,
            Self::Child => CHILD_PRIMARY_ID,
        }
    }
}

/// Options that apply to a whole schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaOptions {
    pub kind: TableKind,
    /// Joins child-table values in aggregated selects.
    pub delimiter: String,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            kind: TableKind::Table,
            delimiter: DEFAULT_DELIMITER.to_string(),
        }
    }
}

/// An ordered, case-insensitively unique set of resolved columns.
///
/// Built once by [`Schema::build`]; every name in it has passed the
/// injection guard and exactly one column is the primary key.
#[derive(Debug, Clone)]
pub struct Schema {
    table: String,
    kind: TableKind,
    delimiter: String,
    primary_id: String,
    columns: IndexMap<String, Column>,
    lookup: HashMap<String, String>,
    child_tables: IndexMap<String, ChildTable>,
    hidden: Vec<String>,
}

impl Schema {
    /// Validates the declarations for `table` and resolves every column.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] for any unsafe name, unknown type, invalid
    /// flag combination, primary-key conflict, duplicate column, or if no
    /// column maps to storage.
    pub fn build(
        table: &str,
        decls: IndexMap<String, ColumnDecl>,
        options: &SchemaOptions,
    ) -> Result<Self, SchemaError> {
        check_identifier(table, table)?;
        check_delimiter(&options.delimiter, table)?;

        let mut lookup = HashMap::with_capacity(decls.len() + 1);
        let mut primary: Option<&str> = None;
        for (name, decl) in &decls {
            check_identifier(name, table)?;
            if lookup.insert(name.to_ascii_lowercase(), name.clone()).is_some() {
                return Err(SchemaError::DuplicateColumn {
                    table: table.to_string(),
                    column: name.clone(),
                });
            }
            if decl.primary {
                if let Some(first) = primary {
                    return Err(SchemaError::MultiplePrimary {
                        table: table.to_string(),
                        first: first.to_string(),
                        second: name.clone(),
                    });
                }
                primary = Some(name.as_str());
            }
        }

        let primary_id = match primary {
            Some(name) => name.to_string(),
            None => {
                let name = options.kind.default_primary_id();
                if let Some(taken) = lookup.get(name) {
                    return Err(SchemaError::PrimaryNameTaken {
                        table: table.to_string(),
                        column: taken.clone(),
                    });
                }
                name.to_string()
            }
        };

        let mut ordered = IndexMap::with_capacity(decls.len() + 1);
        if primary.is_none() {
            lookup.insert(primary_id.to_ascii_lowercase(), primary_id.clone());
            ordered.insert(primary_id.clone(), ColumnDecl::default().primary());
        }
        ordered.extend(decls);

        let mut columns = IndexMap::with_capacity(ordered.len());
        for (name, decl) in ordered {
            let column = Column::resolve(table, &name, decl, &options.delimiter)?;
            columns.insert(name, column);
        }

        if !columns.values().any(Column::is_stored) {
            return Err(SchemaError::NoStorage(table.to_string()));
        }

        let hidden = columns
            .values()
            .filter(|c| c.hidden)
            .map(|c| c.name.clone())
            .collect();

        let mut schema = Self {
            table: table.to_string(),
            kind: options.kind,
            delimiter: options.delimiter.clone(),
            primary_id,
            columns,
            lookup,
            child_tables: IndexMap::new(),
            hidden,
        };

        if options.kind == TableKind::Table {
            let mut child_tables = IndexMap::new();
            for column in schema.columns.values().filter(|c| c.is_child_array()) {
                child_tables.insert(column.name.clone(), ChildTable::derive(&schema, column)?);
            }
            schema.child_tables = child_tables;
        }

        tracing::debug!(
            table = %schema.table,
            columns = schema.columns.len(),
            child_tables = schema.child_tables.len(),
            primary_id = %schema.primary_id,
            "schema built"
        );
        Ok(schema)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Name of the primary-key column.
    pub fn primary_id(&self) -> &str {
        &self.primary_id
    }

    /// The primary-key column.
    pub fn primary(&self) -> &Column {
        // `build` always inserts the primary column.
        &self.columns[self.primary_id.as_str()]
    }

    /// Every column in declaration order, the primary key first if it was
    /// synthesized.
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    /// Declaration index of the column named exactly `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.get_index_of(name)
    }

    /// Looks up a column by exact name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Looks up a column ignoring ASCII case.
    pub fn resolve(&self, name: &str) -> Option<&Column> {
        self.columns.get(name).or_else(|| {
            self.lookup
                .get(&name.to_ascii_lowercase())
                .and_then(|canonical| self.columns.get(canonical))
        })
    }

    /// Columns with a parent-table storage type, in order.
    pub fn storage_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values().filter(|c| c.is_stored())
    }

    /// Child tables keyed by the array column they hold.
    pub fn child_tables(&self) -> &IndexMap<String, ChildTable> {
        &self.child_tables
    }

    /// Names of columns removed from non-raw reads.
    pub fn hidden(&self) -> &[String] {
        &self.hidden
    }

    /// Inserts declared defaults for every column missing from `record`.
    pub fn apply_defaults(&self, record: &mut Record) {
        for column in self.columns.values() {
            let Some(default) = &column.default else {
                continue;
            };
            let present = record
                .keys()
                .any(|key| key.eq_ignore_ascii_case(&column.name));
            if !present {
                record.insert(column.name.clone(), default.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tabula_types::{ColumnType, ErrorKind};

    fn decls(pairs: &[(&str, ColumnDecl)]) -> IndexMap<String, ColumnDecl> {
        pairs
            .iter()
            .map(|(name, decl)| (name.to_string(), decl.clone()))
            .collect()
    }

    #[test]
    fn synthesizes_primary_key_first() {
        let schema = Schema::build(
            "people",
            decls(&[("name", ColumnDecl::new("string"))]),
            &SchemaOptions::default(),
        )
        .expect("schema should build");

        assert_eq!(schema.primary_id(), "id");
        let names: Vec<_> = schema.columns().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "name"]);
        assert_eq!(schema.primary().ty, ColumnType::Int);
        assert_eq!(schema.primary().storage.as_deref(), Some("INTEGER PRIMARY KEY"));
        assert_eq!(schema.columns().filter(|c| c.primary).count(), 1);
    }

    #[test]
    fn child_kind_uses_its_own_primary_name() {
        let schema = Schema::build(
            "people_tags",
            decls(&[("array_value", ColumnDecl::new("string"))]),
            &SchemaOptions {
                kind: TableKind::Child,
                ..SchemaOptions::default()
            },
        )
        .expect("schema should build");
        assert_eq!(schema.primary_id(), "child_id");
    }

    #[test]
    fn declared_primary_is_kept() {
        let schema = Schema::build(
            "codes",
            decls(&[
                ("label", ColumnDecl::new("string")),
                ("code", ColumnDecl::new("string").primary()),
            ]),
            &SchemaOptions::default(),
        )
        .expect("schema should build");
        assert_eq!(schema.primary_id(), "code");
        assert_eq!(schema.primary().storage.as_deref(), Some("TEXT PRIMARY KEY"));
        assert_eq!(schema.columns().count(), 2);
    }

    #[test]
    fn two_primaries_name_both() {
        let err = Schema::build(
            "t",
            decls(&[
                ("a", ColumnDecl::new("int").primary()),
                ("b", ColumnDecl::new("int").primary()),
            ]),
            &SchemaOptions::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::MultiplePrimary {
                table: "t".into(),
                first: "a".into(),
                second: "b".into(),
            }
        );
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn rejects_case_insensitive_duplicates() {
        let err = Schema::build(
            "t",
            decls(&[("Name", ColumnDecl::new("string")), ("name", ColumnDecl::new("string"))]),
            &SchemaOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateColumn { .. }));
    }

    #[test]
    fn rejects_non_primary_id_column() {
        let err = Schema::build(
            "t",
            decls(&[("ID", ColumnDecl::new("string"))]),
            &SchemaOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::PrimaryNameTaken { .. }));
    }

    #[test]
    fn requires_a_storage_column() {
        // The synthesized key always stores, so only an explicit key can be
        // kept out of the table.
        let err = Schema::build(
            "t",
            decls(&[
                (
                    "key",
                    ColumnDecl::new("int")
                        .primary()
                        .with_storage(crate::column::StorageDecl::Enabled(false)),
                ),
                ("tags", ColumnDecl::new("string[]")),
            ]),
            &SchemaOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, SchemaError::NoStorage("t".into()));
    }

    #[test]
    fn unsafe_names_are_injection_errors() {
        for (table, column) in [("users; DROP TABLE users", "name"), ("users", "select")] {
            let err = Schema::build(
                table,
                decls(&[(column, ColumnDecl::new("string"))]),
                &SchemaOptions::default(),
            )
            .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InjectionError);
        }
    }

    #[test]
    fn resolve_ignores_case() {
        let schema = Schema::build(
            "t",
            decls(&[("DisplayName", ColumnDecl::new("string"))]),
            &SchemaOptions::default(),
        )
        .expect("schema should build");
        assert_eq!(
            schema.resolve("displayname").map(|c| c.name.as_str()),
            Some("DisplayName")
        );
        assert!(schema.resolve("other").is_none());
    }

    #[test]
    fn defaults_fill_only_missing_keys() {
        let schema = Schema::build(
            "t",
            decls(&[
                ("name", ColumnDecl::new("string").with_default("anon")),
                ("score", ColumnDecl::new("int").with_default(0)),
            ]),
            &SchemaOptions::default(),
        )
        .expect("schema should build");

        let mut record = Record::new();
        record.insert("NAME".into(), "kept".into());
        schema.apply_defaults(&mut record);
        assert_eq!(record.get("NAME"), Some(&json!("kept")));
        assert!(!record.contains_key("name"));
        assert_eq!(record.get("score"), Some(&json!(0)));
    }
}
