//! One-to-many tables holding the elements of array columns.

use indexmap::IndexMap;
use tabula_types::{ColumnType, CHILD_FOREIGN_ID, CHILD_INDEX, CHILD_VALUE};

use crate::column::{Column, ColumnDecl, Limits, StorageDecl};
use crate::error::SchemaError;
use crate::schema::{Schema, SchemaOptions, TableKind};

/// A table derived from an array column that has no parent-table storage.
///
/// Each element is one row: the parent's key in `foreign_id`, its position in
/// `array_index` and the element itself in `array_value`.
#[derive(Debug, Clone)]
pub struct ChildTable {
    /// The parent array column.
    pub column: String,
    /// Element type of the array.
    pub element: ColumnType,
    pub schema: Schema,
}

impl ChildTable {
    pub(crate) fn derive(parent: &Schema, column: &Column) -> Result<Self, SchemaError> {
        let name = format!("{}_{}", parent.table(), column.name);
        let primary = parent.primary();

        let foreign_storage = format!("{} NOT NULL", strip_key_suffix(primary_storage(primary)));
        let foreign = ColumnDecl {
            db: Some(StorageDecl::Explicit(foreign_storage)),
            ..ColumnDecl::new(primary.ty.as_str())
        };

        let mut value = ColumnDecl::new(column.ty.as_str());
        value.has_spaces = Some(column.has_spaces);
        value.is_html = column.is_html;
        value.limits = column
            .limits
            .as_ref()
            .and_then(Limits::element)
            .map(Limits::Bounds);

        let mut decls = IndexMap::with_capacity(3);
        decls.insert(CHILD_FOREIGN_ID.to_string(), foreign);
        decls.insert(CHILD_INDEX.to_string(), ColumnDecl::new(ColumnType::Int.as_str()));
        decls.insert(CHILD_VALUE.to_string(), value);

        let schema = Schema::build(
            &name,
            decls,
            &SchemaOptions {
                kind: TableKind::Child,
                delimiter: parent.delimiter().to_string(),
            },
        )?;

        Ok(Self {
            column: column.name.clone(),
            element: column.ty,
            schema,
        })
    }

    /// Name of the child table.
    pub fn table(&self) -> &str {
        self.schema.table()
    }

    /// Name of the unique index over `(foreign_id, array_index)`.
    pub fn position_index(&self) -> String {
        format!("{}_position", self.table())
    }
}

fn primary_storage(primary: &Column) -> &str {
    primary
        .storage
        .as_deref()
        .unwrap_or_else(|| primary.ty.affinity())
}

/// Removes `PRIMARY KEY` and `NOT NULL` from a storage type.
fn strip_key_suffix(storage: &str) -> String {
    let words: Vec<&str> = storage.split_whitespace().collect();
    let mut kept = Vec::with_capacity(words.len());
    let mut i = 0;
    while i < words.len() {
        let pair = words
            .get(i + 1)
            .map(|next| (words[i].to_ascii_uppercase(), next.to_ascii_uppercase()));
        match pair {
            Some((first, second))
                if (first == "PRIMARY" && second == "KEY") || (first == "NOT" && second == "NULL") =>
            {
                i += 2;
            }
            _ => {
                kept.push(words[i]);
                i += 1;
            }
        }
    }
    kept.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Bounds;

    fn parent(decls: Vec<(&str, ColumnDecl)>) -> Schema {
        Schema::build(
            "posts",
            decls.into_iter().map(|(n, d)| (n.to_string(), d)).collect(),
            &SchemaOptions::default(),
        )
        .expect("parent schema should build")
    }

    #[test]
    fn derives_one_child_table_per_unmapped_array() {
        let schema = parent(vec![
            ("title", ColumnDecl::new("string")),
            ("tags", ColumnDecl::new("string[]")),
            ("scores", ColumnDecl::new("int[]?")),
            (
                "inline",
                ColumnDecl::new("string[]").with_storage(StorageDecl::Explicit("TEXT".into())),
            ),
        ]);

        let names: Vec<_> = schema.child_tables().values().map(ChildTable::table).collect();
        assert_eq!(names, ["posts_tags", "posts_scores"]);

        let tags = &schema.child_tables()["tags"];
        assert_eq!(tags.element, ColumnType::String);
        assert_eq!(tags.schema.primary_id(), "child_id");
        let columns: Vec<_> = tags.schema.columns().map(|c| c.name.as_str()).collect();
        assert_eq!(columns, ["child_id", "foreign_id", "array_index", "array_value"]);
        assert_eq!(tags.position_index(), "posts_tags_position");
    }

    #[test]
    fn foreign_id_follows_parent_key_storage() {
        let schema = parent(vec![
            ("slug", ColumnDecl::new("string").primary()),
            ("tags", ColumnDecl::new("string[]")),
        ]);
        let child = &schema.child_tables()["tags"];
        let foreign = child.schema.column("foreign_id").expect("foreign_id column");
        assert_eq!(foreign.ty, ColumnType::String);
        assert_eq!(foreign.storage.as_deref(), Some("TEXT NOT NULL"));
    }

    #[test]
    fn value_inherits_element_flags() {
        let schema = parent(vec![(
            "notes",
            ColumnDecl {
                is_html: true,
                limits: Some(Limits::Array {
                    array: Some(Bounds { min: None, max: Some(5.0) }),
                    elem: Some(Bounds { min: Some(1.0), max: Some(80.0) }),
                }),
                ..ColumnDecl::new("string*[]")
            },
        )]);
        let value = schema.child_tables()["notes"]
            .schema
            .column("array_value")
            .expect("array_value column")
            .clone();
        assert!(value.has_spaces);
        assert!(value.is_html);
        assert!(!value.array);
        assert_eq!(value.storage.as_deref(), Some("TEXT NOT NULL"));
        assert_eq!(
            value.limits,
            Some(Limits::Bounds(Bounds { min: Some(1.0), max: Some(80.0) }))
        );
    }

    #[test]
    fn strips_key_constraints() {
        assert_eq!(strip_key_suffix("INTEGER PRIMARY KEY"), "INTEGER");
        assert_eq!(strip_key_suffix("varchar(12) not null"), "varchar(12)");
        assert_eq!(strip_key_suffix("TEXT"), "TEXT");
    }
}
