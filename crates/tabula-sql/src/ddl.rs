//! Table definitions derived from a schema.

use tabula_db::{ColumnDdl, ForeignKey, TableDdl, UniqueIndex};
use tabula_schema::Schema;
use tabula_types::{CHILD_FOREIGN_ID, CHILD_INDEX};

/// The parent table followed by one definition per child table, in the
/// order they must be created.
pub fn create_table(schema: &Schema) -> Vec<TableDdl> {
    let mut tables = Vec::with_capacity(1 + schema.child_tables().len());
    tables.push(table_ddl(schema));

    for child in schema.child_tables().values() {
        let mut ddl = table_ddl(&child.schema);
        ddl.unique.push(UniqueIndex {
            name: child.position_index(),
            columns: vec![CHILD_FOREIGN_ID.to_string(), CHILD_INDEX.to_string()],
        });
        ddl.foreign_keys.push(ForeignKey {
            column: CHILD_FOREIGN_ID.to_string(),
            parent_table: schema.table().to_string(),
            parent_column: schema.primary_id().to_string(),
        });
        tables.push(ddl);
    }
    tables
}

fn table_ddl(schema: &Schema) -> TableDdl {
    TableDdl {
        name: schema.table().to_string(),
        columns: schema
            .storage_columns()
            .filter_map(|c| Some(ColumnDdl::new(c.name.as_str(), c.storage.as_deref()?)))
            .collect(),
        unique: Vec::new(),
        foreign_keys: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use tabula_schema::{ColumnDecl, SchemaOptions};

    #[test]
    fn parent_precedes_children() {
        let mut decls = IndexMap::new();
        decls.insert("title".to_string(), ColumnDecl::new("string"));
        decls.insert("body".to_string(), ColumnDecl::new("string*?"));
        decls.insert("tags".to_string(), ColumnDecl::new("string[]"));
        let schema =
            Schema::build("notes", decls, &SchemaOptions::default()).expect("schema should build");

        let tables = create_table(&schema);
        assert_eq!(tables.len(), 2);
        assert_eq!(
            tables[0].create_sql(),
            "CREATE TABLE IF NOT EXISTS notes (id INTEGER PRIMARY KEY, title TEXT NOT NULL, body TEXT)"
        );
        assert_eq!(
            tables[1].create_sql(),
            "CREATE TABLE IF NOT EXISTS notes_tags (child_id INTEGER PRIMARY KEY, \
             foreign_id INTEGER NOT NULL, array_index INTEGER NOT NULL, array_value TEXT NOT NULL, \
             FOREIGN KEY (foreign_id) REFERENCES notes (id) ON DELETE CASCADE ON UPDATE CASCADE)"
        );
        assert_eq!(
            tables[1].index_sql(),
            vec!["CREATE UNIQUE INDEX IF NOT EXISTS notes_tags_position ON notes_tags (foreign_id, array_index)"]
        );
    }
}
