//! Table definitions rendered into `CREATE`/`DROP` statements.
//!
//! Names in these structures are interpolated into SQL text; they must have
//! passed the schema crate's injection guard before reaching this module.

/// One column of a table to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDdl {
    /// Column name.
    pub name: String,
    /// Declared storage type, including constraints such as `NOT NULL`.
    pub storage: String,
}

impl ColumnDdl {
    pub fn new(name: impl Into<String>, storage: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            storage: storage.into(),
        }
    }
}

/// A named unique index over one or more columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueIndex {
    pub name: String,
    pub columns: Vec<String>,
}

/// A `FOREIGN KEY` clause that cascades deletes and key updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: String,
    pub parent_table: String,
    pub parent_column: String,
}

/// Everything needed to (re)create one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDdl {
    pub name: String,
    pub columns: Vec<ColumnDdl>,
    pub unique: Vec<UniqueIndex>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableDdl {
    /// `DROP TABLE IF EXISTS <name>`.
    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.name)
    }

    /// `CREATE TABLE IF NOT EXISTS` with column and foreign-key clauses.
    pub fn create_sql(&self) -> String {
        let mut clauses: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.storage).trim_end().to_string())
            .collect();

        for fk in &self.foreign_keys {
            clauses.push(format!(
                "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE CASCADE ON UPDATE CASCADE",
                fk.column, fk.parent_table, fk.parent_column
            ));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.name,
            clauses.join(", ")
        )
    }

    /// One `CREATE UNIQUE INDEX IF NOT EXISTS` per declared index.
    pub fn index_sql(&self) -> Vec<String> {
        self.unique
            .iter()
            .map(|idx| {
                format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
                    idx.name,
                    self.name,
                    idx.columns.join(", ")
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_create_with_foreign_key() {
        let table = TableDdl {
            name: "users_tags".into(),
            columns: vec![
                ColumnDdl::new("child_id", "INTEGER PRIMARY KEY"),
                ColumnDdl::new("foreign_id", "INTEGER NOT NULL"),
            ],
            unique: vec![],
            foreign_keys: vec![ForeignKey {
                column: "foreign_id".into(),
                parent_table: "users".into(),
                parent_column: "id".into(),
            }],
        };
        assert_eq!(
            table.create_sql(),
            "CREATE TABLE IF NOT EXISTS users_tags (child_id INTEGER PRIMARY KEY, \
             foreign_id INTEGER NOT NULL, FOREIGN KEY (foreign_id) REFERENCES users (id) \
             ON DELETE CASCADE ON UPDATE CASCADE)"
        );
        assert_eq!(table.drop_sql(), "DROP TABLE IF EXISTS users_tags");
    }

    #[test]
    fn renders_unique_indexes() {
        let table = TableDdl {
            name: "t".into(),
            columns: vec![ColumnDdl::new("a", "")],
            unique: vec![UniqueIndex {
                name: "t_a".into(),
                columns: vec!["a".into()],
            }],
            foreign_keys: vec![],
        };
        assert_eq!(table.create_sql(), "CREATE TABLE IF NOT EXISTS t (a)");
        assert_eq!(
            table.index_sql(),
            vec!["CREATE UNIQUE INDEX IF NOT EXISTS t_a ON t (a)".to_string()]
        );
    }
}
