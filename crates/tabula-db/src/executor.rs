//! Transactional statement execution.
//!
//! Every statement the engine issues passes through one of the functions
//! here. Single statements run as-is; [`multi_run`] and [`transaction`]
//! wrap several statements in `BEGIN IMMEDIATE ... COMMIT` and roll back on
//! the first failure. Driver errors are converted into [`DbError`] with the
//! offending statement attached.

use indexmap::IndexMap;
use rusqlite::{params_from_iter, Connection};

use crate::ddl::TableDdl;
use crate::error::{DbError, RollbackError};

/// A bound SQLite value.
pub type SqlValue = rusqlite::types::Value;

/// A result row keyed by the column name the backend reported.
pub type Row = IndexMap<String, SqlValue>;

/// A statement together with its positional parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    /// SQL text with `?` placeholders.
    pub sql: String,
    /// Values bound to the placeholders, in order.
    pub params: Vec<SqlValue>,
}

impl Statement {
    /// A statement without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// A statement with parameters.
    pub fn with_params(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Outcome of a data-modifying statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunInfo {
    /// Row id of the last inserted row on this connection.
    pub last_id: i64,
    /// Number of rows changed.
    pub changes: usize,
}

/// Executes one or more semicolon-separated statements without parameters.
pub fn exec(conn: &Connection, sql: &str) -> Result<(), DbError> {
    conn.execute_batch(sql)
        .map_err(|e| DbError::sql(e, sql, &[]))
}

/// Executes a single data-modifying statement.
pub fn run(conn: &Connection, stmt: &Statement) -> Result<RunInfo, DbError> {
    let changes = conn
        .execute(&stmt.sql, params_from_iter(stmt.params.iter()))
        .map_err(|e| DbError::sql(e, &stmt.sql, &stmt.params))?;
    Ok(RunInfo {
        last_id: conn.last_insert_rowid(),
        changes,
    })
}

/// Runs a query and returns every row.
///
/// Also accepts statements with a `RETURNING` clause.
pub fn all(conn: &Connection, stmt: &Statement) -> Result<Vec<Row>, DbError> {
    let fail = |e| DbError::sql(e, &stmt.sql, &stmt.params);

    let mut prepared = conn.prepare(&stmt.sql).map_err(fail)?;
    let names: Vec<String> = prepared
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    let mut rows = prepared
        .query(params_from_iter(stmt.params.iter()))
        .map_err(fail)?;

    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(fail)? {
        let mut record = Row::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            let value: SqlValue = row.get(idx).map_err(fail)?;
            record.insert(name.clone(), value);
        }
        out.push(record);
    }
    Ok(out)
}

/// Runs a query and returns the first row, if any.
pub fn get(conn: &Connection, stmt: &Statement) -> Result<Option<Row>, DbError> {
    Ok(all(conn, stmt)?.into_iter().next())
}

/// Runs `f` inside `BEGIN IMMEDIATE ... COMMIT`.
///
/// On any error from `f` (or from `COMMIT`) the transaction is rolled back
/// and the original error is returned. If `ROLLBACK` itself fails, its error
/// is attached through [`RollbackError`] rather than replacing the original.
pub fn transaction<T, E, F>(conn: &Connection, f: F) -> Result<T, E>
where
    E: RollbackError,
    F: FnOnce(&Connection) -> Result<T, E>,
{
    exec(conn, "BEGIN IMMEDIATE")?;

    let outcome = f(conn).and_then(|value| {
        exec(conn, "COMMIT")?;
        Ok(value)
    });

    match outcome {
        Ok(value) => Ok(value),
        Err(err) => {
            // A failed COMMIT may already have ended the transaction.
            if conn.is_autocommit() {
                return Err(err);
            }
            match exec(conn, "ROLLBACK") {
                Ok(()) => {
                    tracing::debug!("transaction rolled back");
                    Err(err)
                }
                Err(rollback) => {
                    tracing::error!(error = %rollback, "rollback failed");
                    Err(err.with_rollback_failure(rollback))
                }
            }
        }
    }
}

/// Runs every statement in one transaction.
///
/// The returned info sums `changes` and reports the `last_id` observed after
/// the final statement.
pub fn multi_run(conn: &Connection, statements: &[Statement]) -> Result<RunInfo, DbError> {
    transaction(conn, |conn| {
        let mut total = RunInfo::default();
        for stmt in statements {
            let info = run(conn, stmt)?;
            total.changes += info.changes;
            total.last_id = info.last_id;
        }
        Ok(total)
    })
}

/// Rebuilds a set of tables in one transaction.
///
/// Tables are created in the order given, so parents must precede the child
/// tables that reference them. With `hard` set every table is dropped first,
/// children before parents; otherwise creation is additive
/// (`CREATE TABLE IF NOT EXISTS`).
pub fn reset(conn: &Connection, tables: &[TableDdl], hard: bool) -> Result<RunInfo, DbError> {
    let mut statements = Vec::new();

    if hard {
        for table in tables.iter().rev() {
            statements.push(Statement::new(table.drop_sql()));
        }
    }
    for table in tables {
        statements.push(Statement::new(table.create_sql()));
        statements.extend(table.index_sql().into_iter().map(Statement::new));
    }

    let info = multi_run(conn, &statements)?;
    tracing::info!(
        tables = tables.len(),
        hard,
        statements = statements.len(),
        "tables reset"
    );
    Ok(info)
}
