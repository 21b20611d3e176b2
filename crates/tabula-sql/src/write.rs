//! `INSERT`, `UPDATE` and `DELETE` statements, including child tables and
//! key swaps.

use std::collections::HashMap;

use serde_json::Value;
use tabula_db::{SqlValue, Statement};
use tabula_schema::{ChildTable, Column, Schema};
use tabula_types::{Filter, IfExists, Record, CHILD_FOREIGN_ID, CHILD_INDEX, CHILD_VALUE};

use crate::error::BuildError;
use crate::filter::{MatchMode, WhereBuilder};
use crate::value::to_sql;

/// Bound-parameter limit of the bundled SQLite build.
pub const MAX_PARAMS: usize = 32_766;

/// Text key parked on a row while two keys are exchanged.
const TEXT_SWAP_SENTINEL: &str = "\u{1}swap\u{1}";

/// Splits storage records into multi-row inserts.
///
/// Consecutive rows that set the same columns share a statement, chunked to
/// stay under [`MAX_PARAMS`]; input order is preserved. Only parent-table
/// columns are written. Each statement returns the primary key of every row
/// it inserted.
///
/// # Errors
///
/// Returns `BuildError::NoData` for an empty slice and `BuildError::BadKey`
/// for keys that are not columns.
pub fn insert(
    schema: &Schema,
    rows: &[Record],
    if_exists: IfExists,
) -> Result<Vec<Statement>, BuildError> {
    if rows.is_empty() {
        return Err(BuildError::NoData(schema.table().to_string()));
    }

    let mut groups: Vec<(Vec<&Column>, Vec<Vec<SqlValue>>)> = Vec::new();
    for row in rows {
        let (columns, values) = stored_values(schema, row)?;
        let same = groups.last().is_some_and(|(last, _)| {
            last.len() == columns.len() && last.iter().zip(&columns).all(|(a, b)| a.name == b.name)
        });
        match groups.last_mut() {
            Some((_, batch)) if same => batch.push(values),
            _ => groups.push((columns, vec![values])),
        }
    }

    let mut statements = Vec::new();
    for (columns, batch) in groups {
        if columns.is_empty() {
            for _ in &batch {
                statements.push(Statement::new(format!(
                    "INSERT{} INTO {} DEFAULT VALUES RETURNING {}",
                    if_exists.conflict_clause(),
                    schema.table(),
                    schema.primary_id()
                )));
            }
            continue;
        }
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        for chunk in batch.chunks(rows_per_statement(columns.len())) {
            statements.push(values_statement(
                &format!("INSERT{} INTO {}", if_exists.conflict_clause(), schema.table()),
                &names,
                chunk,
                Some(schema.primary_id()),
            ));
        }
    }
    Ok(statements)
}

/// Builds the statements writing one array into its child table.
///
/// Returns no statements for an empty array.
pub fn insert_children(child: &ChildTable, foreign_id: &SqlValue, items: &[Value]) -> Vec<Statement> {
    let rows: Vec<Vec<SqlValue>> = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            vec![
                foreign_id.clone(),
                SqlValue::Integer(i64::try_from(index).unwrap_or(i64::MAX)),
                to_sql(item),
            ]
        })
        .collect();

    rows.chunks(rows_per_statement(3))
        .map(|chunk| {
            values_statement(
                &format!("INSERT INTO {}", child.table()),
                &[CHILD_FOREIGN_ID, CHILD_INDEX, CHILD_VALUE],
                chunk,
                None,
            )
        })
        .collect()
}

/// Deletes the child rows of the given parent keys.
pub fn delete_children(child: &ChildTable, foreign_ids: &[SqlValue]) -> Vec<Statement> {
    foreign_ids
        .chunks(MAX_PARAMS)
        .map(|chunk| {
            Statement::with_params(
                format!(
                    "DELETE FROM {} WHERE {CHILD_FOREIGN_ID} IN ({})",
                    child.table(),
                    placeholders(chunk.len())
                ),
                chunk.to_vec(),
            )
        })
        .collect()
}

/// Builds `UPDATE ... SET ... WHERE ...` for the parent-table columns in
/// `changes`. Returns `None` when `changes` touches no parent-table column.
///
/// # Errors
///
/// Returns `BuildError::BadKey` for keys that are not columns.
pub fn update(
    schema: &Schema,
    changes: &Record,
    filter: &Filter,
) -> Result<Option<Statement>, BuildError> {
    let (columns, mut params) = stored_values(schema, changes)?;
    if columns.is_empty() {
        return Ok(None);
    }

    let assignments: Vec<String> = columns.iter().map(|c| format!("{} = ?", c.name)).collect();
    let mut builder = WhereBuilder::new(schema, MatchMode::Exact, false);
    let clause = builder.clause(filter)?;
    params.extend(builder.into_params());

    Ok(Some(Statement::with_params(
        format!("UPDATE {} SET {}{clause}", schema.table(), assignments.join(", ")),
        params,
    )))
}

/// Builds one `DELETE ... WHERE key = ?` per id.
///
/// # Errors
///
/// Returns `BuildError::BadKey` if `key` is not a stored column.
pub fn delete(schema: &Schema, key: &str, ids: &[Value]) -> Result<Vec<Statement>, BuildError> {
    let column = stored_column(schema, key)?;
    Ok(ids
        .iter()
        .map(|id| {
            Statement::with_params(
                format!("DELETE FROM {} WHERE {} = ?", schema.table(), column.name),
                vec![to_sql(id)],
            )
        })
        .collect())
}

/// Builds the statements exchanging key `a` with key `b`.
///
/// When `b` exists the rows trade places through a sentinel key in three
/// updates, so no intermediate state holds a duplicate key. Otherwise `a` is
/// renamed to `b`. Run the result in one transaction.
///
/// # Errors
///
/// Returns `BuildError::BadKey` if `key` is not a stored column.
pub fn swap(
    schema: &Schema,
    key: &str,
    a: &Value,
    b: &Value,
    b_exists: bool,
) -> Result<Vec<Statement>, BuildError> {
    let column = stored_column(schema, key)?;
    let sql = format!("UPDATE {} SET {name} = ? WHERE {name} = ?", schema.table(), name = column.name);
    let (a, b) = (to_sql(a), to_sql(b));

    if !b_exists {
        return Ok(vec![Statement::with_params(sql, vec![b, a])]);
    }

    let sentinel = swap_sentinel(column);
    Ok(vec![
        Statement::with_params(sql.clone(), vec![sentinel.clone(), a.clone()]),
        Statement::with_params(sql.clone(), vec![a, b.clone()]),
        Statement::with_params(sql, vec![b, sentinel]),
    ])
}

/// The key parked on a row during a swap; never a value a caller stores.
fn swap_sentinel(column: &Column) -> SqlValue {
    match column.ty.affinity() {
        "INTEGER" | "REAL" => SqlValue::Integer(i64::MIN),
        _ => SqlValue::Text(TEXT_SWAP_SENTINEL.to_string()),
    }
}

fn stored_column<'a>(schema: &'a Schema, key: &str) -> Result<&'a Column, BuildError> {
    schema
        .resolve(key)
        .filter(|c| c.is_stored())
        .ok_or_else(|| BuildError::bad_key(schema.table(), key))
}

/// Splits a record into its parent-table columns and their bound values,
/// in schema order.
///
/// Child arrays and columns without storage are skipped.
fn stored_values<'a>(
    schema: &'a Schema,
    record: &Record,
) -> Result<(Vec<&'a Column>, Vec<SqlValue>), BuildError> {
    let mut by_column: HashMap<&str, &Value> = HashMap::with_capacity(record.len());
    for (key, value) in record {
        let column = schema
            .resolve(key)
            .ok_or_else(|| BuildError::bad_key(schema.table(), key))?;
        by_column.insert(column.name.as_str(), value);
    }

    let mut columns = Vec::with_capacity(by_column.len());
    let mut values = Vec::with_capacity(by_column.len());
    for column in schema.storage_columns() {
        if let Some(value) = by_column.get(column.name.as_str()) {
            columns.push(column);
            values.push(to_sql(value));
        }
    }
    Ok((columns, values))
}

fn values_statement(
    head: &str,
    columns: &[&str],
    rows: &[Vec<SqlValue>],
    returning: Option<&str>,
) -> Statement {
    let tuple = format!("({})", placeholders(columns.len()));
    let tuples = vec![tuple; rows.len()].join(", ");
    let mut sql = format!("{head} ({}) VALUES {tuples}", columns.join(", "));
    if let Some(key) = returning {
        sql.push_str(" RETURNING ");
        sql.push_str(key);
    }
    Statement::with_params(sql, rows.iter().flatten().cloned().collect())
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn rows_per_statement(columns: usize) -> usize {
    (MAX_PARAMS / columns.max(1)).max(1)
}
