//! `SELECT` and `COUNT` statements.

use tabula_db::{SqlValue, Statement};
use tabula_schema::Schema;
use tabula_types::{Filter, CHILD_FOREIGN_ID, CHILD_INDEX, CHILD_VALUE};

use crate::error::BuildError;
use crate::filter::{MatchMode, WhereBuilder, ARRAYS_ALIAS};

const FOREIGN_ALIAS: &str = "_fid";
const INDEX_ALIAS: &str = "_idx";

/// Shape of a select beyond its filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectOptions {
    pub mode: MatchMode,
    /// Column to sort by; the primary key when unset.
    pub order_by: Option<String>,
    pub reverse: bool,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Join aggregated child-table values into each row.
    pub with_children: bool,
}

/// Builds a select over `schema`'s table.
///
/// With child tables joined, every array column appears in the result as
/// one text value, its elements ordered by position and separated by the
/// schema delimiter, or `NULL` when the array is empty.
///
/// # Errors
///
/// Returns `BuildError::BadKey` if the filter or sort key is not a usable
/// column.
pub fn select(
    schema: &Schema,
    filter: &Filter,
    options: &SelectOptions,
) -> Result<Statement, BuildError> {
    let table = schema.table();
    let joined = options.with_children && !schema.child_tables().is_empty();

    let mut sql = if joined {
        let arrays: Vec<String> = schema
            .child_tables()
            .keys()
            .map(|column| format!("{ARRAYS_ALIAS}.{column}"))
            .collect();
        format!(
            "SELECT {table}.*, {} FROM {table} LEFT JOIN ({}) AS {ARRAYS_ALIAS} ON {ARRAYS_ALIAS}.{FOREIGN_ALIAS} = {table}.{}",
            arrays.join(", "),
            aggregate_children(schema),
            schema.primary_id(),
        )
    } else {
        format!("SELECT * FROM {table}")
    };

    let mut builder = WhereBuilder::new(schema, options.mode, joined);
    sql.push_str(&builder.clause(filter)?);

    let order_key = options.order_by.as_deref().unwrap_or(schema.primary_id());
    let order = schema
        .resolve(order_key)
        .filter(|column| column.is_stored())
        .ok_or_else(|| BuildError::bad_key(table, order_key))?;
    let direction = if options.reverse { "DESC" } else { "ASC" };
    sql.push_str(&format!(" ORDER BY {table}.{} {direction}", order.name));

    let mut params = builder.into_params();
    match (options.limit, options.offset) {
        (None, None) => {}
        (limit, offset) => {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(limit.map_or(SqlValue::Integer(-1), sql_count));
            params.push(sql_count(offset.unwrap_or(0)));
        }
    }

    Ok(Statement::with_params(sql, params))
}

/// Builds `SELECT COUNT(*)` over `schema`'s table. Child tables are never
/// joined, so array columns cannot be filtered on.
///
/// # Errors
///
/// Returns `BuildError::BadKey` if a filter key is not a stored column.
pub fn count(schema: &Schema, filter: &Filter, mode: MatchMode) -> Result<Statement, BuildError> {
    let mut builder = WhereBuilder::new(schema, mode, false);
    let clause = builder.clause(filter)?;
    Ok(Statement::with_params(
        format!("SELECT COUNT(*) AS count FROM {}{clause}", schema.table()),
        builder.into_params(),
    ))
}

/// The subquery joined by [`select`]: one row per parent key with every
/// array aggregated into its own column.
fn aggregate_children(schema: &Schema) -> String {
    let delimiter = schema.delimiter();
    let names: Vec<&str> = schema.child_tables().keys().map(String::as_str).collect();

    let branches: Vec<String> = schema
        .child_tables()
        .values()
        .enumerate()
        .map(|(position, child)| {
            let projections: Vec<String> = names
                .iter()
                .enumerate()
                .map(|(slot, name)| {
                    let value = if slot == position { CHILD_VALUE } else { "NULL" };
                    format!("{value} AS {name}")
                })
                .collect();
            format!(
                "SELECT {CHILD_FOREIGN_ID} AS {FOREIGN_ALIAS}, {CHILD_INDEX} AS {INDEX_ALIAS}, {} FROM {}",
                projections.join(", "),
                child.table()
            )
        })
        .collect();

    let aggregates: Vec<String> = names
        .iter()
        .map(|name| format!("GROUP_CONCAT({name}, '{delimiter}' ORDER BY {INDEX_ALIAS}) AS {name}"))
        .collect();

    format!(
        "SELECT {FOREIGN_ALIAS}, {} FROM ({}) GROUP BY {FOREIGN_ALIAS}",
        aggregates.join(", "),
        branches.join(" UNION ALL ")
    )
}

fn sql_count(n: u64) -> SqlValue {
    SqlValue::Integer(i64::try_from(n).unwrap_or(i64::MAX))
}
