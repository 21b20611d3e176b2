//! Renders filter trees into parameterized `WHERE` clauses.
//!
//! Filter keys are resolved against the schema and replaced by the declared
//! column name before they are written into SQL, so a key that is not a
//! column never reaches the statement text.

use serde_json::Value;
use tabula_db::SqlValue;
use tabula_schema::{Column, Schema};
use tabula_types::{Filter, Record};

use crate::error::BuildError;
use crate::value::{to_sql, to_text};

/// Alias of the aggregated child-table subquery in joined selects.
pub(crate) const ARRAYS_ALIAS: &str = "_arrays";

/// How leaf values are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    /// Plain equality.
    #[default]
    Exact,
    /// Type-dependent fuzzy matching.
    Partial,
}

/// Renders filters for one table.
pub(crate) struct WhereBuilder<'a> {
    schema: &'a Schema,
    mode: MatchMode,
    /// Whether child arrays are joined in and may be filtered on.
    joined: bool,
    params: Vec<SqlValue>,
}

impl<'a> WhereBuilder<'a> {
    pub(crate) fn new(schema: &'a Schema, mode: MatchMode, joined: bool) -> Self {
        Self {
            schema,
            mode,
            joined,
            params: Vec::new(),
        }
    }

    /// Renders `filter` and returns ` WHERE ...`, or an empty string when it
    /// imposes no restriction.
    pub(crate) fn clause(&mut self, filter: &Filter) -> Result<String, BuildError> {
        Ok(match self.render(filter)? {
            Some(condition) => format!(" WHERE {condition}"),
            None => String::new(),
        })
    }

    pub(crate) fn into_params(self) -> Vec<SqlValue> {
        self.params
    }

    /// `None` means "always true" and leaves no bound values behind.
    fn render(&mut self, filter: &Filter) -> Result<Option<String>, BuildError> {
        match filter {
            Filter::All => Ok(None),
            Filter::Match(record) => self.render_match(record),
            Filter::And(children) => {
                let mut parts = Vec::with_capacity(children.len());
                for child in children {
                    if let Some(part) = self.render(child)? {
                        parts.push(part);
                    }
                }
                Ok(join(parts, " AND "))
            }
            Filter::Or(children) => {
                if children.is_empty() {
                    return Ok(Some("0 = 1".to_string()));
                }
                // One unrestricted branch makes the whole `Or` unrestricted;
                // drop the values earlier branches bound.
                let mark = self.params.len();
                let mut parts = Vec::with_capacity(children.len());
                for child in children {
                    match self.render(child)? {
                        Some(part) => parts.push(part),
                        None => {
                            self.params.truncate(mark);
                            return Ok(None);
                        }
                    }
                }
                Ok(join(parts, " OR "))
            }
            Filter::Not(child) => Ok(Some(match self.render(child)? {
                Some(part) => format!("NOT ({part})"),
                None => "0 = 1".to_string(),
            })),
        }
    }

    fn render_match(&mut self, record: &Record) -> Result<Option<String>, BuildError> {
        let mut parts = Vec::with_capacity(record.len());
        for (key, value) in record {
            parts.push(self.render_pair(key, value)?);
        }
        Ok(join(parts, " AND "))
    }

    fn render_pair(&mut self, key: &str, value: &Value) -> Result<String, BuildError> {
        let schema = self.schema;
        let column = schema
            .resolve(key)
            .ok_or_else(|| BuildError::bad_key(schema.table(), key))?;
        let expr = self.column_expr(column, key)?;

        if value.is_null() {
            return Ok(format!("{expr} IS NULL"));
        }

        if column.is_child_array() {
            let text = match value {
                Value::Array(items) => items.iter().map(to_text).collect::<Vec<_>>(),
                other => vec![to_text(other)],
            };
            if text.is_empty() {
                return Ok(format!("{expr} IS NULL"));
            }
            let joined = text.join(schema.delimiter());
            return Ok(match self.mode {
                MatchMode::Exact => self.bind(format!("{expr} = ?"), SqlValue::Text(joined)),
                MatchMode::Partial => self.bind_like(&expr, &joined),
            });
        }

        Ok(match self.mode {
            MatchMode::Exact => self.bind(format!("{expr} = ?"), to_sql(value)),
            MatchMode::Partial if column.bitmap => match value.as_i64() {
                Some(0) => format!("{expr} = 0"),
                _ => self.bind(format!("({expr} & ?) != 0"), to_sql(value)),
            },
            MatchMode::Partial if column.ty.is_textual() && !column.array => {
                self.bind_like(&expr, &to_text(value))
            }
            MatchMode::Partial => self.bind(format!("{expr} = ?"), to_sql(value)),
        })
    }

    fn column_expr(&self, column: &Column, key: &str) -> Result<String, BuildError> {
        let table = self.schema.table();
        if column.is_stored() {
            Ok(format!("{table}.{}", column.name))
        } else if column.is_child_array() && self.joined {
            Ok(format!("{ARRAYS_ALIAS}.{}", column.name))
        } else {
            Err(BuildError::bad_key(table, key))
        }
    }

    fn bind(&mut self, condition: String, value: SqlValue) -> String {
        self.params.push(value);
        condition
    }

    fn bind_like(&mut self, expr: &str, needle: &str) -> String {
        self.params.push(SqlValue::Text(format!("%{}%", escape_like(needle))));
        format!("{expr} LIKE ? ESCAPE '\\'")
    }
}

fn join(parts: Vec<String>, separator: &str) -> Option<String> {
    match parts.len() {
        0 => None,
        1 => parts.into_iter().next(),
        _ => Some(format!("({})", parts.join(separator))),
    }
}

/// Escapes `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
pub fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
