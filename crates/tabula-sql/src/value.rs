//! Conversion between JSON values and SQLite values.

use serde_json::{Number, Value};
use tabula_db::{Row, SqlValue};
use tabula_types::Record;

/// Converts a storage value into a bindable parameter.
///
/// Booleans bind as `0`/`1`; arrays and objects bind as their JSON text.
pub fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map_or(SqlValue::Null, SqlValue::Real),
        },
        Value::String(text) => SqlValue::Text(text.clone()),
        other @ (Value::Array(_) | Value::Object(_)) => SqlValue::Text(other.to_string()),
    }
}

/// Converts a column value read from SQLite into JSON.
///
/// Blobs come back as arrays of byte values.
pub fn from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::from(i),
        SqlValue::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        SqlValue::Text(text) => Value::String(text),
        SqlValue::Blob(bytes) => Value::Array(bytes.into_iter().map(Value::from).collect()),
    }
}

/// Converts a result row into a storage record.
pub fn row_to_record(row: Row) -> Record {
    row.into_iter()
        .map(|(name, value)| (name, from_sql(value)))
        .collect()
}

/// Renders a value the way SQLite renders it as text, which is how
/// child-table values appear after aggregation.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(flag) => i64::from(*flag).to_string(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_bind_natively() {
        assert_eq!(to_sql(&json!(null)), SqlValue::Null);
        assert_eq!(to_sql(&json!(true)), SqlValue::Integer(1));
        assert_eq!(to_sql(&json!(-7)), SqlValue::Integer(-7));
        assert_eq!(to_sql(&json!(1.5)), SqlValue::Real(1.5));
        assert_eq!(to_sql(&json!("x")), SqlValue::Text("x".into()));
    }

    #[test]
    fn structures_bind_as_json_text() {
        assert_eq!(to_sql(&json!([1, "a"])), SqlValue::Text("[1,\"a\"]".into()));
        assert_eq!(to_sql(&json!({"k": 1})), SqlValue::Text("{\"k\":1}".into()));
    }

    #[test]
    fn rows_become_records() {
        let mut row = Row::new();
        row.insert("id".into(), SqlValue::Integer(4));
        row.insert("score".into(), SqlValue::Real(0.25));
        row.insert("blob".into(), SqlValue::Blob(vec![1, 2]));
        row.insert("gone".into(), SqlValue::Null);

        let record = row_to_record(row);
        assert_eq!(
            Value::Object(record),
            json!({"id": 4, "score": 0.25, "blob": [1, 2], "gone": null})
        );
    }

    #[test]
    fn text_rendering_matches_sqlite() {
        assert_eq!(to_text(&json!("abc")), "abc");
        assert_eq!(to_text(&json!(12)), "12");
        assert_eq!(to_text(&json!(false)), "0");
    }
}
