//! Injection guard for names interpolated into SQL text.
//!
//! Values are bound as parameters everywhere, but table names, column names
//! and index names cannot be. Every such name passes through [`check_identifier`]
//! when a schema is built, so the SQL builder can interpolate them verbatim.

use serde_json::Value;

use crate::error::SchemaError;
use crate::reserved::is_reserved;

/// Checks a single identifier and returns it unchanged.
///
/// The identifier must be non-empty, consist only of ASCII letters, digits
/// and `_`, and must not be a reserved SQL keyword in any case.
///
/// # Errors
///
/// Returns `SchemaError::Injection` naming `context` on any violation.
pub fn check_identifier<'a>(value: &'a str, context: &str) -> Result<&'a str, SchemaError> {
    let reject = |reason| SchemaError::Injection {
        value: value.to_string(),
        context: context.to_string(),
        reason,
    };

    if value.is_empty() {
        return Err(reject("identifier is empty"));
    }
    if !value.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return Err(reject("only letters, digits and '_' are allowed"));
    }
    if is_reserved(value) {
        return Err(reject("reserved SQL keyword"));
    }
    Ok(value)
}

/// Checks every identifier inside a JSON value.
///
/// Strings are checked directly, arrays element by element, and objects by
/// key (values are recursed into). Other scalars are not identifiers.
pub fn check_value(value: &Value, context: &str) -> Result<(), SchemaError> {
    match value {
        Value::String(s) => check_identifier(s, context).map(|_| ()),
        Value::Array(items) => items.iter().try_for_each(|v| check_value(v, context)),
        Value::Object(map) => map.iter().try_for_each(|(key, v)| {
            check_identifier(key, context)?;
            check_value(v, context)
        }),
        other => Err(SchemaError::Injection {
            value: other.to_string(),
            context: context.to_string(),
            reason: "identifier is not a string",
        }),
    }
}

/// Checks a delimiter that is interpolated as a SQL string literal and used
/// to join child-table values.
///
/// The delimiter must be non-empty and must not contain characters that can
/// occur in ordinary values or that would end or escape the literal.
pub fn check_delimiter<'a>(value: &'a str, context: &str) -> Result<&'a str, SchemaError> {
    let reject = |reason| SchemaError::Injection {
        value: value.to_string(),
        context: context.to_string(),
        reason,
    };

    if value.is_empty() {
        return Err(reject("delimiter is empty"));
    }
    let unsafe_char = |c: char| {
        c.is_alphanumeric()
            || c.is_whitespace()
            || matches!(c, '_' | '%' | '\'' | '"' | '\\' | ',')
    };
    if value.chars().any(unsafe_char) {
        return Err(reject("delimiter may only contain punctuation or control characters"));
    }
    Ok(value)
}

/// Checks an explicit storage type such as `VARCHAR(64) NOT NULL`.
///
/// Keywords are expected here, so only the character set is restricted.
pub fn check_storage_type<'a>(value: &'a str, context: &str) -> Result<&'a str, SchemaError> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '(' | ')' | ',');
    if value.trim().is_empty() || !value.chars().all(allowed) {
        return Err(SchemaError::Injection {
            value: value.to_string(),
            context: context.to_string(),
            reason: "storage type may only contain letters, digits, spaces, '_', '(', ')' and ','",
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tabula_types::ErrorKind;

    #[test]
    fn accepts_plain_identifiers() {
        assert_eq!(check_identifier("user_table_2", "t").unwrap(), "user_table_2");
        assert!(check_identifier("Name", "t").is_ok());
    }

    #[test]
    fn rejects_statement_smuggling() {
        let err = check_identifier("users; DROP TABLE users", "users").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InjectionError);
    }

    #[test]
    fn rejects_reserved_words_in_any_case() {
        assert!(check_identifier("SELECT", "t").is_err());
        assert!(check_identifier("select", "t").is_err());
        assert!(check_identifier("Index", "t").is_err());
    }

    #[test]
    fn rejects_whitespace_and_punctuation() {
        for bad in ["a b", "a-b", "a.b", "a\"b", "a'b", "tab\t", "", "ümlaut"] {
            assert!(check_identifier(bad, "t").is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn check_value_recurses_into_keys() {
        assert!(check_value(&json!(["a", {"b": "c"}]), "t").is_ok());
        assert!(check_value(&json!({"ok": "fine", "not ok": "x"}), "t").is_err());
        assert!(check_value(&json!(["a", ["WHERE"]]), "t").is_err());
        assert!(check_value(&json!(5), "t").is_err());
    }

    #[test]
    fn delimiter_rules() {
        assert!(check_delimiter("\u{1f}", "d").is_ok());
        assert!(check_delimiter("|~|", "d").is_ok());
        assert!(check_delimiter("", "d").is_err());
        assert!(check_delimiter("'", "d").is_err());
        assert!(check_delimiter("a", "d").is_err());
        assert!(check_delimiter(" ", "d").is_err());
    }

    #[test]
    fn storage_type_rules() {
        assert!(check_storage_type("VARCHAR(64) NOT NULL", "c").is_ok());
        assert!(check_storage_type("TEXT; DROP TABLE x", "c").is_err());
        assert!(check_storage_type("  ", "c").is_err());
    }
}
