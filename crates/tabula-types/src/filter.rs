//! Boolean filter tree used by searches, counts, updates and deletes.

use serde_json::Value;

use crate::Record;

/// A where-clause expressed as data.
///
/// `Match` leaves hold column → value pairs that are AND-combined; the
/// other variants compose leaves recursively.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// No restriction.
    #[default]
    All,
    /// Every pair must match.
    Match(Record),
    /// Every child filter must match.
    And(Vec<Filter>),
    /// At least one child filter must match.
    Or(Vec<Filter>),
    /// The child filter must not match.
    Not(Box<Filter>),
}

impl Filter {
    /// A single `key = value` leaf.
    pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut record = Record::new();
        record.insert(key.into(), value.into());
        Self::Match(record)
    }

    /// A leaf matching any of `values` on `key`.
    pub fn any_of<I, V>(key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Or(values.into_iter().map(|v| Self::eq(key, v)).collect())
    }

    /// Negates this filter.
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Whether the filter imposes no restriction.
    pub fn is_all(&self) -> bool {
        match self {
            Self::All => true,
            Self::Match(record) => record.is_empty(),
            Self::And(children) => children.iter().all(Filter::is_all),
            _ => false,
        }
    }

    /// Every column name referenced anywhere in the tree.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        self.collect_keys(&mut keys);
        keys
    }

    fn collect_keys<'a>(&'a self, keys: &mut Vec<&'a str>) {
        match self {
            Self::All => {}
            Self::Match(record) => keys.extend(record.keys().map(String::as_str)),
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_keys(keys);
                }
            }
            Self::Not(child) => child.collect_keys(keys),
        }
    }
}

impl From<Record> for Filter {
    fn from(record: Record) -> Self {
        Self::Match(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_walk_nested_filters() {
        let filter = Filter::And(vec![
            Filter::eq("name", "a"),
            Filter::Or(vec![Filter::eq("age", 3), Filter::eq("role", 1).negate()]),
        ]);
        assert_eq!(filter.keys(), vec!["name", "age", "role"]);
    }

    #[test]
    fn empty_filters_are_all() {
        assert!(Filter::All.is_all());
        assert!(Filter::Match(Record::new()).is_all());
        assert!(Filter::And(vec![]).is_all());
        assert!(!Filter::eq("id", json!(1)).is_all());
        assert!(!Filter::Or(vec![]).is_all());
    }
}
