//! Runs column adapters over whole records.

use serde_json::Value;
use tabula_types::{Filter, Record};

use crate::error::AdapterError;
use crate::schema::Schema;

/// Which adapter of each column to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Storage → user.
    Decode,
    /// User → storage.
    Encode,
}

/// Converts `record` in place, column by column, and returns it.
///
/// Keys are matched to columns ignoring case, renamed to the column's
/// declared name and put in declaration order. Keys that are not columns
/// follow in their original order; object values under such keys are
/// converted recursively. Adapters run in declaration order and each sees
/// the record as converted so far. Decoding drops hidden columns.
///
/// # Errors
///
/// Returns the first adapter failure, attributed to its column.
pub fn run_adapters(
    direction: Direction,
    record: Record,
    schema: &Schema,
) -> Result<Record, AdapterError> {
    let mut entries: Vec<(String, Value)> = record
        .into_iter()
        .map(|(key, value)| match schema.resolve(&key) {
            Some(column) => (column.name.clone(), value),
            None => (key, value),
        })
        .collect();
    // Columns in declaration order, then unknown keys as given.
    entries.sort_by_key(|(key, _)| schema.position(key).unwrap_or(usize::MAX));
    let mut record: Record = entries.into_iter().collect();

    let keys: Vec<String> = record.keys().cloned().collect();
    for key in keys {
        let Some(current) = record.get(&key).cloned() else {
            continue;
        };

        let converted = match schema.column(&key) {
            Some(column) => {
                let adapter = match direction {
                    Direction::Decode => column.decoder.as_deref(),
                    Direction::Encode => column.encoder.as_deref(),
                };
                match adapter {
                    Some(adapter) => match direction {
                        Direction::Decode => adapter.decode(&current, &record),
                        Direction::Encode => adapter.encode(&current, &record),
                    }
                    .map_err(|e| e.in_column(&key))?,
                    None => None,
                }
            }
            None => match current {
                Value::Object(nested) => {
                    Some(Value::Object(run_adapters(direction, nested, schema)?))
                }
                _ => None,
            },
        };

        if let Some(value) = converted {
            record.insert(key, value);
        }
    }

    if direction == Direction::Decode {
        for hidden in schema.hidden() {
            record.shift_remove(hidden);
        }
    }
    Ok(record)
}

/// Encodes every value in a filter tree.
pub fn encode_filter(filter: Filter, schema: &Schema) -> Result<Filter, AdapterError> {
    Ok(match filter {
        Filter::All => Filter::All,
        Filter::Match(record) => Filter::Match(run_adapters(Direction::Encode, record, schema)?),
        Filter::And(children) => Filter::And(
            children
                .into_iter()
                .map(|child| encode_filter(child, schema))
                .collect::<Result<_, _>>()?,
        ),
        Filter::Or(children) => Filter::Or(
            children
                .into_iter()
                .map(|child| encode_filter(child, schema))
                .collect::<Result<_, _>>()?,
        ),
        Filter::Not(child) => Filter::Not(Box::new(encode_filter(*child, schema)?)),
    })
}
