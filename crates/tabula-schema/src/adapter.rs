//! Value adapters between user and storage representation.
//!
//! Every column carries an optional decoder (storage → user) and encoder
//! (user → storage). The schema normalizer fills both slots from the
//! built-in adapters below unless the declaration supplied its own, and
//! leaves them empty for bitmap columns.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{Number, Value};
use tabula_types::{ColumnType, Record};

use crate::error::AdapterError;

/// Result of an adapter call. `None` leaves the value untouched.
pub type AdapterResult = Result<Option<Value>, AdapterError>;

/// A bidirectional value converter for one column.
///
/// Both methods receive the current value and the record it belongs to, as
/// converted so far. Implementations override the direction(s) they handle;
/// the defaults leave values unchanged.
pub trait Adapter: fmt::Debug + Send + Sync {
    /// Converts a stored value into its user representation.
    fn decode(&self, _value: &Value, _record: &Record) -> AdapterResult {
        Ok(None)
    }

    /// Converts a user value into its stored representation.
    fn encode(&self, _value: &Value, _record: &Record) -> AdapterResult {
        Ok(None)
    }
}

/// Wraps a closure as the decode half of an adapter.
pub struct DecodeFn<F>(pub F);

/// Wraps a closure as the encode half of an adapter.
pub struct EncodeFn<F>(pub F);

impl<F> DecodeFn<F>
where
    F: Fn(&Value, &Record) -> AdapterResult + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EncodeFn<F>
where
    F: Fn(&Value, &Record) -> AdapterResult + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> fmt::Debug for DecodeFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DecodeFn")
    }
}

impl<F> fmt::Debug for EncodeFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncodeFn")
    }
}

impl<F> Adapter for DecodeFn<F>
where
    F: Fn(&Value, &Record) -> AdapterResult + Send + Sync,
{
    fn decode(&self, value: &Value, record: &Record) -> AdapterResult {
        (self.0)(value, record)
    }
}

impl<F> Adapter for EncodeFn<F>
where
    F: Fn(&Value, &Record) -> AdapterResult + Send + Sync,
{
    fn encode(&self, value: &Value, record: &Record) -> AdapterResult {
        (self.0)(value, record)
    }
}

/// JSON objects stored as text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectAdapter;

impl Adapter for ObjectAdapter {
    fn decode(&self, value: &Value, _record: &Record) -> AdapterResult {
        match value {
            // Plain text that is not JSON is returned as stored.
            Value::String(text) => Ok(serde_json::from_str(text).ok()),
            _ => Ok(None),
        }
    }

    fn encode(&self, value: &Value, _record: &Record) -> AdapterResult {
        match value {
            Value::Null | Value::String(_) => Ok(None),
            other => Ok(Some(Value::String(other.to_string()))),
        }
    }
}

/// Dates and datetimes stored as epoch milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct DateAdapter {
    /// Whether the user representation carries a time of day.
    pub with_time: bool,
}

impl DateAdapter {
    fn format(&self, millis: i64) -> Option<String> {
        let instant = Utc.timestamp_millis_opt(millis).single()?;
        Some(if self.with_time {
            instant.to_rfc3339_opts(SecondsFormat::Millis, true)
        } else {
            instant.date_naive().format("%Y-%m-%d").to_string()
        })
    }
}

impl Adapter for DateAdapter {
    fn decode(&self, value: &Value, _record: &Record) -> AdapterResult {
        let Some(millis) = as_whole_number(value) else {
            return Ok(None);
        };
        self.format(millis)
            .map(|text| Some(Value::String(text)))
            .ok_or_else(|| AdapterError::invalid("epoch milliseconds in range", value))
    }

    fn encode(&self, value: &Value, _record: &Record) -> AdapterResult {
        match value {
            Value::Null => Ok(None),
            Value::Number(_) => as_whole_number(value)
                .map(|ms| Some(Value::from(ms)))
                .ok_or_else(|| AdapterError::invalid("epoch milliseconds", value)),
            Value::String(text) => parse_date_text(text.trim())
                .map(|ms| Some(Value::from(ms)))
                .ok_or_else(|| AdapterError::invalid("date", value)),
            _ => Err(AdapterError::invalid("date", value)),
        }
    }
}

/// Flags stored as `0`/`1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanAdapter;

impl Adapter for BooleanAdapter {
    fn decode(&self, value: &Value, _record: &Record) -> AdapterResult {
        match value {
            Value::Number(n) => Ok(Some(Value::Bool(n.as_f64().unwrap_or(0.0) != 0.0))),
            Value::String(_) => Ok(coerce_bool(value).map(Value::Bool)),
            _ => Ok(None),
        }
    }

    fn encode(&self, value: &Value, _record: &Record) -> AdapterResult {
        if value.is_null() {
            return Ok(None);
        }
        coerce_bool(value)
            .map(|flag| Some(Value::from(i64::from(flag))))
            .ok_or_else(|| AdapterError::invalid("boolean", value))
    }
}

/// Integers parsed from numbers, numeric strings or flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntAdapter;

impl Adapter for IntAdapter {
    fn encode(&self, value: &Value, _record: &Record) -> AdapterResult {
        match value {
            Value::Null => Ok(None),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(None),
            Value::Number(n) => n
                .as_f64()
                .filter(|f| f.is_finite())
                .map(|f| Some(Value::from(f.trunc() as i64)))
                .ok_or_else(|| AdapterError::invalid("integer", value)),
            Value::Bool(flag) => Ok(Some(Value::from(i64::from(*flag)))),
            Value::String(text) => parse_int(text.trim())
                .map(|i| Some(Value::from(i)))
                .ok_or_else(|| AdapterError::invalid("integer", value)),
            _ => Err(AdapterError::invalid("integer", value)),
        }
    }
}

/// Floats parsed from numbers or numeric strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatAdapter;

impl Adapter for FloatAdapter {
    fn encode(&self, value: &Value, _record: &Record) -> AdapterResult {
        match value {
            Value::Null | Value::Number(_) => Ok(None),
            Value::String(text) => text
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(|n| Some(Value::Number(n)))
                .ok_or_else(|| AdapterError::invalid("number", value)),
            _ => Err(AdapterError::invalid("number", value)),
        }
    }
}

/// How an array column is laid out in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayLayout {
    /// Elements live in a child table and come back joined by this delimiter.
    Child { delimiter: String },
    /// Elements are stored in the parent column as JSON text.
    Inline,
}

/// Arrays of any element type.
///
/// Element values are converted with the element type's adapter, if any.
#[derive(Debug, Clone)]
pub struct ArrayAdapter {
    pub element: ColumnType,
    pub inner: Option<Arc<dyn Adapter>>,
    pub layout: ArrayLayout,
}

impl ArrayAdapter {
    fn split_stored(&self, text: &str) -> Vec<Value> {
        match &self.layout {
            ArrayLayout::Child { delimiter } => text
                .split(delimiter.as_str())
                .map(|part| from_text(self.element, part))
                .collect(),
            ArrayLayout::Inline => match serde_json::from_str::<Value>(text) {
                Ok(Value::Array(items)) => items,
                _ if text.is_empty() => Vec::new(),
                _ => text
                    .split(',')
                    .map(|part| from_text(self.element, part.trim()))
                    .collect(),
            },
        }
    }

    fn split_input(&self, text: &str) -> Vec<Value> {
        if text.is_empty() {
            return Vec::new();
        }
        let delimiter = match &self.layout {
            ArrayLayout::Child { delimiter } if text.contains(delimiter.as_str()) => {
                delimiter.as_str()
            }
            _ => ",",
        };
        text.split(delimiter)
            .map(|part| Value::String(part.trim().to_string()))
            .collect()
    }

    fn map_elements<F>(&self, items: Vec<Value>, mut convert: F) -> Result<Value, AdapterError>
    where
        F: FnMut(&dyn Adapter, &Value) -> AdapterResult,
    {
        let Some(inner) = self.inner.as_deref() else {
            return Ok(Value::Array(items));
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match convert(inner, &item)? {
                Some(converted) => out.push(converted),
                None => out.push(item),
            }
        }
        Ok(Value::Array(out))
    }
}

impl Adapter for ArrayAdapter {
    fn decode(&self, value: &Value, record: &Record) -> AdapterResult {
        let items = match value {
            Value::Null => return Ok(None),
            Value::Array(items) => items.clone(),
            Value::String(text) => self.split_stored(text),
            other => vec![other.clone()],
        };
        self.map_elements(items, |inner, item| inner.decode(item, record))
            .map(Some)
    }

    fn encode(&self, value: &Value, record: &Record) -> AdapterResult {
        let items = match value {
            Value::Null => return Ok(None),
            Value::Array(items) => items.clone(),
            Value::String(text) => self.split_input(text),
            other => vec![other.clone()],
        };
        let encoded = self.map_elements(items, |inner, item| inner.encode(item, record))?;

        if let (ArrayLayout::Child { delimiter }, Value::Array(items)) = (&self.layout, &encoded) {
            for item in items {
                if let Value::String(text) = item {
                    if text.contains(delimiter.as_str()) {
                        return Err(AdapterError::Delimiter(text.clone()));
                    }
                }
            }
        }
        Ok(Some(encoded))
    }
}

/// The built-in adapter for a scalar type, if it has one.
pub fn default_adapter(ty: ColumnType) -> Option<Arc<dyn Adapter>> {
    let adapter: Arc<dyn Adapter> = match ty {
        ColumnType::Object => Arc::new(ObjectAdapter),
        ColumnType::Date => Arc::new(DateAdapter { with_time: false }),
        ColumnType::DateTime => Arc::new(DateAdapter { with_time: true }),
        ColumnType::Boolean => Arc::new(BooleanAdapter),
        ColumnType::Int => Arc::new(IntAdapter),
        ColumnType::Float => Arc::new(FloatAdapter),
        _ => return None,
    };
    Some(adapter)
}

/// The built-in adapter for an array of `ty`.
pub fn default_array_adapter(ty: ColumnType, layout: ArrayLayout) -> Arc<dyn Adapter> {
    Arc::new(ArrayAdapter {
        element: ty,
        inner: default_adapter(ty),
        layout,
    })
}

/// Interprets text produced by SQLite's string conversion as a storage
/// value of `ty`.
pub fn from_text(ty: ColumnType, text: &str) -> Value {
    if ty.is_integer_backed() {
        if let Ok(i) = text.parse::<i64>() {
            return Value::from(i);
        }
    }
    if ty == ColumnType::Float {
        if let Some(n) = text.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(n);
        }
    }
    Value::String(text.to_string())
}

/// Loose boolean coercion: `true`/`1`/`yes`/`on` and their opposites.
pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" | "y" => Some(true),
            "false" | "0" | "no" | "off" | "n" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_whole_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
        _ => None,
    }
}

fn parse_int(text: &str) -> Option<i64> {
    text.parse::<i64>().ok().or_else(|| {
        text.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64)
    })
}

fn parse_date_text(text: &str) -> Option<i64> {
    if let Ok(ms) = text.parse::<i64>() {
        return Some(ms);
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Some(instant.timestamp_millis());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}
