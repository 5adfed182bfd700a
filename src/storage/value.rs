//! Storage Value Module
//!
//! Defines the closed set of shapes the engine is able to cache.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{Result, StorageError};

/// Marker field used to keep dates distinct from strings on the wire.
const DATE_TAG: &str = "$date";

// == Storage Value ==
/// A cacheable value.
///
/// The wire form is plain JSON, except `Date` which is written as
/// `{"$date": "<rfc3339>"}` so it decodes back to a date rather than a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Value", from = "Value")]
pub enum StorageValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<StorageValue>),
    Object(BTreeMap<String, StorageValue>),
}

impl StorageValue {
    // == Cacheability Check ==
    /// Converts any serializable value into a StorageValue.
    ///
    /// `None` becomes `Null`. Fails with `NotCacheable` when serde cannot
    /// express the value as JSON (for instance a map with non-string keys).
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Self::from)
            .map_err(|e| StorageError::NotCacheable(e.to_string()))
    }

    /// Deserializes the value into a caller type. Dates are handed over as
    /// RFC 3339 strings, the form chrono and most serde types expect.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.to_plain_json())?)
    }

    /// JSON without the date marker: `Date` renders as an RFC 3339 string.
    pub fn to_plain_json(&self) -> Value {
        match self {
            StorageValue::Date(date) => Value::String(format_date(date)),
            StorageValue::Array(items) => {
                Value::Array(items.iter().map(StorageValue::to_plain_json).collect())
            }
            StorageValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_plain_json()))
                    .collect(),
            ),
            other => Value::from(other.clone()),
        }
    }

    // == Wire Form ==
    /// Returns the wire JSON representation, dates tagged with `$date`.
    pub fn to_json(&self) -> Value {
        Value::from(self.clone())
    }

    /// Encodes the value as JSON text.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes JSON text produced by `encode` (or any JSON document).
    pub fn decode(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Approximate size in bytes, measured on the encoded form.
    pub fn size_estimate(&self) -> usize {
        self.encode().map(|raw| raw.len()).unwrap_or(0)
    }

    // == Accessors ==
    pub fn is_null(&self) -> bool {
        matches!(self, StorageValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            StorageValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StorageValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Looks up a field of an object value.
    pub fn get(&self, field: &str) -> Option<&StorageValue> {
        match self {
            StorageValue::Object(map) => map.get(field),
            _ => None,
        }
    }
}

// == JSON Conversions ==
impl From<Value> for StorageValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => StorageValue::Null,
            Value::Bool(b) => StorageValue::Bool(b),
            Value::Number(n) => StorageValue::Number(n),
            Value::String(s) => StorageValue::String(s),
            Value::Array(items) => {
                StorageValue::Array(items.into_iter().map(StorageValue::from).collect())
            }
            Value::Object(map) => match decode_date(&map) {
                Some(date) => StorageValue::Date(date),
                None => StorageValue::Object(
                    map.into_iter()
                        .map(|(k, v)| (k, StorageValue::from(v)))
                        .collect(),
                ),
            },
        }
    }
}

impl From<StorageValue> for Value {
    fn from(value: StorageValue) -> Self {
        match value {
            StorageValue::Null => Value::Null,
            StorageValue::Bool(b) => Value::Bool(b),
            StorageValue::Number(n) => Value::Number(n),
            StorageValue::String(s) => Value::String(s),
            StorageValue::Date(date) => {
                let mut map = Map::new();
                map.insert(DATE_TAG.to_string(), Value::String(format_date(&date)));
                Value::Object(map)
            }
            StorageValue::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            StorageValue::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn decode_date(map: &Map<String, Value>) -> Option<DateTime<Utc>> {
    if map.len() != 1 {
        return None;
    }
    let raw = map.get(DATE_TAG)?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

// == Primitive Conversions ==
impl From<&str> for StorageValue {
    fn from(value: &str) -> Self {
        StorageValue::String(value.to_string())
    }
}

impl From<String> for StorageValue {
    fn from(value: String) -> Self {
        StorageValue::String(value)
    }
}

impl From<bool> for StorageValue {
    fn from(value: bool) -> Self {
        StorageValue::Bool(value)
    }
}

impl From<i64> for StorageValue {
    fn from(value: i64) -> Self {
        StorageValue::Number(value.into())
    }
}

impl From<i32> for StorageValue {
    fn from(value: i32) -> Self {
        StorageValue::Number(value.into())
    }
}

impl From<u64> for StorageValue {
    fn from(value: u64) -> Self {
        StorageValue::Number(value.into())
    }
}

/// Non-finite floats have no JSON form and become `Null`.
impl From<f64> for StorageValue {
    fn from(value: f64) -> Self {
        Number::from_f64(value)
            .map(StorageValue::Number)
            .unwrap_or(StorageValue::Null)
    }
}

impl From<DateTime<Utc>> for StorageValue {
    fn from(value: DateTime<Utc>) -> Self {
        StorageValue::Date(value)
    }
}

impl<T: Into<StorageValue>> From<Option<T>> for StorageValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(StorageValue::Null)
    }
}

impl<T: Into<StorageValue>> From<Vec<T>> for StorageValue {
    fn from(values: Vec<T>) -> Self {
        StorageValue::Array(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<StorageValue>> From<BTreeMap<String, T>> for StorageValue {
    fn from(map: BTreeMap<String, T>) -> Self {
        StorageValue::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}
