// ── Value codec ──
//
// Endpoint values are arbitrary structured data: primitives, timestamps,
// and nested records with named fields. The time-series store accepts one
// canonical JSON shape, produced by the `Canonical` capability that every
// value kind implements.
//
// Canonical form:
//   - strings, integers, floats pass through
//   - booleans become 0 / 1
//   - timestamps become the string of their rounded epoch seconds
//   - null stays null
//   - records become objects of their public fields (`__x__` fields skipped)

use chrono::{DateTime, Utc};
use serde_json::{Map, Number};
use thiserror::Error;

/// Value could not be represented in canonical form.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// JSON has no representation for NaN or infinities.
    #[error("non-finite float {0}")]
    NonFiniteFloat(f64),

    /// A nested field failed; carries the failing field name.
    #[error("field `{field}`: {source}")]
    Field {
        field: String,
        #[source]
        source: Box<CodecError>,
    },

    #[error("failed to encode canonical value: {0}")]
    Encode(String),
}

/// Conversion into the canonical serializable form.
pub trait Canonical {
    fn to_canonical(&self) -> Result<serde_json::Value, CodecError>;
}

/// Encode a value as the JSON text stored in the time-series backend.
pub fn encode(value: &(impl Canonical + ?Sized)) -> Result<String, CodecError> {
    let canonical = value.to_canonical()?;
    serde_json::to_string(&canonical).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Whole epoch seconds, rounded half up.
pub(crate) fn epoch_seconds(ts: &DateTime<Utc>) -> i64 {
    let secs = ts.timestamp();
    if ts.timestamp_subsec_nanos() >= 500_000_000 {
        secs.saturating_add(1)
    } else {
        secs
    }
}

// ── Value ────────────────────────────────────────────────────────────

/// A value read from, written to, or reported by a remote endpoint.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    List(Vec<Value>),
    Record(Record),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Structured value with named fields, in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a field.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Dunder-style names (`__x__`) are implementation details of the source
/// type, never data.
fn is_internal_field(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

// ── Canonical impls ──────────────────────────────────────────────────

impl Canonical for Value {
    fn to_canonical(&self) -> Result<serde_json::Value, CodecError> {
        match self {
            Self::Null => Ok(serde_json::Value::Null),
            Self::Bool(b) => b.to_canonical(),
            Self::Int(i) => i.to_canonical(),
            Self::UInt(u) => u.to_canonical(),
            Self::Float(f) => f.to_canonical(),
            Self::String(s) => s.to_canonical(),
            Self::Timestamp(ts) => ts.to_canonical(),
            Self::List(items) => items.to_canonical(),
            Self::Record(record) => record.to_canonical(),
        }
    }
}

impl Canonical for bool {
    fn to_canonical(&self) -> Result<serde_json::Value, CodecError> {
        Ok(serde_json::Value::from(u8::from(*self)))
    }
}

impl Canonical for i64 {
    fn to_canonical(&self) -> Result<serde_json::Value, CodecError> {
        Ok(serde_json::Value::from(*self))
    }
}

impl Canonical for u64 {
    fn to_canonical(&self) -> Result<serde_json::Value, CodecError> {
        Ok(serde_json::Value::from(*self))
    }
}

impl Canonical for f64 {
    fn to_canonical(&self) -> Result<serde_json::Value, CodecError> {
        Number::from_f64(*self)
            .map(serde_json::Value::Number)
            .ok_or(CodecError::NonFiniteFloat(*self))
    }
}

impl Canonical for str {
    fn to_canonical(&self) -> Result<serde_json::Value, CodecError> {
        Ok(serde_json::Value::String(self.to_owned()))
    }
}

impl Canonical for String {
    fn to_canonical(&self) -> Result<serde_json::Value, CodecError> {
        self.as_str().to_canonical()
    }
}

impl Canonical for DateTime<Utc> {
    fn to_canonical(&self) -> Result<serde_json::Value, CodecError> {
        Ok(serde_json::Value::String(epoch_seconds(self).to_string()))
    }
}

impl<T: Canonical> Canonical for Option<T> {
    fn to_canonical(&self) -> Result<serde_json::Value, CodecError> {
        match self {
            Some(v) => v.to_canonical(),
            None => Ok(serde_json::Value::Null),
        }
    }
}

impl<T: Canonical> Canonical for [T] {
    fn to_canonical(&self) -> Result<serde_json::Value, CodecError> {
        self.iter()
            .enumerate()
            .map(|(i, item)| {
                item.to_canonical().map_err(|e| CodecError::Field {
                    field: i.to_string(),
                    source: Box::new(e),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(serde_json::Value::Array)
    }
}

impl<T: Canonical> Canonical for Vec<T> {
    fn to_canonical(&self) -> Result<serde_json::Value, CodecError> {
        self.as_slice().to_canonical()
    }
}

impl Canonical for Record {
    fn to_canonical(&self) -> Result<serde_json::Value, CodecError> {
        let mut out = Map::new();
        for (name, value) in self.fields().filter(|(n, _)| !is_internal_field(n)) {
            let converted = value.to_canonical().map_err(|e| CodecError::Field {
                field: name.to_owned(),
                source: Box::new(e),
            })?;
            out.insert(name.to_owned(), converted);
        }
        Ok(serde_json::Value::Object(out))
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Self::Record(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Backend write requests arrive as JSON; objects become records.
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Self::UInt(u)
                } else {
                    n.as_f64().map_or(Self::Null, Self::Float)
                }
            }
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => Self::Record(
                map.into_iter()
                    .fold(Record::new(), |record, (k, v)| record.with(k, Self::from(v))),
            ),
        }
    }
}
