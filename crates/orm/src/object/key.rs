//! Grouping keys
//!
//! A [`GroupingKey`] is an ordered tuple of column values. It identifies an
//! object inside the identity map (primary key) and is used to re-associate
//! prefetched children with their parents (join columns). Equality is
//! position-wise on normalized values: `Int32(1)` and `Int64(1)` are equal,
//! strings compare by content.

use std::fmt;

use crate::backends::DatabaseValue;

/// Normalized, hashable form of a non-NULL column value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    Bool(bool),
    Int(i64),
    /// Non-integral float, compared by bit pattern
    Float(u64),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    DateTime(chrono::DateTime<chrono::Utc>),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    Json(String),
}

impl KeyValue {
    /// Normalize a raw value; NULL has no key form
    pub fn from_value(value: &DatabaseValue) -> Option<Self> {
        let key = match value {
            DatabaseValue::Null => return None,
            DatabaseValue::Bool(b) => KeyValue::Bool(*b),
            DatabaseValue::Int32(i) => KeyValue::Int(i64::from(*i)),
            DatabaseValue::Int64(i) => KeyValue::Int(*i),
            DatabaseValue::Float32(f) => Self::from_float(f64::from(*f)),
            DatabaseValue::Float64(f) => Self::from_float(*f),
            DatabaseValue::String(s) => KeyValue::Text(s.clone()),
            DatabaseValue::Bytes(b) => KeyValue::Bytes(b.clone()),
            DatabaseValue::Uuid(u) => KeyValue::Uuid(*u),
            DatabaseValue::DateTime(dt) => KeyValue::DateTime(*dt),
            DatabaseValue::Date(d) => KeyValue::Date(*d),
            DatabaseValue::Time(t) => KeyValue::Time(*t),
            DatabaseValue::Json(j) => KeyValue::Json(j.to_string()),
        };
        Some(key)
    }

    /// Raw value for use as a statement parameter
    pub fn to_value(&self) -> DatabaseValue {
        match self {
            KeyValue::Bool(b) => DatabaseValue::Bool(*b),
            KeyValue::Int(i) => DatabaseValue::Int64(*i),
            KeyValue::Float(bits) => DatabaseValue::Float64(f64::from_bits(*bits)),
            KeyValue::Text(s) => DatabaseValue::String(s.clone()),
            KeyValue::Bytes(b) => DatabaseValue::Bytes(b.clone()),
            KeyValue::Uuid(u) => DatabaseValue::Uuid(*u),
            KeyValue::DateTime(dt) => DatabaseValue::DateTime(*dt),
            KeyValue::Date(d) => DatabaseValue::Date(*d),
            KeyValue::Time(t) => DatabaseValue::Time(*t),
            KeyValue::Json(j) => serde_json::from_str(j)
                .map(DatabaseValue::Json)
                .unwrap_or_else(|_| DatabaseValue::String(j.clone())),
        }
    }

    fn from_float(f: f64) -> Self {
        if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
            KeyValue::Int(f as i64)
        } else {
            KeyValue::Float(f.to_bits())
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Bool(b) => write!(f, "{}", b),
            KeyValue::Int(i) => write!(f, "{}", i),
            KeyValue::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            KeyValue::Text(s) => write!(f, "'{}'", s),
            KeyValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            KeyValue::Uuid(u) => write!(f, "{}", u),
            KeyValue::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            KeyValue::Date(d) => write!(f, "{}", d),
            KeyValue::Time(t) => write!(f, "{}", t),
            KeyValue::Json(j) => write!(f, "{}", j),
        }
    }
}

/// Ordered tuple of key values
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupingKey(Vec<KeyValue>);

/// Primary key of an object; same shape as a grouping key
pub type ObjectKey = GroupingKey;

/// How a tuple with NULLs in it was classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyExtraction {
    /// Every position is non-NULL
    Complete(GroupingKey),
    /// Every position is NULL
    Absent,
    /// Some positions are NULL, some are not
    Partial,
}

impl GroupingKey {
    pub fn new(values: Vec<KeyValue>) -> Self {
        Self(values)
    }

    /// Build a key from raw values. Returns `None` if any value is NULL, which
    /// means "no related row" rather than a zero-valued key.
    pub fn from_values<'a, I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a DatabaseValue>,
    {
        match Self::extract(values) {
            KeyExtraction::Complete(key) => Some(key),
            KeyExtraction::Absent | KeyExtraction::Partial => None,
        }
    }

    /// Classify a tuple of raw values by its NULL positions.
    pub fn extract<'a, I>(values: I) -> KeyExtraction
    where
        I: IntoIterator<Item = &'a DatabaseValue>,
    {
        let mut parts = Vec::new();
        let mut nulls = 0;
        for value in values {
            match KeyValue::from_value(value) {
                Some(part) => parts.push(part),
                None => nulls += 1,
            }
        }

        match (parts.is_empty(), nulls) {
            (_, 0) if !parts.is_empty() => KeyExtraction::Complete(GroupingKey(parts)),
            (true, _) => KeyExtraction::Absent,
            _ => KeyExtraction::Partial,
        }
    }

    pub fn values(&self) -> &[KeyValue] {
        &self.0
    }

    /// Key as statement parameters, one per position
    pub fn to_values(&self) -> Vec<DatabaseValue> {
        self.0.iter().map(KeyValue::to_value).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for GroupingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, ")")
    }
}

impl From<i64> for GroupingKey {
    fn from(value: i64) -> Self {
        GroupingKey(vec![KeyValue::Int(value)])
    }
}

impl From<i32> for GroupingKey {
    fn from(value: i32) -> Self {
        GroupingKey(vec![KeyValue::Int(i64::from(value))])
    }
}

impl From<&str> for GroupingKey {
    fn from(value: &str) -> Self {
        GroupingKey(vec![KeyValue::Text(value.to_string())])
    }
}
