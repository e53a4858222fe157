//! Core Database Backend Traits
//!
//! The engine talks to storage through [`StatementExecutor`]: it hands over a
//! structured [`SelectStatement`] and receives ordered [`Row`]s back. Values
//! travel as [`DatabaseValue`].

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::DatabaseError;
use crate::query::SelectStatement;

/// Outbound statement execution
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    /// Execute a select statement and return every row in result order
    async fn fetch_all(&self, statement: &SelectStatement) -> Result<Vec<Row>, DatabaseError>;
}

/// Database value enumeration for type-safe parameter binding
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    DateTime(chrono::DateTime<chrono::Utc>),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    Json(JsonValue),
}

impl DatabaseValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Integer view of the value, if it holds an integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DatabaseValue::Int32(i) => Some(i64::from(*i)),
            DatabaseValue::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// String view of the value, if it holds a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DatabaseValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to JSON value
    pub fn to_json(&self) -> JsonValue {
        match self {
            DatabaseValue::Null => JsonValue::Null,
            DatabaseValue::Bool(b) => JsonValue::Bool(*b),
            DatabaseValue::Int32(i) => JsonValue::Number(serde_json::Number::from(*i)),
            DatabaseValue::Int64(i) => JsonValue::Number(serde_json::Number::from(*i)),
            DatabaseValue::Float32(f) => serde_json::Number::from_f64(f64::from(*f))
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            DatabaseValue::Float64(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            DatabaseValue::String(s) => JsonValue::String(s.clone()),
            DatabaseValue::Bytes(b) => JsonValue::Array(
                b.iter()
                    .map(|&x| JsonValue::Number(serde_json::Number::from(x)))
                    .collect(),
            ),
            DatabaseValue::Uuid(u) => JsonValue::String(u.to_string()),
            DatabaseValue::DateTime(dt) => JsonValue::String(dt.to_rfc3339()),
            DatabaseValue::Date(d) => JsonValue::String(d.to_string()),
            DatabaseValue::Time(t) => JsonValue::String(t.to_string()),
            DatabaseValue::Json(j) => j.clone(),
        }
    }
}

impl std::fmt::Display for DatabaseValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseValue::Null => write!(f, "NULL"),
            DatabaseValue::String(s) => write!(f, "'{}'", s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i32> for DatabaseValue {
    fn from(value: i32) -> Self {
        DatabaseValue::Int32(value)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<f64> for DatabaseValue {
    fn from(value: f64) -> Self {
        DatabaseValue::Float64(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<uuid::Uuid> for DatabaseValue {
    fn from(value: uuid::Uuid) -> Self {
        DatabaseValue::Uuid(value)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for DatabaseValue {
    fn from(value: chrono::DateTime<chrono::Utc>) -> Self {
        DatabaseValue::DateTime(value)
    }
}

impl<T: Into<DatabaseValue>> From<Option<T>> for DatabaseValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(DatabaseValue::Null, Into::into)
    }
}

/// One result row: an ordered mapping from column label to raw value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, DatabaseValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    /// Append a column; labels are expected to be unique within a row
    pub fn push(&mut self, label: impl Into<String>, value: DatabaseValue) {
        self.columns.push((label.into(), value));
    }

    /// Get a column value by label
    pub fn get(&self, label: &str) -> Option<&DatabaseValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, value)| value)
    }

    /// Get column count
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Get column labels in result order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DatabaseValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Convert row to JSON value
    pub fn to_json(&self) -> JsonValue {
        let map = self
            .columns
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        JsonValue::Object(map)
    }
}

impl FromIterator<(String, DatabaseValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, DatabaseValue)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_lookup_preserves_order() {
        let mut row = Row::new();
        row.push("t0.ID", DatabaseValue::Int32(1));
        row.push("t0.NAME", "b1".into());

        assert_eq!(row.len(), 2);
        assert_eq!(row.labels().collect::<Vec<_>>(), vec!["t0.ID", "t0.NAME"]);
        assert_eq!(row.get("t0.NAME"), Some(&DatabaseValue::String("b1".into())));
        assert_eq!(row.get("t0.MISSING"), None);
        assert_eq!(row.to_json()["t0.ID"], serde_json::json!(1));
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(DatabaseValue::from(Option::<i32>::None), DatabaseValue::Null);
        assert_eq!(DatabaseValue::from(Some(5)), DatabaseValue::Int32(5));
        assert_eq!(DatabaseValue::Int32(7).as_i64(), Some(7));
        assert_eq!(DatabaseValue::from("x").as_str(), Some("x"));
        assert_eq!(DatabaseValue::Null.to_string(), "NULL");
        assert_eq!(DatabaseValue::from("big").to_string(), "'big'");
    }
}
