//! Record type handed to tools through the [`Context`](crate::Context).

use serde_json::{Map, Value};

/// Errors decoding a record.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("record must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// One record (event) of the input sequence: a JSON object.
///
/// Fields are addressed with dotted paths, so `"jet.pt"` reads
/// `{"jet": {"pt": 41.2}}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a record from one line of JSON.
    pub fn from_line(line: &str) -> Result<Self, RecordError> {
        let value: Value = serde_json::from_str(line)?;
        Self::try_from(value)
    }

    /// Look up a field by dotted path.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = self.fields.get(parts.next()?)?;
        parts.try_fold(first, |value, key| value.as_object()?.get(key))
    }

    /// Look up a numeric field. Booleans read as `0.0`/`1.0`.
    pub fn number(&self, path: &str) -> Option<f64> {
        match self.get(path)? {
            Value::Number(n) => n.as_f64(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Set a top-level field.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Number of top-level fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Borrow the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl TryFrom<Value> for Record {
    type Error = RecordError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(RecordError::NotAnObject(json_kind(&other))),
        }
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dotted_lookup() {
        let record = Record::from_line(r#"{"jet": {"pt": 41.5, "eta": -1.2}, "n": 3}"#).unwrap();
        assert_eq!(record.number("jet.pt"), Some(41.5));
        assert_eq!(record.number("n"), Some(3.0));
        assert!(record.get("jet.phi").is_none());
        assert!(record.get("n.value").is_none());
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_number_conversions() {
        let record = Record::try_from(json!({"ok": true, "name": "e"})).unwrap();
        assert_eq!(record.number("ok"), Some(1.0));
        assert_eq!(record.number("name"), None);
    }

    #[test]
    fn test_rejects_non_object() {
        let err = Record::from_line("[1, 2]").unwrap_err();
        assert_eq!(err.to_string(), "record must be a JSON object, got an array");
        assert!(matches!(Record::from_line("{"), Err(RecordError::Json(_))));
    }

    #[test]
    fn test_insert() {
        let mut record = Record::new();
        assert!(record.is_empty());
        record.insert("pt", 12.5);
        assert_eq!(record.number("pt"), Some(12.5));
    }
}
