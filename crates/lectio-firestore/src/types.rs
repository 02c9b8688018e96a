//! Firestore REST API wire types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Firestore document value types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    IntegerValue(String), // Firestore sends integers as strings
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayValue {
    pub values: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapValue {
    pub fields: Option<HashMap<String, Value>>,
}

/// Firestore document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name
    pub name: Option<String>,
    /// Document fields
    pub fields: Option<HashMap<String, Value>>,
    /// Create time
    pub create_time: Option<String>,
    /// Update time
    pub update_time: Option<String>,
}

impl Document {
    /// Create a new document with the given fields.
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self {
            name: None,
            fields: Some(fields),
            create_time: None,
            update_time: None,
        }
    }

    /// Read a typed field, if present and of the right shape.
    pub fn field<T: FromFirestoreValue>(&self, name: &str) -> Option<T> {
        self.fields
            .as_ref()
            .and_then(|f| f.get(name))
            .and_then(T::from_firestore_value)
    }
}

/// Document field mask for partial updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMask {
    pub field_paths: Vec<String>,
}

/// Precondition for a write operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Precondition {
    /// Document must (not) exist.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,

    /// Document must have this update time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Precondition {
    /// The document must not exist yet.
    pub fn must_not_exist() -> Self {
        Self { exists: Some(false), update_time: None }
    }

    /// The document must still carry this server-side update time.
    pub fn update_time(time: impl Into<String>) -> Self {
        Self { exists: None, update_time: Some(time.into()) }
    }
}

/// A single write operation in an atomic commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Write {
    /// Update or insert a document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<Document>,

    /// Field mask for partial updates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_mask: Option<DocumentMask>,

    /// Precondition for the write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_document: Option<Precondition>,
}

impl Write {
    /// Insert a new document at `name`, failing if it already exists.
    pub fn create(name: String, fields: HashMap<String, Value>) -> Self {
        Self {
            update: Some(Document { name: Some(name), fields: Some(fields), create_time: None, update_time: None }),
            update_mask: None,
            current_document: Some(Precondition::must_not_exist()),
        }
    }

    /// Patch the listed fields of an existing document, guarded by its
    /// last-seen update time.
    pub fn patch_with_update_time(
        name: String,
        fields: HashMap<String, Value>,
        mask: Vec<String>,
        update_time: impl Into<String>,
    ) -> Self {
        Self {
            update: Some(Document { name: Some(name), fields: Some(fields), create_time: None, update_time: None }),
            update_mask: Some(DocumentMask { field_paths: mask }),
            current_document: Some(Precondition::update_time(update_time)),
        }
    }
}

/// Atomic commit request (all writes apply or none do).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    pub writes: Vec<Write>,
}

/// Result of a single write in a commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    /// Update time of the written document.
    pub update_time: Option<String>,
}

/// Commit response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    /// Results for each write, in order.
    pub write_results: Option<Vec<WriteResult>>,
    /// Server commit time.
    pub commit_time: Option<String>,
}

/// Convert a Rust value to a Firestore Value.
pub trait ToFirestoreValue {
    fn to_firestore_value(&self) -> Value;
}

impl ToFirestoreValue for String {
    fn to_firestore_value(&self) -> Value {
        Value::StringValue(self.clone())
    }
}

impl ToFirestoreValue for &str {
    fn to_firestore_value(&self) -> Value {
        Value::StringValue(self.to_string())
    }
}

impl ToFirestoreValue for i64 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue(self.to_string())
    }
}

impl ToFirestoreValue for u32 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue((*self as i64).to_string())
    }
}

impl ToFirestoreValue for f64 {
    fn to_firestore_value(&self) -> Value {
        Value::DoubleValue(*self)
    }
}

impl ToFirestoreValue for bool {
    fn to_firestore_value(&self) -> Value {
        Value::BooleanValue(*self)
    }
}

impl ToFirestoreValue for DateTime<Utc> {
    fn to_firestore_value(&self) -> Value {
        Value::TimestampValue(self.to_rfc3339())
    }
}

impl<T: ToFirestoreValue> ToFirestoreValue for Option<T> {
    fn to_firestore_value(&self) -> Value {
        match self {
            Some(v) => v.to_firestore_value(),
            None => Value::NullValue(()),
        }
    }
}

/// Convert a Firestore Value to a Rust type.
pub trait FromFirestoreValue: Sized {
    fn from_firestore_value(value: &Value) -> Option<Self>;
}

impl FromFirestoreValue for String {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::StringValue(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromFirestoreValue for i64 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntegerValue(s) => s.parse().ok(),
            Value::DoubleValue(f) => Some(*f as i64),
            _ => None,
        }
    }
}

impl FromFirestoreValue for u32 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntegerValue(s) => s.parse().ok(),
            Value::DoubleValue(f) => Some(*f as u32),
            _ => None,
        }
    }
}

impl FromFirestoreValue for bool {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::BooleanValue(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromFirestoreValue for DateTime<Utc> {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::TimestampValue(s) => DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.into()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_round_trip() {
        let v = 42i64.to_firestore_value();
        assert_eq!(i64::from_firestore_value(&v), Some(42));
    }

    #[test]
    fn test_create_write_has_exists_precondition() {
        let w = Write::create("projects/p/databases/d/documents/users/u".into(), HashMap::new());
        assert_eq!(w.current_document.unwrap().exists, Some(false));
    }

    #[test]
    fn test_patch_write_carries_mask_and_time() {
        let mut fields = HashMap::new();
        fields.insert("token_balance".to_string(), 5i64.to_firestore_value());
        let w = Write::patch_with_update_time(
            "doc".into(),
            fields,
            vec!["token_balance".to_string()],
            "2025-01-01T00:00:00Z",
        );
        assert_eq!(w.update_mask.unwrap().field_paths, vec!["token_balance"]);
        assert_eq!(
            w.current_document.unwrap().update_time.as_deref(),
            Some("2025-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_document_typed_field() {
        let mut fields = HashMap::new();
        fields.insert("tier".to_string(), "student".to_firestore_value());
        let doc = Document::new(fields);
        assert_eq!(doc.field::<String>("tier").as_deref(), Some("student"));
        assert_eq!(doc.field::<i64>("tier"), None);
        assert_eq!(doc.field::<String>("missing"), None);
    }
}
