//! Decoded rows.

use crate::value::{FromValue, Value};
use crate::{Error, Result};

/// Key under which undeclared trailing row bytes are stored.
pub const REMAINDER_KEY: &str = "_Remainder";

/// One named value in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordField {
    /// Field identifier.
    pub id: String,
    /// Decoded value.
    pub value: Value,
    /// Annotation attached during decoding.
    pub remark: Option<String>,
}

/// A decoded row: field ids mapped to values, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<RecordField>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty record with room for `capacity` fields.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Append a field.
    pub fn push(&mut self, id: impl Into<String>, value: Value) {
        self.fields.push(RecordField {
            id: id.into(),
            value,
            remark: None,
        });
    }

    /// Append a field with a remark.
    pub fn push_with_remark(&mut self, id: impl Into<String>, value: Value, remark: impl Into<String>) {
        self.fields.push(RecordField {
            id: id.into(),
            value,
            remark: Some(remark.into()),
        });
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in insertion order.
    pub fn fields(&self) -> &[RecordField] {
        &self.fields
    }

    /// Iterate `(id, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|f| (f.id.as_str(), &f.value))
    }

    fn field(&self, id: &str) -> Option<&RecordField> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.field(id).is_some()
    }

    /// Get a field's value.
    pub fn value(&self, id: &str) -> Option<&Value> {
        self.field(id).map(|f| &f.value)
    }

    /// Get a field's remark, if it has one.
    pub fn remark(&self, id: &str) -> Option<&str> {
        self.field(id)?.remark.as_deref()
    }

    /// Get a field as a concrete type.
    ///
    /// Fails with [`Error::FieldNotFound`] if the id is absent and
    /// [`Error::TypeMismatch`] if the stored kind differs from `T`.
    /// Byte arrays and the remainder are read as [`RawBytes`](crate::RawBytes).
    pub fn get<T: FromValue>(&self, id: &str) -> Result<T> {
        let value = self
            .value(id)
            .ok_or_else(|| Error::FieldNotFound(id.to_string()))?;

        T::from_value(value).ok_or_else(|| Error::TypeMismatch {
            field: id.to_string(),
            expected: T::KIND,
            actual: value.kind(),
        })
    }

    /// Get a field as a concrete type, or `None` if absent or of another kind.
    pub fn try_get<T: FromValue>(&self, id: &str) -> Option<T> {
        self.value(id).and_then(T::from_value)
    }

    /// Borrow a string field.
    pub fn get_str(&self, id: &str) -> Option<&str> {
        self.value(id)?.as_str()
    }

    /// Borrow a bytes field.
    pub fn get_bytes(&self, id: &str) -> Option<&[u8]> {
        self.value(id)?.as_bytes()
    }

    /// Undeclared trailing bytes of the row, if any were left.
    pub fn remainder(&self) -> Option<&[u8]> {
        self.get_bytes(REMAINDER_KEY)
    }

    /// Render a field for display. Absent ids render as `Missing Key '<id>'`.
    pub fn display(&self, id: &str) -> String {
        match self.value(id) {
            Some(value) => value.to_string(),
            None => format!("Missing Key '{}'", id),
        }
    }
}

#[cfg(feature = "json")]
impl serde::Serialize for Record {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for field in &self.fields {
            map.serialize_entry(&field.id, &field.value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RawBytes, ValueKind};

    fn sample() -> Record {
        let mut record = Record::new();
        record.push("Id", Value::String("Metadata/Items/Ring".into()));
        record.push("Level", Value::Int32(12));
        record.push("Tags", Value::List(vec![Value::UInt64(3), Value::UInt64(4)]));
        record.push_with_remark(REMAINDER_KEY, Value::Bytes(vec![1, 2]), "2 trailing bytes");
        record
    }

    #[test]
    fn test_typed_access() {
        let record = sample();
        assert_eq!(record.get::<i32>("Level").unwrap(), 12);
        assert_eq!(record.get::<Vec<u64>>("Tags").unwrap(), vec![3, 4]);
        assert_eq!(record.get_str("Id"), Some("Metadata/Items/Ring"));
        assert_eq!(record.try_get::<u32>("Level"), None);
    }

    #[test]
    fn test_typed_access_errors() {
        let record = sample();
        assert!(matches!(record.get::<i32>("Nope"), Err(Error::FieldNotFound(id)) if id == "Nope"));
        match record.get::<u32>("Level") {
            Err(Error::TypeMismatch { expected, actual, .. }) => {
                assert_eq!(expected, ValueKind::UInt32);
                assert_eq!(actual, ValueKind::Int32);
            }
            other => panic!("expected type mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_remainder_as_bytes() {
        let record = sample();
        let remainder: RawBytes = record.get(REMAINDER_KEY).unwrap();
        assert_eq!(remainder.into_inner(), vec![1, 2]);
        assert!(matches!(
            record.get::<Vec<u8>>(REMAINDER_KEY),
            Err(Error::TypeMismatch { expected: ValueKind::List, actual: ValueKind::Bytes, .. })
        ));
    }

    #[test]
    fn test_display() {
        let record = sample();
        assert_eq!(record.display("Level"), "12");
        assert_eq!(record.display("Tags"), "[3,4]");
        assert_eq!(record.display("Missing"), "Missing Key 'Missing'");
    }

    #[test]
    fn test_order_and_remarks() {
        let record = sample();
        let ids: Vec<_> = record.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, ["Id", "Level", "Tags", REMAINDER_KEY]);
        assert_eq!(record.remainder(), Some(&[1u8, 2][..]));
        assert_eq!(record.remark(REMAINDER_KEY), Some("2 trailing bytes"));
        assert_eq!(record.remark("Level"), None);
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_keeps_order() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert_eq!(
            json,
            r#"{"Id":"Metadata/Items/Ring","Level":12,"Tags":[3,4],"_Remainder":[1,2]}"#
        );
    }
}
