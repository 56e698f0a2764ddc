//! Records crossing the accessor boundary.

use std::collections::BTreeMap;

use ledgerbase_storage::Value;
use serde::{Deserialize, Serialize};

/// A record: logical field names mapped to values.
///
/// Records are what callers hand to and receive from a record accessor.
/// Field names are the entity's *logical* names; translation to storage
/// columns, version records, and association rows happens behind the
/// accessor boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, builder style.
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Inserts or replaces a field value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Removes a field, returning its value if present.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Returns the value of a field, or `Value::Null` if absent.
    #[must_use]
    pub fn get(&self, field: &str) -> &Value {
        self.fields.get(field).unwrap_or(&Value::Null)
    }

    /// Returns `true` if the field is present, even with a null value.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Iterates over `(field, value)` pairs in field-name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let record = Record::new().set("name", "alice").set("age", 30i64);
        assert_eq!(record.get("name").as_text(), Some("alice"));
        assert_eq!(record.get("age").as_integer(), Some(30));
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn absent_field_reads_null() {
        let record = Record::new();
        assert!(record.get("missing").is_null());
        assert!(!record.contains("missing"));
    }

    #[test]
    fn contains_distinguishes_explicit_null() {
        let record = Record::new().set("note", Value::Null);
        assert!(record.contains("note"));
        assert!(record.get("note").is_null());
    }

    #[test]
    fn serde_roundtrip() {
        let record = Record::new().set("name", "r1").set("active", true);
        let json = serde_json::to_string(&record).unwrap();
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
