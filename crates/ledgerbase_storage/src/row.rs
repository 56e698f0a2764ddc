//! Rows and row identifiers.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Opaque storage identifier for a row.
///
/// Row ids are backend-allocated, monotonically increasing, and never
/// reused. They are an internal storage concern: the mapping layer above
/// exposes natural keys to its callers, never row ids.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct RowId(pub u64);

impl RowId {
    /// Creates a row id from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row:{}", self.0)
    }
}

/// A materialized row: its id plus column values.
///
/// Columns not present in the map read as [`Value::Null`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    id: RowId,
    values: BTreeMap<String, Value>,
}

impl Row {
    /// Creates a row from an id and column values.
    #[must_use]
    pub fn new(id: RowId, values: BTreeMap<String, Value>) -> Self {
        Self { id, values }
    }

    /// Returns the row's storage id.
    #[must_use]
    pub fn id(&self) -> RowId {
        self.id
    }

    /// Returns the value of a column, or `Value::Null` if absent.
    #[must_use]
    pub fn get(&self, column: &str) -> &Value {
        self.values.get(column).unwrap_or(&Value::Null)
    }

    /// Returns `true` if the column has a non-null value.
    #[must_use]
    pub fn has(&self, column: &str) -> bool {
        !self.get(column).is_null()
    }

    /// Iterates over `(column, value)` pairs in column order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Consumes the row, returning its column map.
    #[must_use]
    pub fn into_values(self) -> BTreeMap<String, Value> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> Row {
        Row::new(
            RowId::new(3),
            [
                ("name".to_string(), Value::from("alice")),
                ("age".to_string(), Value::from(30i64)),
            ]
            .into(),
        )
    }

    #[test]
    fn get_returns_column_value() {
        let row = sample_row();
        assert_eq!(row.get("name").as_text(), Some("alice"));
        assert_eq!(row.get("age").as_integer(), Some(30));
    }

    #[test]
    fn missing_column_reads_null() {
        let row = sample_row();
        assert!(row.get("missing").is_null());
        assert!(!row.has("missing"));
    }

    #[test]
    fn row_id_ordering() {
        assert!(RowId::new(1) < RowId::new(2));
    }

    #[test]
    fn row_id_display() {
        assert_eq!(format!("{}", RowId::new(42)), "row:42");
    }
}
