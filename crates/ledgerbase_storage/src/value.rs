//! Dynamic column value type.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::row::RowId;

/// A dynamic value stored in a table column.
///
/// This is the full set of scalar types the substrate supports. Monetary
/// amounts and rates are [`Decimal`], never floats. `Array` never reaches a
/// backend column; it exists so that record-level fields (many-to-many key
/// lists) can share this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// Null / absent value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (full i64 range).
    Integer(i64),
    /// Exact decimal number.
    Decimal(Decimal),
    /// Text string (UTF-8).
    Text(String),
    /// Point in time (UTC).
    Timestamp(DateTime<Utc>),
    /// Reference to another row's storage id.
    Id(RowId),
    /// List of values.
    Array(Vec<Value>),
}

impl Value {
    /// Returns `true` if this is `Value::Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the boolean value, if this is a `Bool`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer value, if this is an `Integer`.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the decimal value, if this is a `Decimal`.
    #[must_use]
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the text value, if this is a `Text`.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the timestamp value, if this is a `Timestamp`.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Returns the row id, if this is an `Id`.
    #[must_use]
    pub fn as_id(&self) -> Option<RowId> {
        match self {
            Value::Id(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the element list, if this is an `Array`.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Timestamp(t)
    }
}

impl From<RowId> for Value {
    fn from(id: RowId) -> Self {
        Value::Id(id)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_match_variant() {
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from(42i64).as_integer(), Some(42));
        assert_eq!(Value::from("hello").as_text(), Some("hello"));
        assert_eq!(Value::from(RowId::new(7)).as_id(), Some(RowId::new(7)));
        assert!(Value::Null.is_null());
    }

    #[test]
    fn accessors_reject_other_variants() {
        assert_eq!(Value::from("text").as_integer(), None);
        assert_eq!(Value::from(1i64).as_text(), None);
        assert_eq!(Value::Null.as_bool(), None);
    }

    #[test]
    fn decimal_roundtrip() {
        let d = Decimal::from(100);
        assert_eq!(Value::from(d).as_decimal(), Some(d));
    }

    #[test]
    fn option_conversion() {
        let some: Value = Some(5i64).into();
        let none: Value = Option::<i64>::None.into();
        assert_eq!(some, Value::Integer(5));
        assert!(none.is_null());
    }

    #[test]
    fn array_holds_elements() {
        let v = Value::from(vec![Value::from("a"), Value::from("b")]);
        assert_eq!(v.as_array().map(<[Value]>::len), Some(2));
    }

    #[test]
    fn serde_roundtrip() {
        let v = Value::from(Decimal::from(250));
        let json = serde_json::to_string(&v).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
