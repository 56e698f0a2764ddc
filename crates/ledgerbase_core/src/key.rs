//! Natural keys.

use std::fmt;

use ledgerbase_storage::Value;
use serde::{Deserialize, Serialize};

/// The natural key of an entity: one value per declared key field, in
/// declaration order.
///
/// Natural keys are the externally meaningful identity of an entity, as
/// opposed to internal storage row ids, which never cross the accessor
/// boundary. Most entities have single-value keys; an exchange is keyed by
/// its (source account, target account) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key(Vec<Value>);

impl Key {
    /// Creates a single-field key.
    pub fn single(value: impl Into<Value>) -> Self {
        Self(vec![value.into()])
    }

    /// Creates a composite key from values in key-field order.
    pub fn composite<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self(values.into_iter().map(Into::into).collect())
    }

    /// Returns the key's values in key-field order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Returns the number of key values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the key holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        if self.0.len() > 1 {
            write!(f, "(")?;
        }
        for value in &self.0 {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            match value {
                Value::Text(s) => write!(f, "{s}")?,
                other => write!(f, "{other:?}")?,
            }
        }
        if self.0.len() > 1 {
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::single(s)
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self::single(s)
    }
}

impl From<Value> for Key {
    fn from(value: Value) -> Self {
        Self(vec![value])
    }
}
