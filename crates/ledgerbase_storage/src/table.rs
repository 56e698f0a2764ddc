//! Table declarations and equality predicates.

use serde::{Deserialize, Serialize};

use crate::row::Row;
use crate::value::Value;

/// Declares a table: its name and the columns it may hold.
///
/// The substrate treats table layout as given (physical schema is an
/// external concern); a spec exists so backends can reject writes and
/// predicates addressing columns that were never declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    name: String,
    columns: Vec<String>,
}

impl TableSpec {
    /// Creates a table spec from a name and column list.
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared columns.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns `true` if the column is declared.
    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// An equality predicate: the conjunction of `column = value` terms.
///
/// This is the entire query language of the substrate. An empty predicate
/// matches every row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    terms: Vec<(String, Value)>,
}

impl Predicate {
    /// Creates an empty predicate (matches all rows).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `column = value` term.
    #[must_use]
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.terms.push((column.into(), value.into()));
        self
    }

    /// Returns the predicate's terms.
    #[must_use]
    pub fn terms(&self) -> &[(String, Value)] {
        &self.terms
    }

    /// Returns `true` if the row satisfies every term.
    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        self.terms
            .iter()
            .all(|(column, value)| row.get(column) == value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::RowId;

    fn row(name: &str, active: bool) -> Row {
        Row::new(
            RowId::new(1),
            [
                ("name".to_string(), Value::from(name)),
                ("is_active".to_string(), Value::from(active)),
            ]
            .into(),
        )
    }

    #[test]
    fn empty_predicate_matches_all() {
        assert!(Predicate::new().matches(&row("a", true)));
    }

    #[test]
    fn single_term_match() {
        let p = Predicate::new().eq("name", "a");
        assert!(p.matches(&row("a", true)));
        assert!(!p.matches(&row("b", true)));
    }

    #[test]
    fn conjunction_requires_all_terms() {
        let p = Predicate::new().eq("name", "a").eq("is_active", true);
        assert!(p.matches(&row("a", true)));
        assert!(!p.matches(&row("a", false)));
    }

    #[test]
    fn null_term_matches_missing_column() {
        let p = Predicate::new().eq("missing", Value::Null);
        assert!(p.matches(&row("a", true)));
    }

    #[test]
    fn table_spec_columns() {
        let spec = TableSpec::new("accounts", ["name", "balance"]);
        assert!(spec.has_column("balance"));
        assert!(!spec.has_column("rate"));
        assert_eq!(spec.name(), "accounts");
    }
}
