//! Versioned attribute groups.
//!
//! A versioned attribute group stores designated logical fields of an
//! entity in an auxiliary table, one row per version, with exactly one row
//! flagged active per parent. Writes never mutate a version's content:
//! they retire the active row and insert a successor. Old rows stay in
//! storage for audit and for operations that captured them.

use std::collections::BTreeMap;

use ledgerbase_storage::{Predicate, Row, RowId, StoreBackend, Transaction, Value};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::schema::{VersionGroup, ACTIVE_COLUMN, EFFECTIVE_TIME_COLUMN, EXPIRY_TIME_COLUMN};

/// Identity of a version row, captured at the start of an operation.
///
/// An operation that reads versioned fields resolves "current active" once,
/// keeps the resulting ref, and reads through it for its whole duration. A
/// concurrent transition deactivates the row but never deletes it, so a
/// captured ref keeps resolving to the same values the operation started
/// from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRef {
    row: RowId,
}

impl VersionRef {
    /// Creates a ref from a version row id.
    #[must_use]
    pub(crate) const fn new(row: RowId) -> Self {
        Self { row }
    }

    /// Returns the underlying version row id.
    #[must_use]
    pub fn row_id(&self) -> RowId {
        self.row
    }
}

/// Executes version-group reads and transitions against a backend.
pub(crate) struct VersionEngine<'a> {
    backend: &'a dyn StoreBackend,
    clock: &'a dyn Clock,
}

impl<'a> VersionEngine<'a> {
    pub(crate) fn new(backend: &'a dyn StoreBackend, clock: &'a dyn Clock) -> Self {
        Self { backend, clock }
    }

    /// Resolves the active version row for a parent.
    ///
    /// Returns `None` if no version was ever created. Finding more than one
    /// active row means a broken invariant and fails loudly.
    pub(crate) fn active_row(
        &self,
        txn: &Transaction,
        group: &VersionGroup,
        parent: RowId,
    ) -> CoreResult<Option<Row>> {
        let predicate = Predicate::new()
            .eq(group.parent_column.as_str(), parent)
            .eq(ACTIVE_COLUMN, true);
        let mut rows = self.backend.select(txn, &group.table, &predicate)?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            n => {
                warn!(
                    table = %group.table,
                    parent = %parent,
                    active = n,
                    "multiple active version rows"
                );
                Err(CoreError::invariant_violation(format!(
                    "{n} active version rows in {} for parent {parent}",
                    group.table
                )))
            }
        }
    }

    /// Captures the identity of the active version, if one exists.
    pub(crate) fn capture(
        &self,
        txn: &Transaction,
        group: &VersionGroup,
        parent: RowId,
    ) -> CoreResult<Option<VersionRef>> {
        Ok(self
            .active_row(txn, group, parent)?
            .map(|row| VersionRef::new(row.id())))
    }

    /// Reads a previously captured version row.
    ///
    /// Version rows are never deleted, so a captured ref that fails to
    /// resolve indicates corrupted state.
    pub(crate) fn row_for(
        &self,
        txn: &Transaction,
        group: &VersionGroup,
        vref: VersionRef,
    ) -> CoreResult<Row> {
        self.backend
            .fetch(txn, &group.table, vref.row_id())?
            .ok_or_else(|| {
                CoreError::invariant_violation(format!(
                    "captured version row {} missing from {}",
                    vref.row_id(),
                    group.table
                ))
            })
    }

    /// Returns all version rows of a parent in creation order, the audit
    /// history of the group.
    pub(crate) fn history(
        &self,
        txn: &Transaction,
        group: &VersionGroup,
        parent: RowId,
    ) -> CoreResult<Vec<Row>> {
        let predicate = Predicate::new().eq(group.parent_column.as_str(), parent);
        let mut rows = self.backend.select(txn, &group.table, &predicate)?;
        rows.sort_by_key(Row::id);
        Ok(rows)
    }

    /// Performs one version transition for a parent.
    ///
    /// Creates the successor row by copying every value column from the
    /// prior active row - except `effective_time`, which is always stamped
    /// fresh from the clock, and `expiry_time`, which starts null - then
    /// applies the caller's `overrides`, deactivates the prior row, and
    /// activates the successor. The whole sequence lives in the caller's
    /// transaction, so concurrent readers observe it atomically.
    pub(crate) fn transition(
        &self,
        txn: &mut Transaction,
        group: &VersionGroup,
        value_columns: &[String],
        parent: RowId,
        overrides: BTreeMap<String, Value>,
    ) -> CoreResult<RowId> {
        let prior = self.active_row(txn, group, parent)?;

        let mut values: BTreeMap<String, Value> = BTreeMap::new();
        if let Some(prior_row) = &prior {
            for column in value_columns {
                if column == EFFECTIVE_TIME_COLUMN || column == EXPIRY_TIME_COLUMN {
                    continue;
                }
                values.insert(column.clone(), prior_row.get(column).clone());
            }
        }
        values.insert(
            EFFECTIVE_TIME_COLUMN.to_string(),
            Value::from(self.clock.now()),
        );
        values.extend(overrides);
        values.insert(group.parent_column.clone(), Value::from(parent));
        values.insert(ACTIVE_COLUMN.to_string(), Value::from(true));

        if let Some(prior_row) = &prior {
            self.backend.update(
                txn,
                &group.table,
                prior_row.id(),
                [(ACTIVE_COLUMN.to_string(), Value::from(false))].into(),
            )?;
        }
        let successor = self.backend.insert(txn, &group.table, values)?;

        debug!(
            table = %group.table,
            parent = %parent,
            prior = ?prior.as_ref().map(Row::id),
            successor = %successor,
            "version transition"
        );
        Ok(successor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{Duration, TimeZone, Utc};
    use ledgerbase_storage::{MemoryBackend, TableSpec, TxnMode};

    fn group() -> VersionGroup {
        VersionGroup {
            table: "limits".to_string(),
            parent_column: "account_id".to_string(),
        }
    }

    fn value_columns() -> Vec<String> {
        vec![
            "upper".to_string(),
            "lower".to_string(),
            EFFECTIVE_TIME_COLUMN.to_string(),
            EXPIRY_TIME_COLUMN.to_string(),
        ]
    }

    fn backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend
            .create_table(TableSpec::new(
                "limits",
                [
                    "account_id",
                    "upper",
                    "lower",
                    ACTIVE_COLUMN,
                    EFFECTIVE_TIME_COLUMN,
                    EXPIRY_TIME_COLUMN,
                ],
            ))
            .unwrap();
        backend
    }

    fn clock() -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap())
    }

    #[test]
    fn first_transition_creates_active_row() {
        let backend = backend();
        let clock = clock();
        let engine = VersionEngine::new(&backend, &clock);
        let parent = RowId::new(10);

        let mut txn = backend.begin(TxnMode::Write).unwrap();
        assert!(engine.active_row(&txn, &group(), parent).unwrap().is_none());

        engine
            .transition(
                &mut txn,
                &group(),
                &value_columns(),
                parent,
                [("upper".to_string(), Value::from(100i64))].into(),
            )
            .unwrap();
        backend.commit(&mut txn).unwrap();

        let txn = backend.begin(TxnMode::Read).unwrap();
        let active = engine.active_row(&txn, &group(), parent).unwrap().unwrap();
        assert_eq!(active.get("upper").as_integer(), Some(100));
        assert_eq!(active.get(ACTIVE_COLUMN).as_bool(), Some(true));
        assert_eq!(
            active.get(EFFECTIVE_TIME_COLUMN).as_timestamp(),
            Some(clock.now())
        );
        assert!(active.get(EXPIRY_TIME_COLUMN).is_null());
    }

    #[test]
    fn transition_copies_values_forward() {
        let backend = backend();
        let clock = clock();
        let engine = VersionEngine::new(&backend, &clock);
        let parent = RowId::new(10);

        let mut txn = backend.begin(TxnMode::Write).unwrap();
        engine
            .transition(
                &mut txn,
                &group(),
                &value_columns(),
                parent,
                [
                    ("upper".to_string(), Value::from(100i64)),
                    ("lower".to_string(), Value::from(-50i64)),
                ]
                .into(),
            )
            .unwrap();
        backend.commit(&mut txn).unwrap();

        clock.advance(Duration::seconds(5));

        let mut txn = backend.begin(TxnMode::Write).unwrap();
        engine
            .transition(
                &mut txn,
                &group(),
                &value_columns(),
                parent,
                [("upper".to_string(), Value::from(200i64))].into(),
            )
            .unwrap();
        backend.commit(&mut txn).unwrap();

        let txn = backend.begin(TxnMode::Read).unwrap();
        let active = engine.active_row(&txn, &group(), parent).unwrap().unwrap();
        assert_eq!(active.get("upper").as_integer(), Some(200));
        assert_eq!(active.get("lower").as_integer(), Some(-50), "copied forward");
        assert_eq!(
            active.get(EFFECTIVE_TIME_COLUMN).as_timestamp(),
            Some(clock.now()),
            "effective time is fresh, not copied"
        );
    }

    #[test]
    fn transition_deactivates_prior_in_same_txn() {
        let backend = backend();
        let clock = clock();
        let engine = VersionEngine::new(&backend, &clock);
        let parent = RowId::new(10);

        let mut txn = backend.begin(TxnMode::Write).unwrap();
        let first = engine
            .transition(&mut txn, &group(), &value_columns(), parent, BTreeMap::new())
            .unwrap();
        engine
            .transition(&mut txn, &group(), &value_columns(), parent, BTreeMap::new())
            .unwrap();
        backend.commit(&mut txn).unwrap();

        let txn = backend.begin(TxnMode::Read).unwrap();
        let history = engine.history(&txn, &group(), parent).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id(), first);
        assert_eq!(history[0].get(ACTIVE_COLUMN).as_bool(), Some(false));
        assert_eq!(history[1].get(ACTIVE_COLUMN).as_bool(), Some(true));
    }

    #[test]
    fn capture_survives_supersede() {
        let backend = backend();
        let clock = clock();
        let engine = VersionEngine::new(&backend, &clock);
        let parent = RowId::new(10);

        let mut txn = backend.begin(TxnMode::Write).unwrap();
        engine
            .transition(
                &mut txn,
                &group(),
                &value_columns(),
                parent,
                [("upper".to_string(), Value::from(100i64))].into(),
            )
            .unwrap();
        backend.commit(&mut txn).unwrap();

        // An in-flight operation captures the active version.
        let read_txn = backend.begin(TxnMode::Read).unwrap();
        let captured = engine
            .capture(&read_txn, &group(), parent)
            .unwrap()
            .unwrap();

        // A concurrent writer supersedes it.
        let mut txn = backend.begin(TxnMode::Write).unwrap();
        engine
            .transition(
                &mut txn,
                &group(),
                &value_columns(),
                parent,
                [("upper".to_string(), Value::from(999i64))].into(),
            )
            .unwrap();
        backend.commit(&mut txn).unwrap();

        // The captured row still resolves with the values the operation
        // started from.
        let row = engine.row_for(&read_txn, &group(), captured).unwrap();
        assert_eq!(row.get("upper").as_integer(), Some(100));
        assert_eq!(row.get(ACTIVE_COLUMN).as_bool(), Some(false));
    }

    #[test]
    fn two_active_rows_fail_loudly() {
        let backend = backend();
        let clock = clock();
        let engine = VersionEngine::new(&backend, &clock);
        let parent = RowId::new(10);

        // Corrupt the table directly: two active rows for one parent.
        let mut txn = backend.begin(TxnMode::Write).unwrap();
        for _ in 0..2 {
            backend
                .insert(
                    &mut txn,
                    "limits",
                    [
                        ("account_id".to_string(), Value::from(parent)),
                        (ACTIVE_COLUMN.to_string(), Value::from(true)),
                    ]
                    .into(),
                )
                .unwrap();
        }
        backend.commit(&mut txn).unwrap();

        let txn = backend.begin(TxnMode::Read).unwrap();
        let result = engine.active_row(&txn, &group(), parent);
        assert!(matches!(result, Err(CoreError::InvariantViolation { .. })));
    }

    #[test]
    fn history_is_per_parent() {
        let backend = backend();
        let clock = clock();
        let engine = VersionEngine::new(&backend, &clock);

        let mut txn = backend.begin(TxnMode::Write).unwrap();
        engine
            .transition(
                &mut txn,
                &group(),
                &value_columns(),
                RowId::new(1),
                BTreeMap::new(),
            )
            .unwrap();
        engine
            .transition(
                &mut txn,
                &group(),
                &value_columns(),
                RowId::new(2),
                BTreeMap::new(),
            )
            .unwrap();
        backend.commit(&mut txn).unwrap();

        let txn = backend.begin(TxnMode::Read).unwrap();
        assert_eq!(
            engine.history(&txn, &group(), RowId::new(1)).unwrap().len(),
            1
        );
        assert_eq!(
            engine.history(&txn, &group(), RowId::new(2)).unwrap().len(),
            1
        );
    }
}
