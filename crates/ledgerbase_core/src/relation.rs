//! Derived relations.
//!
//! A derived relation is a versioned association: the "value" of the group
//! is not a scalar but a pointer to another entity (which exchange rate
//! currently prices an exchange). Reassignment follows the same
//! deactivate-old / insert-new pattern as scalar version groups; old
//! association rows stay behind as the assignment history.

use ledgerbase_storage::{Predicate, Row, RowId, StoreBackend, Transaction, Value};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::schema::{DerivedRelation, ACTIVE_COLUMN, EFFECTIVE_TIME_COLUMN};

/// Executes derived-relation reads and reassignments against a backend.
pub(crate) struct RelationEngine<'a> {
    backend: &'a dyn StoreBackend,
    clock: &'a dyn Clock,
}

impl<'a> RelationEngine<'a> {
    pub(crate) fn new(backend: &'a dyn StoreBackend, clock: &'a dyn Clock) -> Self {
        Self { backend, clock }
    }

    /// Resolves the active association row for a parent, if any.
    pub(crate) fn active_row(
        &self,
        txn: &Transaction,
        relation: &DerivedRelation,
        parent: RowId,
    ) -> CoreResult<Option<Row>> {
        let predicate = Predicate::new()
            .eq(relation.parent_column.as_str(), parent)
            .eq(ACTIVE_COLUMN, true);
        let mut rows = self.backend.select(txn, &relation.table, &predicate)?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            n => {
                warn!(
                    table = %relation.table,
                    parent = %parent,
                    active = n,
                    "multiple active association rows"
                );
                Err(CoreError::invariant_violation(format!(
                    "{n} active association rows in {} for parent {parent}",
                    relation.table
                )))
            }
        }
    }

    /// Returns the row id of the currently assigned target, if any.
    pub(crate) fn current_target(
        &self,
        txn: &Transaction,
        relation: &DerivedRelation,
        parent: RowId,
    ) -> CoreResult<Option<RowId>> {
        let Some(row) = self.active_row(txn, relation, parent)? else {
            return Ok(None);
        };
        row.get(&relation.target_column)
            .as_id()
            .map(Some)
            .ok_or_else(|| {
                CoreError::invariant_violation(format!(
                    "association row {} in {} has no target id",
                    row.id(),
                    relation.table
                ))
            })
    }

    /// Reassigns the relation to a new target.
    ///
    /// Deactivates the current association row if one exists and inserts a
    /// new active row pointing at `target`, stamped with a fresh effective
    /// time, all in the caller's transaction.
    pub(crate) fn reassign(
        &self,
        txn: &mut Transaction,
        relation: &DerivedRelation,
        parent: RowId,
        target: RowId,
    ) -> CoreResult<RowId> {
        let prior = self.active_row(txn, relation, parent)?;
        if let Some(prior_row) = &prior {
            self.backend.update(
                txn,
                &relation.table,
                prior_row.id(),
                [(ACTIVE_COLUMN.to_string(), Value::from(false))].into(),
            )?;
        }

        let row = self.backend.insert(
            txn,
            &relation.table,
            [
                (relation.parent_column.clone(), Value::from(parent)),
                (relation.target_column.clone(), Value::from(target)),
                (ACTIVE_COLUMN.to_string(), Value::from(true)),
                (
                    EFFECTIVE_TIME_COLUMN.to_string(),
                    Value::from(self.clock.now()),
                ),
            ]
            .into(),
        )?;

        debug!(
            table = %relation.table,
            parent = %parent,
            target = %target,
            prior = ?prior.as_ref().map(Row::id),
            "relation reassigned"
        );
        Ok(row)
    }

    /// Returns all association rows of a parent in creation order.
    pub(crate) fn history(
        &self,
        txn: &Transaction,
        relation: &DerivedRelation,
        parent: RowId,
    ) -> CoreResult<Vec<Row>> {
        let predicate = Predicate::new().eq(relation.parent_column.as_str(), parent);
        let mut rows = self.backend.select(txn, &relation.table, &predicate)?;
        rows.sort_by_key(Row::id);
        Ok(rows)
    }
}
