//! Transaction state.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{StorageError, StorageResult};
use crate::row::RowId;
use crate::value::Value;

/// Unique identifier for a transaction.
///
/// Transaction ids are monotonically increasing and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxnId(pub u64);

impl TxnId {
    /// Creates a new transaction id.
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

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Concurrency mode of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnMode {
    /// Reads committed state; writes are permitted but not serialized
    /// against other transactions.
    Read,
    /// Exclusive writer: the backend admits one `Write` transaction at a
    /// time, so read-modify-write sequences inside it are atomic with
    /// respect to every other writer.
    Write,
}

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been aborted.
    Aborted,
}

/// A pending, uncommitted write inside a transaction.
#[derive(Debug, Clone)]
pub enum PendingWrite {
    /// A row inserted by this transaction.
    Insert {
        /// Column values of the new row.
        values: BTreeMap<String, Value>,
    },
    /// Column changes to an existing committed row.
    Update {
        /// Changed columns merged over the committed row.
        changes: BTreeMap<String, Value>,
    },
    /// Deletion of a committed row.
    Delete,
}

/// An active transaction.
///
/// Transactions buffer writes until commit. A transaction always sees its
/// own pending writes; other transactions see nothing until commit applies
/// the whole buffer atomically.
#[derive(Debug)]
pub struct Transaction {
    id: TxnId,
    mode: TxnMode,
    state: TxnState,
    writes: BTreeMap<(String, RowId), PendingWrite>,
}

impl Transaction {
    /// Creates a new active transaction.
    ///
    /// Called by backends in [`crate::StoreBackend::begin`].
    #[must_use]
    pub fn new(id: TxnId, mode: TxnMode) -> Self {
        Self {
            id,
            mode,
            state: TxnState::Active,
            writes: BTreeMap::new(),
        }
    }

    /// Returns the transaction id.
    #[must_use]
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// Returns the concurrency mode.
    #[must_use]
    pub fn mode(&self) -> TxnMode {
        self.mode
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TxnState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TxnState::Active
    }

    /// Records an insert of a freshly allocated row.
    ///
    /// Called by backends; row ids are backend-allocated.
    pub fn record_insert(
        &mut self,
        table: &str,
        row: RowId,
        values: BTreeMap<String, Value>,
    ) -> StorageResult<()> {
        self.ensure_active()?;
        self.writes
            .insert((table.to_string(), row), PendingWrite::Insert { values });
        Ok(())
    }

    /// Records column changes for a row, merging with any earlier pending
    /// write to the same row.
    pub fn record_update(
        &mut self,
        table: &str,
        row: RowId,
        changes: BTreeMap<String, Value>,
    ) -> StorageResult<()> {
        self.ensure_active()?;
        let key = (table.to_string(), row);
        match self.writes.get_mut(&key) {
            Some(PendingWrite::Insert { values }) => {
                values.extend(changes);
            }
            Some(PendingWrite::Update { changes: existing }) => {
                existing.extend(changes);
            }
            Some(PendingWrite::Delete) => {
                return Err(StorageError::row_not_found(table, row));
            }
            None => {
                self.writes.insert(key, PendingWrite::Update { changes });
            }
        }
        Ok(())
    }

    /// Records a row deletion. Deleting a row inserted in this transaction
    /// simply drops the pending insert.
    pub fn record_delete(&mut self, table: &str, row: RowId) -> StorageResult<()> {
        self.ensure_active()?;
        let key = (table.to_string(), row);
        match self.writes.get(&key) {
            Some(PendingWrite::Insert { .. }) => {
                self.writes.remove(&key);
            }
            _ => {
                self.writes.insert(key, PendingWrite::Delete);
            }
        }
        Ok(())
    }

    /// Returns the pending write for a row, if any.
    #[must_use]
    pub fn pending(&self, table: &str, row: RowId) -> Option<&PendingWrite> {
        self.writes.get(&(table.to_string(), row))
    }

    /// Iterates over pending writes in one table.
    pub fn pending_in_table<'a>(
        &'a self,
        table: &'a str,
    ) -> impl Iterator<Item = (RowId, &'a PendingWrite)> {
        self.writes
            .iter()
            .filter(move |((t, _), _)| t == table)
            .map(|((_, row), write)| (*row, write))
    }

    /// Iterates over all pending writes.
    pub fn pending_writes(&self) -> impl Iterator<Item = (&(String, RowId), &PendingWrite)> {
        self.writes.iter()
    }

    /// Returns the number of pending writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Marks the transaction as committed. Called by backends.
    pub fn mark_committed(&mut self) {
        self.state = TxnState::Committed;
    }

    /// Marks the transaction as aborted. Called by backends.
    pub fn mark_aborted(&mut self) {
        self.state = TxnState::Aborted;
    }

    /// Ensures the transaction is active.
    pub fn ensure_active(&self) -> StorageResult<()> {
        match self.state {
            TxnState::Active => Ok(()),
            TxnState::Committed => Err(StorageError::transaction_inactive("already committed")),
            TxnState::Aborted => Err(StorageError::transaction_inactive("already aborted")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_txn() -> Transaction {
        Transaction::new(TxnId::new(1), TxnMode::Write)
    }

    fn values(pairs: &[(&str, i64)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::from(*v)))
            .collect()
    }

    #[test]
    fn new_transaction_is_active() {
        let txn = create_txn();
        assert!(txn.is_active());
        assert_eq!(txn.state(), TxnState::Active);
        assert_eq!(txn.mode(), TxnMode::Write);
    }

    #[test]
    fn insert_records_write() {
        let mut txn = create_txn();
        txn.record_insert("t", RowId::new(1), values(&[("a", 1)]))
            .unwrap();
        assert_eq!(txn.write_count(), 1);
        assert!(matches!(
            txn.pending("t", RowId::new(1)),
            Some(PendingWrite::Insert { .. })
        ));
    }

    #[test]
    fn update_merges_into_pending_insert() {
        let mut txn = create_txn();
        let row = RowId::new(1);
        txn.record_insert("t", row, values(&[("a", 1)])).unwrap();
        txn.record_update("t", row, values(&[("b", 2)])).unwrap();

        match txn.pending("t", row) {
            Some(PendingWrite::Insert { values }) => {
                assert_eq!(values.get("a"), Some(&Value::Integer(1)));
                assert_eq!(values.get("b"), Some(&Value::Integer(2)));
            }
            other => panic!("expected merged insert, got {other:?}"),
        }
    }

    #[test]
    fn update_merges_into_pending_update() {
        let mut txn = create_txn();
        let row = RowId::new(1);
        txn.record_update("t", row, values(&[("a", 1)])).unwrap();
        txn.record_update("t", row, values(&[("a", 3), ("b", 2)]))
            .unwrap();

        match txn.pending("t", row) {
            Some(PendingWrite::Update { changes }) => {
                assert_eq!(changes.get("a"), Some(&Value::Integer(3)));
                assert_eq!(changes.get("b"), Some(&Value::Integer(2)));
            }
            other => panic!("expected merged update, got {other:?}"),
        }
    }

    #[test]
    fn delete_of_pending_insert_drops_row() {
        let mut txn = create_txn();
        let row = RowId::new(1);
        txn.record_insert("t", row, values(&[("a", 1)])).unwrap();
        txn.record_delete("t", row).unwrap();
        assert_eq!(txn.write_count(), 0);
    }

    #[test]
    fn update_after_delete_fails() {
        let mut txn = create_txn();
        let row = RowId::new(1);
        txn.record_update("t", row, values(&[("a", 1)])).unwrap();
        txn.record_delete("t", row).unwrap();
        let result = txn.record_update("t", row, values(&[("a", 2)]));
        assert!(matches!(result, Err(StorageError::RowNotFound { .. })));
    }

    #[test]
    fn cannot_write_after_commit() {
        let mut txn = create_txn();
        txn.mark_committed();
        let result = txn.record_insert("t", RowId::new(1), BTreeMap::new());
        assert!(matches!(
            result,
            Err(StorageError::TransactionInactive { .. })
        ));
    }

    #[test]
    fn cannot_write_after_abort() {
        let mut txn = create_txn();
        txn.mark_aborted();
        let result = txn.record_delete("t", RowId::new(1));
        assert!(result.is_err());
    }

    #[test]
    fn pending_in_table_filters_by_table() {
        let mut txn = create_txn();
        txn.record_insert("a", RowId::new(1), BTreeMap::new())
            .unwrap();
        txn.record_insert("b", RowId::new(2), BTreeMap::new())
            .unwrap();

        let in_a: Vec<_> = txn.pending_in_table("a").collect();
        assert_eq!(in_a.len(), 1);
        assert_eq!(in_a[0].0, RowId::new(1));
    }
}
