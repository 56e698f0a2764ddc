//! Storage backend trait definition.

use std::collections::BTreeMap;

use crate::error::StorageResult;
use crate::row::{Row, RowId};
use crate::table::{Predicate, TableSpec};
use crate::txn::{Transaction, TxnMode};
use crate::value::Value;

/// A relational row store the mapping core reads and writes through.
///
/// Backends are **dumb row stores**. They provide row lookup by id, row
/// insert, column update, equality-predicate select, and row delete, all
/// within a caller-supplied [`Transaction`]. Backends do not understand
/// entities, natural keys, or version flags - the layer above owns all
/// interpretation.
///
/// # Invariants
///
/// - `insert` returns a fresh [`RowId`], never reused
/// - a transaction always observes its own pending writes
/// - other transactions observe nothing until `commit`, which applies the
///   whole write buffer atomically: a concurrent reader sees the state
///   either before or after the commit, never in between
/// - a [`TxnMode::Write`] transaction excludes every other `Write`
///   transaction for its lifetime
/// - backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::MemoryBackend`] - reference backend for tests and embedded use
pub trait StoreBackend: Send + Sync {
    /// Declares a table. Fails if a table with this name already exists.
    fn create_table(&self, spec: TableSpec) -> StorageResult<()>;

    /// Returns `true` if the table has been created.
    fn has_table(&self, name: &str) -> bool;

    /// Begins a new transaction in the given mode.
    ///
    /// Beginning a [`TxnMode::Write`] transaction blocks until no other
    /// `Write` transaction is active.
    fn begin(&self, mode: TxnMode) -> StorageResult<Transaction>;

    /// Commits a transaction, applying all pending writes atomically.
    fn commit(&self, txn: &mut Transaction) -> StorageResult<()>;

    /// Aborts a transaction, discarding all pending writes.
    fn abort(&self, txn: &mut Transaction) -> StorageResult<()>;

    /// Inserts a row, returning its freshly allocated id.
    ///
    /// # Errors
    ///
    /// Fails if the table does not exist or a column is not declared.
    fn insert(
        &self,
        txn: &mut Transaction,
        table: &str,
        values: BTreeMap<String, Value>,
    ) -> StorageResult<RowId>;

    /// Updates columns of an existing row.
    ///
    /// # Errors
    ///
    /// Fails if the table, row, or a column does not exist.
    fn update(
        &self,
        txn: &mut Transaction,
        table: &str,
        row: RowId,
        changes: BTreeMap<String, Value>,
    ) -> StorageResult<()>;

    /// Fetches a row by id. Returns `None` if the row does not exist.
    fn fetch(&self, txn: &Transaction, table: &str, row: RowId) -> StorageResult<Option<Row>>;

    /// Selects all rows satisfying an equality predicate.
    ///
    /// # Errors
    ///
    /// Fails if the table does not exist or a predicate column is not
    /// declared.
    fn select(
        &self,
        txn: &Transaction,
        table: &str,
        predicate: &Predicate,
    ) -> StorageResult<Vec<Row>>;

    /// Deletes a row by id.
    ///
    /// # Errors
    ///
    /// Fails if the table or row does not exist.
    fn delete(&self, txn: &mut Transaction, table: &str, row: RowId) -> StorageResult<()>;
}
