//! In-memory storage backend.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex, RwLock};

use crate::backend::StoreBackend;
use crate::error::{StorageError, StorageResult};
use crate::row::{Row, RowId};
use crate::table::{Predicate, TableSpec};
use crate::txn::{PendingWrite, Transaction, TxnId, TxnMode};
use crate::value::Value;

/// Committed state of one table.
#[derive(Debug)]
struct TableData {
    spec: TableSpec,
    rows: BTreeMap<RowId, BTreeMap<String, Value>>,
}

/// The reference in-memory backend.
///
/// Suitable for tests and ephemeral embedded use. All committed state lives
/// under one `RwLock`, so commit is atomic with respect to concurrent
/// readers: a reader holds the read lock for the whole select and observes
/// the state either before or after a commit, never in between.
///
/// `Write`-mode transactions are admitted one at a time. The writer slot is
/// a mutex-guarded `Option<TxnId>` with a condvar rather than a held lock
/// guard, so transactions stay plain owned values that can cross the
/// [`StoreBackend`] trait boundary.
///
/// # Thread Safety
///
/// The backend is `Send + Sync`. Note that beginning a second `Write`
/// transaction blocks the calling thread until the first one commits or
/// aborts - including when both are on the same thread.
#[derive(Debug)]
pub struct MemoryBackend {
    tables: RwLock<BTreeMap<String, TableData>>,
    next_row_id: AtomicU64,
    next_txn_id: AtomicU64,
    writer: Mutex<Option<TxnId>>,
    writer_released: Condvar,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Creates a new empty backend with no tables.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(BTreeMap::new()),
            next_row_id: AtomicU64::new(1),
            next_txn_id: AtomicU64::new(1),
            writer: Mutex::new(None),
            writer_released: Condvar::new(),
        }
    }

    /// Returns the number of committed rows in a table.
    ///
    /// # Errors
    ///
    /// Fails if the table does not exist.
    pub fn row_count(&self, table: &str) -> StorageResult<usize> {
        let tables = self.tables.read();
        let data = tables
            .get(table)
            .ok_or_else(|| StorageError::table_not_found(table))?;
        Ok(data.rows.len())
    }

    /// Validates that every column name is declared in the table spec.
    fn check_columns<'a>(
        spec: &TableSpec,
        table: &str,
        mut columns: impl Iterator<Item = &'a String>,
    ) -> StorageResult<()> {
        if let Some(unknown) = columns.find(|c| !spec.has_column(c)) {
            return Err(StorageError::column_not_found(table, unknown.clone()));
        }
        Ok(())
    }

    /// Releases the writer slot if this transaction holds it.
    fn release_writer(&self, txn: &Transaction) {
        if txn.mode() != TxnMode::Write {
            return;
        }
        let mut writer = self.writer.lock();
        if *writer == Some(txn.id()) {
            *writer = None;
            self.writer_released.notify_one();
        }
    }

    /// Returns `true` if the row is visible to the transaction, considering
    /// pending writes first, then committed state.
    fn row_exists(
        tables: &BTreeMap<String, TableData>,
        txn: &Transaction,
        table: &str,
        row: RowId,
    ) -> StorageResult<bool> {
        let data = tables
            .get(table)
            .ok_or_else(|| StorageError::table_not_found(table))?;
        match txn.pending(table, row) {
            Some(PendingWrite::Insert { .. } | PendingWrite::Update { .. }) => Ok(true),
            Some(PendingWrite::Delete) => Ok(false),
            None => Ok(data.rows.contains_key(&row)),
        }
    }
}

impl StoreBackend for MemoryBackend {
    fn create_table(&self, spec: TableSpec) -> StorageResult<()> {
        let mut tables = self.tables.write();
        if tables.contains_key(spec.name()) {
            return Err(StorageError::TableExists {
                name: spec.name().to_string(),
            });
        }
        tables.insert(
            spec.name().to_string(),
            TableData {
                spec,
                rows: BTreeMap::new(),
            },
        );
        Ok(())
    }

    fn has_table(&self, name: &str) -> bool {
        self.tables.read().contains_key(name)
    }

    fn begin(&self, mode: TxnMode) -> StorageResult<Transaction> {
        let id = TxnId::new(self.next_txn_id.fetch_add(1, Ordering::SeqCst));
        if mode == TxnMode::Write {
            let mut writer = self.writer.lock();
            while writer.is_some() {
                self.writer_released.wait(&mut writer);
            }
            *writer = Some(id);
        }
        Ok(Transaction::new(id, mode))
    }

    fn commit(&self, txn: &mut Transaction) -> StorageResult<()> {
        txn.ensure_active()?;

        let mut tables = self.tables.write();

        // Validate the whole buffer before touching committed state, so a
        // failed commit leaves no partial application behind.
        let mut failure: Option<StorageError> = None;
        for ((table, row), write) in txn.pending_writes() {
            match tables.get(table.as_str()) {
                None => {
                    failure = Some(StorageError::table_not_found(table.clone()));
                    break;
                }
                Some(data) => {
                    if matches!(write, PendingWrite::Update { .. })
                        && !data.rows.contains_key(row)
                    {
                        failure = Some(StorageError::row_not_found(table.clone(), *row));
                        break;
                    }
                }
            }
        }
        if let Some(err) = failure {
            drop(tables);
            txn.mark_aborted();
            self.release_writer(txn);
            return Err(err);
        }

        for ((table, row), write) in txn.pending_writes() {
            let data = tables
                .get_mut(table.as_str())
                .expect("validated table exists");
            match write {
                PendingWrite::Insert { values } => {
                    data.rows.insert(*row, values.clone());
                }
                PendingWrite::Update { changes } => {
                    let committed = data.rows.get_mut(row).expect("validated row exists");
                    committed.extend(changes.clone());
                }
                PendingWrite::Delete => {
                    data.rows.remove(row);
                }
            }
        }
        drop(tables);

        txn.mark_committed();
        self.release_writer(txn);
        Ok(())
    }

    fn abort(&self, txn: &mut Transaction) -> StorageResult<()> {
        txn.ensure_active()?;
        txn.mark_aborted();
        self.release_writer(txn);
        Ok(())
    }

    fn insert(
        &self,
        txn: &mut Transaction,
        table: &str,
        values: BTreeMap<String, Value>,
    ) -> StorageResult<RowId> {
        txn.ensure_active()?;
        {
            let tables = self.tables.read();
            let data = tables
                .get(table)
                .ok_or_else(|| StorageError::table_not_found(table))?;
            Self::check_columns(&data.spec, table, values.keys())?;
        }
        let row = RowId::new(self.next_row_id.fetch_add(1, Ordering::SeqCst));
        txn.record_insert(table, row, values)?;
        Ok(row)
    }

    fn update(
        &self,
        txn: &mut Transaction,
        table: &str,
        row: RowId,
        changes: BTreeMap<String, Value>,
    ) -> StorageResult<()> {
        txn.ensure_active()?;
        {
            let tables = self.tables.read();
            let data = tables
                .get(table)
                .ok_or_else(|| StorageError::table_not_found(table))?;
            Self::check_columns(&data.spec, table, changes.keys())?;
            if !Self::row_exists(&tables, txn, table, row)? {
                return Err(StorageError::row_not_found(table, row));
            }
        }
        txn.record_update(table, row, changes)
    }

    fn fetch(&self, txn: &Transaction, table: &str, row: RowId) -> StorageResult<Option<Row>> {
        let tables = self.tables.read();
        let data = tables
            .get(table)
            .ok_or_else(|| StorageError::table_not_found(table))?;

        match txn.pending(table, row) {
            Some(PendingWrite::Insert { values }) => Ok(Some(Row::new(row, values.clone()))),
            Some(PendingWrite::Delete) => Ok(None),
            Some(PendingWrite::Update { changes }) => match data.rows.get(&row) {
                Some(committed) => {
                    let mut values = committed.clone();
                    values.extend(changes.clone());
                    Ok(Some(Row::new(row, values)))
                }
                None => Ok(None),
            },
            None => Ok(data.rows.get(&row).map(|v| Row::new(row, v.clone()))),
        }
    }

    fn select(
        &self,
        txn: &Transaction,
        table: &str,
        predicate: &Predicate,
    ) -> StorageResult<Vec<Row>> {
        let tables = self.tables.read();
        let data = tables
            .get(table)
            .ok_or_else(|| StorageError::table_not_found(table))?;
        Self::check_columns(
            &data.spec,
            table,
            predicate.terms().iter().map(|(c, _)| c),
        )?;

        let mut result = Vec::new();

        for (&row_id, committed) in &data.rows {
            let row = match txn.pending(table, row_id) {
                Some(PendingWrite::Delete) => continue,
                Some(PendingWrite::Update { changes }) => {
                    let mut values = committed.clone();
                    values.extend(changes.clone());
                    Row::new(row_id, values)
                }
                // A pending insert for a committed row id cannot happen;
                // row ids are never reused.
                _ => Row::new(row_id, committed.clone()),
            };
            if predicate.matches(&row) {
                result.push(row);
            }
        }

        for (row_id, write) in txn.pending_in_table(table) {
            if let PendingWrite::Insert { values } = write {
                let row = Row::new(row_id, values.clone());
                if predicate.matches(&row) {
                    result.push(row);
                }
            }
        }

        Ok(result)
    }

    fn delete(&self, txn: &mut Transaction, table: &str, row: RowId) -> StorageResult<()> {
        txn.ensure_active()?;
        {
            let tables = self.tables.read();
            if !Self::row_exists(&tables, txn, table, row)? {
                return Err(StorageError::row_not_found(table, row));
            }
        }
        txn.record_delete(table, row)
    }
}
