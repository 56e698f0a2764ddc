//! Store facade.

use std::sync::Arc;

use ledgerbase_storage::{MemoryBackend, StoreBackend, Transaction, TxnMode};

use crate::accessor::Accessor;
use crate::clock::{Clock, SystemClock};
use crate::error::CoreResult;
use crate::schema::SchemaRegistry;

/// The main entry point: a validated schema registry bound to a storage
/// backend and a clock.
///
/// A store validates its registry and installs the derived table specs on
/// the backend when opened, then hands out [`Accessor`]s per entity type.
/// Transaction lifecycle stays with the caller: begin/commit/abort are
/// forwarded to the backend, and [`Store::transaction`] wraps the common
/// single-operation case.
///
/// # Example
///
/// ```rust,ignore
/// let store = Store::open_in_memory(ledger_registry()?)?;
/// store.transaction(|txn| {
///     let clients = store.accessor("client")?;
///     clients.create(txn, Record::new().set("name", "acme"))?;
///     Ok(())
/// })?;
/// ```
pub struct Store {
    backend: Arc<dyn StoreBackend>,
    registry: Arc<SchemaRegistry>,
    clock: Arc<dyn Clock>,
}

impl Store {
    /// Opens a store over a backend with the system clock.
    ///
    /// # Errors
    ///
    /// Fails if the registry does not validate or a table cannot be
    /// installed.
    pub fn open(backend: Arc<dyn StoreBackend>, registry: SchemaRegistry) -> CoreResult<Self> {
        Self::open_with_clock(backend, registry, Arc::new(SystemClock))
    }

    /// Opens a store with an explicit clock.
    ///
    /// The clock stamps `effective_time` on version transitions; tests pin
    /// it to a fixed instant.
    pub fn open_with_clock(
        backend: Arc<dyn StoreBackend>,
        registry: SchemaRegistry,
        clock: Arc<dyn Clock>,
    ) -> CoreResult<Self> {
        registry.validate()?;
        for spec in registry.table_specs() {
            if !backend.has_table(spec.name()) {
                backend.create_table(spec)?;
            }
        }
        Ok(Self {
            backend,
            registry: Arc::new(registry),
            clock,
        })
    }

    /// Opens a store over a fresh in-memory backend.
    pub fn open_in_memory(registry: SchemaRegistry) -> CoreResult<Self> {
        Self::open(Arc::new(MemoryBackend::new()), registry)
    }

    /// Returns the accessor for an entity type.
    ///
    /// # Errors
    ///
    /// Fails if no entity with this name is registered.
    pub fn accessor(&self, entity: &str) -> CoreResult<Accessor<'_>> {
        Ok(Accessor::new(self, self.registry.get(entity)?))
    }

    /// Begins a transaction in the given mode.
    pub fn begin(&self, mode: TxnMode) -> CoreResult<Transaction> {
        Ok(self.backend.begin(mode)?)
    }

    /// Commits a transaction.
    pub fn commit(&self, txn: &mut Transaction) -> CoreResult<()> {
        Ok(self.backend.commit(txn)?)
    }

    /// Aborts a transaction.
    pub fn abort(&self, txn: &mut Transaction) -> CoreResult<()> {
        Ok(self.backend.abort(txn)?)
    }

    /// Executes a function within a write transaction.
    ///
    /// Commits if the function returns `Ok`, aborts otherwise - including
    /// on an [`crate::CoreError::InvariantViolation`], which must never be
    /// committed past.
    pub fn transaction<F, R>(&self, f: F) -> CoreResult<R>
    where
        F: FnOnce(&mut Transaction) -> CoreResult<R>,
    {
        let mut txn = self.backend.begin(TxnMode::Write)?;
        match f(&mut txn) {
            Ok(result) => {
                self.backend.commit(&mut txn)?;
                Ok(result)
            }
            Err(e) => {
                let _ = self.backend.abort(&mut txn);
                Err(e)
            }
        }
    }

    /// Executes a function within a read transaction.
    pub fn read<F, R>(&self, f: F) -> CoreResult<R>
    where
        F: FnOnce(&Transaction) -> CoreResult<R>,
    {
        let mut txn = self.backend.begin(TxnMode::Read)?;
        let result = f(&txn);
        match &result {
            Ok(_) => self.backend.commit(&mut txn)?,
            Err(_) => {
                let _ = self.backend.abort(&mut txn);
            }
        }
        result
    }

    /// Returns the schema registry.
    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Returns the storage backend.
    #[must_use]
    pub fn backend(&self) -> &dyn StoreBackend {
        self.backend.as_ref()
    }

    /// Returns the store's clock.
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
