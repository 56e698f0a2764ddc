//! Test store fixture.

use std::sync::{Arc, Once};

use chrono::{TimeZone, Utc};
use ledgerbase_core::{ledger_registry, FixedClock, Store};
use ledgerbase_storage::MemoryBackend;

/// An in-memory store with the ledger schema installed.
///
/// The clock starts pinned at a fixed instant so effective times are
/// deterministic; advance it through the `clock` handle. The `backend`
/// handle allows row-level assertions that the accessor API deliberately
/// does not expose (version-table row counts, for example).
pub struct TestStore {
    /// The store under test.
    pub store: Store,
    /// Typed handle to the store's backend.
    pub backend: Arc<MemoryBackend>,
    /// The store's pinned clock.
    pub clock: Arc<FixedClock>,
}

impl TestStore {
    /// Creates a fresh test store with the full ledger schema.
    #[must_use]
    pub fn new() -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        ));
        let store = Store::open_with_clock(
            backend.clone(),
            ledger_registry().expect("ledger registry must validate"),
            clock.clone(),
        )
        .expect("failed to open test store");
        Self {
            store,
            backend,
            clock,
        }
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestStore {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test against a fresh test store.
///
/// # Example
///
/// ```rust,ignore
/// use ledgerbase_testkit::with_test_store;
///
/// #[test]
/// fn my_test() {
///     with_test_store(|store| {
///         // ... drive accessors
///     });
/// }
/// ```
pub fn with_test_store<F, R>(f: F) -> R
where
    F: FnOnce(&TestStore) -> R,
{
    let store = TestStore::new();
    f(&store)
}

/// Installs a tracing subscriber honoring `RUST_LOG`, once per process.
///
/// Call at the top of tests whose version-transition logging you want to
/// see; repeated calls are no-ops.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerbase_storage::StoreBackend;

    #[test]
    fn test_store_has_ledger_tables() {
        let store = TestStore::new();
        assert!(store.backend.has_table("accounts"));
        assert!(store.backend.has_table("account_limits"));
        assert!(store.backend.has_table("exchange_exchange_rates"));
        assert!(store.backend.has_table("node_addresses"));
    }

    #[test]
    fn with_test_store_runs_closure() {
        let accessible = with_test_store(|store| store.accessor("client").is_ok());
        assert!(accessible);
    }

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
