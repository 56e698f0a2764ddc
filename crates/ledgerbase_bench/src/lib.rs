//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use ledgerbase_core::Record;
use ledgerbase_testkit::{scenarios, TestStore};
use rust_decimal::Decimal;

/// A test store seeded with the base graph and `count` accounts.
#[must_use]
pub fn seeded_store(count: usize) -> TestStore {
    let store = TestStore::new();
    scenarios::base_graph(&store);
    scenarios::accounts(&store, count);
    store
}

/// Applies `n` sequential limit writes to the named account.
pub fn write_limits(store: &TestStore, account: &str, n: usize) {
    let key = ledgerbase_core::Key::single(account);
    for i in 0..n {
        store
            .transaction(|txn| {
                store.accessor("account")?.update(
                    txn,
                    &key,
                    Record::new().set("upper_limit", Decimal::from(i as i64)),
                )?;
                Ok(())
            })
            .expect("limit write failed");
    }
}
