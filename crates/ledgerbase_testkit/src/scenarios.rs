//! Pre-built ledger scenarios.

use ledgerbase_core::Record;
use ledgerbase_storage::Value;
use rust_decimal::Decimal;

use crate::fixtures::TestStore;

/// Seeds the minimal graph accounts hang off: client `acme`, relationship
/// `rel-1`, node `node-1`.
pub fn base_graph(store: &TestStore) {
    store
        .transaction(|txn| {
            store
                .accessor("client")?
                .create(txn, Record::new().set("name", "acme"))?;
            store
                .accessor("relationship")?
                .create(txn, Record::new().set("id", "rel-1"))?;
            store.accessor("node")?.create(
                txn,
                Record::new().set("name", "node-1").set("client", "acme"),
            )?;
            Ok(())
        })
        .expect("failed to seed base graph");
}

/// Creates `count` accounts (`acct-0` ... `acct-{count-1}`) under the base
/// graph, returning their names. Call [`base_graph`] first.
pub fn accounts(store: &TestStore, count: usize) -> Vec<String> {
    let names: Vec<String> = (0..count).map(|i| format!("acct-{i}")).collect();
    store
        .transaction(|txn| {
            let accessor = store.accessor("account")?;
            for name in &names {
                accessor.create(
                    txn,
                    Record::new()
                        .set("name", name.as_str())
                        .set("relationship", "rel-1")
                        .set("node", "node-1")
                        .set("is_active", true)
                        .set("balance", Decimal::ZERO),
                )?;
            }
            Ok(())
        })
        .expect("failed to seed accounts");
    names
}

/// Seeds the base graph plus two accounts joined by an exchange priced by
/// rate `R1`; rate `R2` exists for reassignment tests.
pub fn priced_exchange(store: &TestStore) {
    base_graph(store);
    accounts(store, 2);
    store
        .transaction(|txn| {
            let rates = store.accessor("exchange_rate")?;
            for (name, value) in [("R1", Decimal::new(125, 2)), ("R2", Decimal::new(130, 2))] {
                rates.create(
                    txn,
                    Record::new()
                        .set("name", name)
                        .set("client", "acme")
                        .set("rate", value),
                )?;
            }
            store.accessor("exchange")?.create(
                txn,
                Record::new()
                    .set("source_account", "acct-0")
                    .set("target_account", "acct-1")
                    .set("rate", "R1"),
            )?;
            Ok(())
        })
        .expect("failed to seed priced exchange");
}

/// Seeds an address attached to `node-1`, closing the node/address cycle.
pub fn addressed_node(store: &TestStore) {
    store
        .transaction(|txn| {
            store.accessor("address")?.create(
                txn,
                Record::new()
                    .set("address", "addr-1")
                    .set("client", "acme")
                    .set("nodes", vec![Value::from("node-1")]),
            )?;
            Ok(())
        })
        .expect("failed to seed address");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::with_test_store;
    use ledgerbase_core::Key;

    #[test]
    fn base_graph_is_queryable() {
        with_test_store(|store| {
            base_graph(store);
            let found = store
                .read(|txn| store.accessor("node")?.exists(txn, &Key::single("node-1")))
                .unwrap();
            assert!(found);
        });
    }

    #[test]
    fn accounts_are_created_under_relationship() {
        with_test_store(|store| {
            base_graph(store);
            let names = accounts(store, 3);
            assert_eq!(names.len(), 3);

            let in_rel = store
                .read(|txn| {
                    store
                        .accessor("account")?
                        .filter(txn, &Record::new().set("relationship", "rel-1"))
                })
                .unwrap();
            assert_eq!(in_rel.len(), 3);
        });
    }

    #[test]
    fn priced_exchange_resolves_rate() {
        with_test_store(|store| {
            priced_exchange(store);
            let exchange = store
                .read(|txn| {
                    store
                        .accessor("exchange")?
                        .get(txn, &Key::composite(["acct-0", "acct-1"]))
                })
                .unwrap();
            assert_eq!(exchange.get("rate").as_text(), Some("R1"));
        });
    }
}
