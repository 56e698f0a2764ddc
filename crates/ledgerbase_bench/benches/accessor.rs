//! Record accessor benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ledgerbase_bench::seeded_store;
use ledgerbase_core::{Key, Record};
use rust_decimal::Decimal;

/// Benchmark entity creation with direct and foreign-key fields.
fn bench_create(c: &mut Criterion) {
    c.bench_function("account_create", |b| {
        let store = seeded_store(0);
        let mut i = 0u64;

        b.iter(|| {
            i += 1;
            let name = format!("acct-{i}");
            store
                .transaction(|txn| {
                    store.accessor("account")?.create(
                        txn,
                        Record::new()
                            .set("name", black_box(name.as_str()))
                            .set("relationship", "rel-1")
                            .set("node", "node-1")
                            .set("balance", Decimal::ZERO),
                    )?;
                    Ok(())
                })
                .unwrap();
        });
    });
}

/// Benchmark lookup by natural key, including reference resolution.
fn bench_get(c: &mut Criterion) {
    c.bench_function("account_get", |b| {
        let store = seeded_store(1);
        let key = Key::single("acct-0");

        b.iter(|| {
            let record = store
                .read(|txn| store.accessor("account")?.get(txn, black_box(&key)))
                .unwrap();
            black_box(record);
        });
    });
}

/// Benchmark filtering by a foreign-key criterion across table sizes.
fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("account_filter");

    for size in [10usize, 100, 1000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let store = seeded_store(size);
            let criteria = Record::new().set("relationship", "rel-1");

            b.iter(|| {
                let records = store
                    .read(|txn| store.accessor("account")?.filter(txn, black_box(&criteria)))
                    .unwrap();
                black_box(records);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_create, bench_get, bench_filter);
criterion_main!(benches);
