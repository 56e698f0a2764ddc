//! Version transition benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ledgerbase_bench::{seeded_store, write_limits};
use ledgerbase_core::{Key, Record};
use rust_decimal::Decimal;

/// Benchmark one limit transition on top of a growing version history.
///
/// Resolution of the active version goes through an equality select on the
/// version table, so history depth is the interesting axis.
fn bench_transition(c: &mut Criterion) {
    let mut group = c.benchmark_group("limit_transition");

    for history in [0usize, 10, 100] {
        group.bench_with_input(
            BenchmarkId::from_parameter(history),
            &history,
            |b, &history| {
                let store = seeded_store(1);
                write_limits(&store, "acct-0", history);
                let key = Key::single("acct-0");
                let mut i = 0i64;

                b.iter(|| {
                    i += 1;
                    store
                        .transaction(|txn| {
                            store.accessor("account")?.update(
                                txn,
                                &key,
                                Record::new().set("upper_limit", Decimal::from(black_box(i))),
                            )?;
                            Ok(())
                        })
                        .unwrap();
                });
            },
        );
    }
    group.finish();
}

/// Benchmark reading a versioned field through the active version.
fn bench_versioned_read(c: &mut Criterion) {
    c.bench_function("versioned_read", |b| {
        let store = seeded_store(1);
        write_limits(&store, "acct-0", 50);
        let key = Key::single("acct-0");

        b.iter(|| {
            let record = store
                .read(|txn| store.accessor("account")?.get(txn, black_box(&key)))
                .unwrap();
            black_box(record.get("upper_limit").as_decimal());
        });
    });
}

criterion_group!(benches, bench_transition, bench_versioned_read);
criterion_main!(benches);
