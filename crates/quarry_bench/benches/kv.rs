//! Key/value operation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use quarry_core::Database;
use rand::seq::SliceRandom;
use rand::Rng;

/// Generate random data of the specified size.
fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

fn key(i: usize) -> Vec<u8> {
    format!("key-{i:08}").into_bytes()
}

fn populated(count: usize, size: usize) -> Database {
    let db = Database::open_in_memory().unwrap();
    let value = random_data(size);
    db.with_transaction(|db| {
        for i in 0..count {
            db.store(&key(i), &value)?;
        }
        Ok(())
    })
    .unwrap();
    db
}

/// Auto-committed single stores.
fn bench_single_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_store");

    for size in [64, 256, 1024, 4096, 16384].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let db = Database::open_in_memory().unwrap();
            let data = random_data(size);
            let mut i = 0;

            b.iter(|| {
                db.store(&key(i), black_box(&data)).unwrap();
                i += 1;
            });
        });
    }
    group.finish();
}

/// Many stores inside one explicit transaction.
fn bench_batch_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_store");

    for batch_size in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                let db = Database::open_in_memory().unwrap();
                let data = random_data(256);

                b.iter(|| {
                    db.with_transaction(|db| {
                        for i in 0..batch_size {
                            db.store(&key(i), black_box(&data))?;
                        }
                        Ok(())
                    })
                    .unwrap();
                });
            },
        );
    }
    group.finish();
}

/// Point reads in random key order.
fn bench_fetch(c: &mut Criterion) {
    let mut group = c.benchmark_group("fetch");

    for count in [1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let db = populated(count, 128);
            let mut order: Vec<usize> = (0..count).collect();
            order.shuffle(&mut rand::thread_rng());
            let mut next = order.iter().cycle();

            b.iter(|| {
                let i = *next.next().unwrap();
                black_box(db.fetch(&key(i)).unwrap());
            });
        });
    }
    group.finish();
}

/// Appends growing a single record into overflow pages.
fn bench_append(c: &mut Criterion) {
    c.bench_function("append_64", |b| {
        let db = Database::open_in_memory().unwrap();
        let chunk = random_data(64);
        b.iter(|| {
            db.append(b"log", black_box(&chunk)).unwrap();
        });
    });
}

/// Store then delete the same key.
fn bench_delete(c: &mut Criterion) {
    c.bench_function("store_delete", |b| {
        let db = populated(1_000, 64);
        let data = random_data(64);
        b.iter(|| {
            db.store(b"churn", &data).unwrap();
            black_box(db.delete(b"churn").unwrap());
        });
    });
}

criterion_group!(
    benches,
    bench_single_store,
    bench_batch_store,
    bench_fetch,
    bench_append,
    bench_delete
);
criterion_main!(benches);
