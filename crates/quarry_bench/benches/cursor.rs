//! Cursor benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use quarry_core::{Database, SeekMode};
use rand::Rng;

fn key(i: usize) -> Vec<u8> {
    format!("key-{i:08}").into_bytes()
}

fn populated(count: usize) -> Database {
    let db = Database::open_in_memory().unwrap();
    db.with_transaction(|db| {
        for i in 0..count {
            db.store(&key(i * 2), b"value")?;
        }
        Ok(())
    })
    .unwrap();
    db
}

/// Walks every record forward.
fn bench_full_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_scan");

    for count in [1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let db = populated(count);
            b.iter(|| {
                let mut cursor = db.cursor().unwrap();
                let mut valid = cursor.first().unwrap();
                let mut seen = 0;
                while valid {
                    black_box(cursor.key().unwrap());
                    seen += 1;
                    valid = cursor.advance().unwrap();
                }
                assert_eq!(seen, count);
            });
        });
    }
    group.finish();
}

/// Walks every record backward.
fn bench_reverse_scan(c: &mut Criterion) {
    c.bench_function("reverse_scan_10000", |b| {
        let db = populated(10_000);
        b.iter(|| {
            let mut cursor = db.cursor().unwrap();
            let mut valid = cursor.last().unwrap();
            while valid {
                black_box(cursor.value().unwrap());
                valid = cursor.previous().unwrap();
            }
        });
    });
}

/// Seeks to random keys; odd keys are never stored.
fn bench_seek(c: &mut Criterion) {
    let mut group = c.benchmark_group("seek");
    let db = populated(10_000);

    for (name, mode) in [
        ("exact", SeekMode::Exact),
        ("less_or_equal", SeekMode::LessOrEqual),
        ("greater_or_equal", SeekMode::GreaterOrEqual),
    ] {
        group.bench_function(name, |b| {
            let mut rng = rand::thread_rng();
            let mut cursor = db.cursor().unwrap();
            b.iter(|| {
                let target = key(rng.gen_range(0..20_000));
                black_box(cursor.seek(&target, mode).unwrap());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_full_scan, bench_reverse_scan, bench_seek);
criterion_main!(benches);
