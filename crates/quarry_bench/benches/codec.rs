//! Document codec and JSON benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use quarry_codec::{from_document, from_json_str, to_document, to_json_string, ArrayMap, Value};

/// A small flat document.
fn simple_doc() -> Value {
    let mut map = ArrayMap::new();
    map.insert("name".into(), Value::str("Alice"));
    map.insert("email".into(), Value::str("alice@example.com"));
    map.insert("age".into(), Value::Int(30));
    Value::array(map)
}

/// A nested document `depth` levels deep with `width` fields per level.
fn complex_doc(depth: usize, width: usize) -> Value {
    if depth == 0 {
        return Value::str("leaf");
    }
    let mut map = ArrayMap::new();
    for i in 0..width {
        map.insert(
            format!("key_{i}").as_str().into(),
            complex_doc(depth - 1, width),
        );
    }
    Value::array(map)
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    group.bench_function("simple", |b| {
        let value = simple_doc();
        b.iter(|| black_box(to_document(black_box(&value)).unwrap()));
    });

    for (depth, width) in [(2, 4), (3, 5), (4, 4)] {
        let value = complex_doc(depth, width);
        let size = to_document(&value).unwrap().len();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(
            BenchmarkId::new("nested", format!("{depth}x{width}")),
            &value,
            |b, value| b.iter(|| black_box(to_document(value).unwrap())),
        );
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for (depth, width) in [(2, 4), (3, 5), (4, 4)] {
        let bytes = to_document(&complex_doc(depth, width)).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("nested", format!("{depth}x{width}")),
            &bytes,
            |b, bytes| b.iter(|| black_box(from_document(bytes).unwrap())),
        );
    }
    group.finish();
}

fn bench_json(c: &mut Criterion) {
    let mut group = c.benchmark_group("json");
    let value = complex_doc(3, 5);
    let text = to_json_string(&value);

    group.bench_function("to_json", |b| {
        b.iter(|| black_box(to_json_string(black_box(&value))));
    });
    group.bench_function("from_json", |b| {
        b.iter(|| black_box(from_json_str(black_box(&text)).unwrap()));
    });
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_json);
criterion_main!(benches);
