//! Throughput Benchmark for TTLKV
//!
//! This benchmark measures the record store, the key encoding and the
//! garbage collector over the in-memory engine.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use std::sync::Arc;
use ttlkv::protocol::parse_command;
use ttlkv::storage::keys::{data_key, expiration_key};
use ttlkv::storage::{collect_once, LockTable, MemoryStorage, RecordStore};

const FAR_DEADLINE: u64 = 4_000_000_000;

fn new_store() -> RecordStore {
    RecordStore::new(Arc::new(MemoryStorage::new()))
}

/// Benchmark PUT of fresh keys
fn bench_put(c: &mut Criterion) {
    let store = new_store();

    let mut group = c.benchmark_group("put");
    group.throughput(Throughput::Elements(1));

    group.bench_function("put_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i);
            store.put(key.as_bytes(), b"small_value", FAR_DEADLINE).unwrap();
            i += 1;
        });
    });

    group.bench_function("put_medium", |b| {
        let mut i = 0u64;
        let value = "x".repeat(1024); // 1KB value
        b.iter(|| {
            let key = format!("medium:{}", i);
            store.put(key.as_bytes(), value.as_bytes(), FAR_DEADLINE).unwrap();
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark READ operations
fn bench_get(c: &mut Criterion) {
    let store = new_store();

    // Pre-populate with data
    for i in 0..10_000 {
        let key = format!("key:{}", i);
        let value = format!("value:{}", i);
        store.put(key.as_bytes(), value.as_bytes(), FAR_DEADLINE).unwrap();
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 10_000);
            black_box(store.get(key.as_bytes()).unwrap());
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("missing:{}", i);
            black_box(store.get(key.as_bytes()).unwrap());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark overwrites, which look up the previous expiration entry
fn bench_overwrite(c: &mut Criterion) {
    let mut group = c.benchmark_group("overwrite");
    group.throughput(Throughput::Elements(1));

    for size in [100usize, 1_000] {
        let store = new_store();
        for i in 0..size {
            let key = format!("key:{}", i);
            store.put(key.as_bytes(), b"value", FAR_DEADLINE).unwrap();
        }

        group.bench_function(format!("overwrite_{}_keys", size), |b| {
            let mut i = 0u64;
            b.iter(|| {
                let key = format!("key:{}", i % size as u64);
                store.put(key.as_bytes(), b"updated", FAR_DEADLINE + i).unwrap();
                i += 1;
            });
        });
    }

    group.finish();
}

/// Benchmark key encoding and request parsing
fn bench_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("encoding");
    group.throughput(Throughput::Elements(1));

    group.bench_function("data_key", |b| {
        b.iter(|| black_box(data_key(black_box(b"user:1234"))));
    });

    group.bench_function("expiration_key", |b| {
        b.iter(|| black_box(expiration_key(black_box(b"user:1234"), FAR_DEADLINE).unwrap()));
    });

    group.bench_function("parse_put", |b| {
        b.iter(|| black_box(parse_command(black_box(b"PUT user:1234 60 some value here"), 0)));
    });

    group.finish();
}

/// Benchmark one collection cycle over a batch of expired records
fn bench_collect(c: &mut Criterion) {
    let locks = Arc::new(LockTable::new());

    let mut group = c.benchmark_group("gc");
    group.throughput(Throughput::Elements(1_000));

    group.bench_function("collect_1000_expired", |b| {
        b.iter_batched(
            || {
                let store = new_store();
                for i in 0..1_000u64 {
                    let key = format!("expired:{}", i);
                    store.put(key.as_bytes(), b"value", 1_000 + i).unwrap();
                }
                store
            },
            |store| black_box(collect_once(&store, &locks, 10_000, 1_024)),
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_put,
    bench_get,
    bench_overwrite,
    bench_encoding,
    bench_collect,
);

criterion_main!(benches);
