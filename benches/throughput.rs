//! Throughput Benchmark for streamkv
//!
//! Measures the record store and the full parse-execute-serialize path of
//! the command dispatcher.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;
use streamkv::commands::CommandDispatcher;
use streamkv::storage::StorageEngine;

/// Benchmark store writes
fn bench_set(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            engine.set(format!("key:{}", i), "small_value", 0, 0);
            i += 1;
        });
    });

    group.bench_function("set_with_ttl", |b| {
        let mut i = 0u64;
        b.iter(|| {
            engine.set(format!("ttl:{}", i), "small_value", 0, 3600);
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark store reads
fn bench_get(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    for i in 0..100_000 {
        engine.set(format!("key:{}", i), format!("value:{}", i), 0, 0);
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(engine.get(&format!("key:{}", i % 100_000)));
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(engine.get(&format!("missing:{}", i)));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark whole commands through the dispatcher
fn bench_dispatch(c: &mut Criterion) {
    let dispatcher = CommandDispatcher::new(Arc::new(StorageEngine::new())).with_diagnostic_record(false);
    dispatcher.execute(b"set foo 5 0 3 bar");

    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_hit", |b| {
        b.iter(|| black_box(dispatcher.execute(b"get foo\n")));
    });

    group.bench_function("set", |b| {
        b.iter(|| black_box(dispatcher.execute(b"set foo 5 0 3 bar\n")));
    });

    group.bench_function("error", |b| {
        b.iter(|| black_box(dispatcher.execute(b"bogus\n")));
    });

    group.finish();
}

/// Benchmark concurrent access
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let engine = Arc::new(StorageEngine::new());
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let engine = Arc::clone(&engine);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = format!("key:{}:{}", t, i);
                            engine.set(key.clone(), "value", 0, 0);
                            engine.get(&key);
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(engine.len());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_set, bench_get, bench_dispatch, bench_concurrent);
criterion_main!(benches);
