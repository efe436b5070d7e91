use config::EngineConfig;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use engine::LsmEngine;
use tempfile::{tempdir, TempDir};

const N_KEYS: usize = 10_000;
const VALUE_SIZE: usize = 100;

fn open(dir: &TempDir) -> LsmEngine {
    LsmEngine::open(
        EngineConfig::builder()
            .data_dir(dir.path())
            .max_memtable_size_bytes(256 * 1024)
            .enable_background_compaction(false)
            .build(),
    )
    .unwrap()
}

fn loaded() -> (TempDir, LsmEngine) {
    let dir = tempdir().unwrap();
    let mut engine = open(&dir);
    let value = "x".repeat(VALUE_SIZE);
    for i in 0..N_KEYS {
        engine.put(format!("key{:06}", i), value.clone()).unwrap();
    }
    engine.flush().unwrap();
    (dir, engine)
}

fn engine_put_benchmark(c: &mut Criterion) {
    c.bench_function("engine_put_10k_with_flushes", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let engine = open(&dir);
                (dir, engine)
            },
            |(dir, mut engine)| {
                let value = "x".repeat(VALUE_SIZE);
                for i in 0..N_KEYS {
                    engine.put(format!("key{:06}", i), value.clone()).unwrap();
                }
                // Dropped outside the timed section, engine first.
                (engine, dir)
            },
            BatchSize::PerIteration,
        );
    });
}

fn engine_get_benchmark(c: &mut Criterion) {
    let (_dir, engine) = loaded();
    c.bench_function("engine_get_hit_10k", |b| {
        b.iter(|| {
            for i in 0..N_KEYS {
                assert!(engine.get(&format!("key{:06}", i)).unwrap().is_some());
            }
        });
    });
}

fn engine_compact_benchmark(c: &mut Criterion) {
    c.bench_function("engine_compact_level0", |b| {
        b.iter_batched(
            loaded,
            |(dir, mut engine)| {
                engine.compact().unwrap();
                (engine, dir)
            },
            BatchSize::PerIteration,
        );
    });
}

criterion_group!(
    benches,
    engine_put_benchmark,
    engine_get_benchmark,
    engine_compact_benchmark
);
criterion_main!(benches);
