//! Performance benchmarks for the entity store.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use entity_store::{
    FileKeyValueStore, Filter, PaginationSpec, SortSpec, Store, StoreConfig, UpdateRequest,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tempfile::TempDir;

fn seeded_store(size: usize) -> Store<Value> {
    let rows = (0..size)
        .map(|i| json!({"id": i.to_string(), "score": (i * 7919) % 1000, "name": format!("vm-{}", i)}))
        .collect();
    Store::new(StoreConfig::new("bench").initial_data(rows)).unwrap()
}

/// Benchmark a full filter -> sort -> paginate derivation with a cold view
fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");

    for size in [100, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("entities", size), &size, |b, &size| {
            let store = seeded_store(size);
            store.set_filters(vec![Filter::gte("score", 250)]);
            store.set_pagination(Some(PaginationSpec::new(2, 50)));

            let mut flip = false;
            b.iter(|| {
                // Alternate the sort so every read recomputes
                flip = !flip;
                let sort = if flip {
                    SortSpec::asc("score")
                } else {
                    SortSpec::desc("score")
                };
                store.set_sort(Some(sort));
                black_box(store.paginated());
            });
        });
    }

    group.finish();
}

/// Benchmark repeated reads of an unchanged view
fn bench_cached_view(c: &mut Criterion) {
    let store = seeded_store(10_000);
    store.set_filters(vec![Filter::contains("name", "9")]);
    store.set_sort(Some(SortSpec::desc("score")));
    store.set_pagination(Some(PaginationSpec::new(1, 25)));

    c.bench_function("cached_view", |b| {
        b.iter(|| black_box(store.paginated()));
    });
}

/// Benchmark single-entity mutations
fn bench_mutations(c: &mut Criterion) {
    let store = seeded_store(1_000);
    let mut counter = 0u64;

    c.bench_function("create", |b| {
        b.iter(|| {
            counter += 1;
            black_box(store.create(json!({"id": format!("new-{}", counter), "score": 1})).unwrap());
        });
    });

    c.bench_function("update", |b| {
        let mut patch = Map::new();
        patch.insert("score".into(), json!(42));
        b.iter(|| black_box(store.update("500", patch.clone()).unwrap()));
    });
}

/// Benchmark batch updates
fn bench_update_many(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_many");

    for batch in [10, 100] {
        group.bench_with_input(BenchmarkId::new("batch", batch), &batch, |b, &batch| {
            let store = seeded_store(1_000);
            let requests: Vec<UpdateRequest> = (0..batch)
                .map(|i| {
                    let mut patch = Map::new();
                    patch.insert("score".into(), json!(i));
                    UpdateRequest::new(i.to_string(), patch)
                })
                .collect();

            b.iter(|| black_box(store.update_many(requests.clone())));
        });
    }

    group.finish();
}

/// Benchmark write-through persistence to disk
fn bench_persisted_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("persisted_update");

    for size in [100, 1_000] {
        group.bench_with_input(BenchmarkId::new("entities", size), &size, |b, &size| {
            let dir = TempDir::new().unwrap();
            let backend = Arc::new(FileKeyValueStore::open(dir.path()).unwrap());
            let rows = (0..size).map(|i| json!({"id": i.to_string(), "score": 0})).collect();
            let store: Store<Value> = Store::new(
                StoreConfig::new("bench").initial_data(rows).persist_to(backend),
            )
            .unwrap();

            let mut patch = Map::new();
            patch.insert("score".into(), json!(1));
            b.iter(|| black_box(store.update("0", patch.clone()).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_pipeline,
    bench_cached_view,
    bench_mutations,
    bench_update_many,
    bench_persisted_update,
);

criterion_main!(benches);
