//! Benchmarks for spark-collections
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use spark_collections::{by_field, ObservableList, ObservableMap, ObservableSet};

// =============================================================================
// MUTATION BENCHMARKS
// =============================================================================

fn bench_list_push_no_subscribers(c: &mut Criterion) {
    c.bench_function("list_push_no_subscribers", |b| {
        let list = ObservableList::new();
        b.iter(|| list.push(black_box(1u64)))
    });
}

fn bench_list_push_with_subscribers(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_push_with_subscribers");

    for count in [1, 4, 16] {
        group.bench_with_input(BenchmarkId::new("callbacks", count), &count, |b, &count| {
            let list = ObservableList::new();
            for _ in 0..count {
                list.listen(|event| {
                    black_box(event.sequence());
                })
                .unwrap();
            }
            b.iter(|| list.push(black_box(1u64)))
        });
    }

    group.finish();
}

fn bench_set_insert_duplicate(c: &mut Criterion) {
    c.bench_function("set_insert_duplicate", |b| {
        let set: ObservableSet<u64> = (0..1_000).collect();
        b.iter(|| set.insert(black_box(500)))
    });
}

fn bench_set_custom_equality(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_custom_equality");

    for size in [10u64, 100, 1_000] {
        group.bench_with_input(BenchmarkId::new("size", size), &size, |b, &size| {
            let set = ObservableSet::with_equality(by_field(|n: &u64| n % (size + 1)));
            set.extend(0..size).unwrap();
            b.iter(|| set.contains(black_box(&(size / 2))))
        });
    }

    group.finish();
}

// =============================================================================
// BULK BENCHMARKS
// =============================================================================

fn bench_map_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_merge");

    for size in [10u32, 100, 1_000] {
        group.bench_with_input(BenchmarkId::new("entries", size), &size, |b, &size| {
            let incoming: Vec<(u32, u32)> = (0..size).map(|k| (k, k)).collect();
            b.iter(|| {
                let map: ObservableMap<u32, u32> = (0..size / 2).map(|k| (k, 0)).collect();
                map.merge_with(incoming.clone(), |old, new| old + new).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_list_extend(c: &mut Criterion) {
    c.bench_function("list_extend_1000", |b| {
        let items: Vec<u64> = (0..1_000).collect();
        b.iter(|| {
            let list = ObservableList::new();
            let _events = list.subscribe().unwrap();
            black_box(list.extend(items.clone()).unwrap())
        })
    });
}

// =============================================================================
// DELIVERY BENCHMARKS
// =============================================================================

fn bench_channel_delivery(c: &mut Criterion) {
    c.bench_function("channel_delivery", |b| {
        let list = ObservableList::new();
        let mut events = list.subscribe().unwrap();
        b.iter(|| {
            list.push(black_box(7u64)).unwrap();
            black_box(events.try_next_event())
        })
    });
}

criterion_group!(
    mutation_benches,
    bench_list_push_no_subscribers,
    bench_list_push_with_subscribers,
    bench_set_insert_duplicate,
    bench_set_custom_equality,
);

criterion_group!(bulk_benches, bench_map_merge, bench_list_extend);

criterion_group!(delivery_benches, bench_channel_delivery);

criterion_main!(mutation_benches, bulk_benches, delivery_benches);
