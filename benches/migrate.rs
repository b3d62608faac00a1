use std::hint::black_box;

use criterion::*;

mod common;
use common::*;

fn migrate_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("migrate");

    group.bench_function("tag_and_untag_10k", |b| {
        b.iter_batched(
            || setup_store(AGENTS_SMALL).unwrap(),
            |mut store| {
                let entities: Vec<_> = store.entities().iter().map(|(id, _)| id).collect();
                for &entity in &entities {
                    store.add_tag::<Employed>(entity).unwrap();
                }
                for &entity in &entities {
                    store.remove_tag::<Employed>(entity).unwrap();
                }
                black_box(store);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("remove_component_10k", |b| {
        b.iter_batched(
            || setup_store(AGENTS_SMALL).unwrap(),
            |mut store| {
                let entities: Vec<_> = store.entities().iter().map(|(id, _)| id).collect();
                for &entity in &entities {
                    black_box(store.remove_component::<Productivity>(entity).unwrap());
                }
                black_box(store);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("despawn_10k", |b| {
        b.iter_batched(
            || setup_store(AGENTS_SMALL).unwrap(),
            |mut store| {
                let entities: Vec<_> = store.entities().iter().map(|(id, _)| id).collect();
                for &entity in entities.iter().rev() {
                    store.despawn(entity).unwrap();
                }
                black_box(store);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, migrate_benchmark);
criterion_main!(benches);
