use std::hint::black_box;
use std::sync::Arc;

use criterion::*;

mod common;
use common::{Health, Point, Position};

fn insert_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    for &count in &[common::ENTITIES_SMALL, common::ENTITIES_MED] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("add_component", count), &count, |b, &count| {
            b.iter_batched(
                common::manager,
                |manager| {
                    for i in 0..count {
                        let entity = manager.create_entity(format!("e{i}")).expect("unique id");
                        entity.add_component::<dyn Position>().expect("construct Position");
                        entity.add_component::<Health>().expect("construct Health");
                        entity.init_components();
                        black_box(&entity);
                    }
                    manager
                },
                BatchSize::LargeInput,
            );
        });

        group.bench_with_input(BenchmarkId::new("add_instance", count), &count, |b, &count| {
            b.iter_batched(
                common::manager,
                |manager| {
                    for i in 0..count {
                        let entity = manager.create_entity(format!("e{i}")).expect("unique id");
                        let point: Arc<dyn Position> = Arc::new(Point::new(i as f32));
                        black_box(entity.add_component_instance(point));
                        entity.init_components();
                    }
                    manager
                },
                BatchSize::LargeInput,
            );
        });

        group.bench_with_input(BenchmarkId::new("populate_and_dispose", count), &count, |b, &count| {
            b.iter_batched(
                common::manager,
                |manager| {
                    for i in 0..count {
                        common::populated_entity(&manager, &format!("e{i}")).dispose();
                    }
                    manager
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, insert_benchmark);
criterion_main!(benches);
