#![allow(missing_docs)]
//! Benchmarks for circuit passes.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use redwire_core::redstone::{
    ExtractionOrder, FlushCoordinator, Propagation, PropagationSettings, TorchFacing, blocks,
    classify,
};
use redwire_core::world::MemoryWorld;
use redwire_utils::BlockPos;
use tokio::runtime::Runtime;

/// Builds a square of wires with a lit standing torch at one corner.
fn wire_grid(size: i32) -> (MemoryWorld, Vec<BlockPos>) {
    let world = MemoryWorld::new();
    let torch = BlockPos::new(0, 1, 0);
    world.place(torch.below(), blocks::STONE, 0);
    world.place(torch, blocks::REDSTONE_TORCH, TorchFacing::Up as u8);

    let mut tracked = vec![torch];
    for x in 1..=size {
        for z in 0..size {
            let wire = BlockPos::new(x, 1, z);
            world.place(wire, blocks::REDSTONE_WIRE, 0);
            tracked.push(wire);
        }
    }
    (world, tracked)
}

fn bench_grid_pass(c: &mut Criterion) {
    let runtime = Runtime::new().expect("failed to build runtime");
    let mut group = c.benchmark_group("grid_pass");

    for size in [8, 16, 32] {
        let (world, tracked) = wire_grid(size);
        for order in [ExtractionOrder::Fifo, ExtractionOrder::Lifo] {
            let settings = PropagationSettings {
                order,
                ..PropagationSettings::default()
            };
            group.bench_with_input(
                BenchmarkId::new(format!("{order:?}"), size),
                &settings,
                |b, &settings| {
                    b.iter(|| {
                        runtime.block_on(async {
                            let topology = classify(&world, &tracked).await.expect("classify failed");
                            let mut flush = FlushCoordinator::new();
                            black_box(
                                Propagation::new(&world, &topology, settings)
                                    .run(&mut flush)
                                    .await
                                    .expect("pass failed"),
                            )
                        })
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_grid_pass);
criterion_main!(benches);
