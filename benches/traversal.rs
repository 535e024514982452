//! Traversal throughput: overlapping vs abutting blocks, direct vs pipelined

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use std::sync::Arc;
use volume_blocks::{AxisRange, CursorBuilder, GridGeometry, MemoryDataset, Pipeline, TraversalConfig};

fn create_dataset(num_a: usize, num_b: usize, num_samples: usize) -> Arc<MemoryDataset> {
    let geometry = GridGeometry::new(
        AxisRange::with_count("Inline", 0.0, 1.0, num_a).unwrap(),
        AxisRange::with_count("Crossline", 0.0, 1.0, num_b).unwrap(),
        AxisRange::with_count("Time", 0.0, 4.0, num_samples).unwrap(),
    );
    Arc::new(MemoryDataset::from_fn("bench", geometry, |(a, b, s)| {
        (a + b + s) as f32
    }))
}

fn count_samples(block: &volume_blocks::Block) -> usize {
    block.columns().iter().flatten().map(|c| c.len()).sum()
}

fn bench_block_overlap(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_overlap");
    let dataset = create_dataset(128, 128, 64);

    for increment in [32usize, 24, 16] {
        group.bench_with_input(
            BenchmarkId::from_parameter(increment),
            &increment,
            |b, &increment| {
                b.iter(|| {
                    let cursor = CursorBuilder::new(dataset.clone())
                        .with_config(TraversalConfig::new(32, 32).with_increments(increment, increment))
                        .build_blocks()
                        .unwrap();
                    let total: usize = cursor.map(|block| count_samples(&block.unwrap())).sum();
                    black_box(total)
                });
            },
        );
    }

    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    let dataset = create_dataset(128, 128, 64);

    for capacity in [1usize, 4, 16] {
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &capacity,
            |b, &capacity| {
                b.iter(|| {
                    let cursor = CursorBuilder::new(dataset.clone())
                        .with_config(TraversalConfig::new(16, 16))
                        .build_blocks()
                        .unwrap();
                    let pipeline = Pipeline::spawn(cursor, capacity).unwrap();
                    let total: usize = pipeline.map(|block| count_samples(&block.unwrap())).sum();
                    black_box(total)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_block_overlap, bench_pipeline);
criterion_main!(benches);
