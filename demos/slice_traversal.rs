//! Example: crossline slices of two volumes on the same grid, clipped to a
//! polygon, then 5 x 5 neighborhoods streamed with empty cubes skipped
//!
//! Run with: cargo run --example slice_traversal

use std::sync::Arc;
use volume_blocks::{
    AxisRange, CursorBuilder, GridGeometry, MemoryDataset, Pipeline, PolygonRegion,
    TraversalConfig, TraversalOrder,
};

fn main() -> anyhow::Result<()> {
    println!("Volume Blocks Slice Demo");
    println!("========================\n");

    let geometry = GridGeometry::new(
        AxisRange::with_count("Inline", 0.0, 1.0, 40)?,
        AxisRange::with_count("Crossline", 0.0, 1.0, 30)?,
        AxisRange::with_count("Depth", 0.0, 10.0, 100)?,
    );
    let amplitude = Arc::new(MemoryDataset::from_fn("amplitude", geometry.clone(), |(a, b, s)| {
        ((a + b) as f32 * 0.1).sin() * s as f32
    }));
    let velocity = MemoryDataset::from_fn("velocity", geometry, |(_, _, s)| 1500.0 + 2.0 * s as f32);

    // Triangle in world coordinates (unit grid: x = inline, y = crossline)
    let region = PolygonRegion::new(vec![(0.0, 0.0), (39.0, 0.0), (0.0, 29.0)])?;

    let mut cursor = CursorBuilder::new(amplitude.clone())
        .with_secondary(Arc::new(velocity))
        .with_region(region.clone())
        .with_config(
            TraversalConfig::default()
                .with_order(TraversalOrder::BMajor)
                .with_increments(1, 5),
        )
        .build_slices()?;

    println!("{} crossline slices, every 5th line\n", cursor.total_work());
    while cursor.has_next() {
        let slice = cursor.next_slice()?;
        let inside = slice.len() - slice.absent_count() / slice.num_datasets();
        let mean_velocity = (0..slice.len())
            .filter_map(|i| slice.get(1, i))
            .map(|c| c.samples.iter().sum::<f32>() / c.len() as f32)
            .sum::<f32>()
            / inside.max(1) as f32;
        println!(
            "  [{:3}%] {:<40} {:2} traces inside, mean velocity {:.1}",
            cursor.completion(),
            cursor.status_message(),
            inside,
            mean_velocity
        );
    }

    let stats = cursor.stats();
    println!(
        "\nLines read: {}, reused: {}",
        stats.lines_read, stats.lines_reused
    );

    // Every 4th position, 5 x 5 cube around it; cubes outside the triangle
    // never reach the consumer.
    let config = TraversalConfig::new(5, 5)
        .with_increments(4, 4)
        .with_queue_capacity(2)
        .with_skip_empty(true);
    let cursor = CursorBuilder::new(amplitude)
        .with_region(region)
        .with_config(config.clone())
        .build_neighborhoods()?;
    let centres = cursor.total_work();
    let pipeline = Pipeline::spawn_with_config(cursor, &config)?;

    let mut delivered = 0;
    let mut max_contrast = 0.0f32;
    for cube in pipeline {
        let cube = cube?;
        if let Some(center) = cube.at_offset(0, 0, 0) {
            let neighbors = cube.columns().iter().flatten().count();
            let mean = cube
                .columns()
                .iter()
                .flatten()
                .map(|c| c.samples[50])
                .sum::<f32>()
                / neighbors as f32;
            max_contrast = max_contrast.max((center.samples[50] - mean).abs());
        }
        delivered += 1;
    }
    println!(
        "
Neighborhoods: {} of {} centres delivered, max contrast {:.2}",
        delivered, centres, max_contrast
    );
    Ok(())
}
