//! Example: stream overlapping blocks of a stored volume through the pipeline
//!
//! Run with: RUST_LOG=volume_blocks=debug cargo run --example stream_volume

use ndarray::Array3;
use std::sync::Arc;
use std::time::{Duration, Instant};
use volume_blocks::logging::{init_tracing, LogConfig};
use volume_blocks::utils::format_bytes;
use volume_blocks::{
    AxisRange, CompressionLevel, CompressionMethod, CursorBuilder, Fetched, GridGeometry,
    GridTransform, Pipeline, StoredVolume, TraversalConfig, VolumeMetadata, VolumeWriter,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(LogConfig::default())?;

    println!("Volume Blocks Streaming Demo");
    println!("============================\n");

    let dir = tempfile::TempDir::new()?;
    let url = format!("file://{}", dir.path().display());

    // 120 inlines x 80 crosslines x 250 samples
    let geometry = GridGeometry::new(
        AxisRange::with_count("Inline", 1000.0, 1.0, 120)?,
        AxisRange::with_count("Crossline", 2000.0, 1.0, 80)?,
        AxisRange::with_count("Time", 0.0, 4.0, 250)?,
    )
    .with_transform(GridTransform::axis_aligned((450_000.0, 6_780_000.0), 25.0, 12.5));

    let data = Array3::from_shape_fn((120, 80, 250), |(a, b, s)| {
        ((a as f32 * 0.05).sin() + (b as f32 * 0.08).cos()) * (s as f32 * 0.1).sin()
    });
    let metadata = VolumeMetadata::new("synthetic", geometry)
        .with_compression(CompressionMethod::Zstd, CompressionLevel::fast());
    let mut writer = VolumeWriter::create(&url, metadata)?;
    writer.write_array(&data).await?;
    let metadata = writer.finish().await?;
    let stored_bytes: usize = metadata.rows.iter().map(|r| r.compressed_size).sum();
    println!(
        "Wrote volume {} ({} rows, {} on disk)",
        metadata.volume_id,
        metadata.rows.len(),
        format_bytes(stored_bytes)
    );

    let volume = Arc::new(StoredVolume::open(&url).await?);
    let config = TraversalConfig::new(32, 32)
        .with_increments(24, 24)
        .with_sample_range(200.0, 600.0)
        .with_queue_capacity(4);
    let cursor = CursorBuilder::new(volume)
        .with_config(config.clone())
        .build_blocks()?;
    println!(
        "Plan: {} blocks along Inline x {} along Crossline\n",
        cursor.plan().a.num_loops(),
        cursor.plan().b.num_loops()
    );

    let pipeline = Pipeline::spawn_with_config(cursor, &config)?;
    let progress = pipeline.progress();
    let reporter = tokio::spawn(async move {
        while !progress.is_done() {
            println!("  [{:3}%] {}", progress.completion(), progress.status_message());
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    });

    let start = Instant::now();
    let (blocks, energy) = tokio::task::spawn_blocking(move || {
        let mut blocks = 0usize;
        let mut energy = 0.0f64;
        while let Fetched::Item(block) = pipeline.get()? {
            for column in block.columns().iter().flatten() {
                energy += column.samples.iter().map(|s| (*s as f64).powi(2)).sum::<f64>();
            }
            blocks += 1;
            // Simulated downstream work
            std::thread::sleep(Duration::from_millis(2));
        }
        Ok::<_, volume_blocks::BlockError>((blocks, energy))
    })
    .await??;
    reporter.abort();

    println!("\nConsumed {} blocks in {:?}", blocks, start.elapsed());
    println!("Total energy: {:.3}", energy);
    Ok(())
}
