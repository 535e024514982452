//! Volume Blocks - windowed block traversal of large 3D volumes
//!
//! Reads disk-resident volumes (two spatial axes A and B plus a sample axis)
//! in bounded-memory blocks, optionally restricted to a spatial region, and
//! streams them to a consumer through a bounded queue fed by a background
//! thread.
//!
//! # Features
//!
//! - Overlapping or abutting blocks with remainder handling at the edges
//! - A-major or B-major traversal; overlapping lines are reused, not re-read
//! - Secondary datasets on the same grid, traversed in lock-step
//! - Region filtering that keeps block shapes rectangular
//! - Neighborhood cubes centred on each grid position, padded at the edges
//! - Bounded producer/consumer pipeline with cancellation
//! - Stored volumes on any `IOManager` backend (local filesystem included)
//!
//! # Example
//!
//! ```rust,ignore
//! use volume_blocks::{CursorBuilder, Pipeline, StoredVolume, TraversalConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let volume = Arc::new(StoredVolume::open("file:///data/survey").await?);
//! let config = TraversalConfig::new(64, 64)
//!     .with_increments(48, 48)
//!     .with_queue_capacity(4);
//! let cursor = CursorBuilder::new(volume)
//!     .with_config(config.clone())
//!     .build_blocks()?;
//!
//! let pipeline = Pipeline::spawn_with_config(cursor, &config)?;
//! tokio::task::spawn_blocking(move || {
//!     for block in pipeline {
//!         let block = block?;
//!         // process block
//!     }
//!     Ok::<_, volume_blocks::BlockError>(())
//! })
//! .await??;
//! # Ok(())
//! # }
//! ```

pub mod block;
pub mod compression;
pub mod config;
pub mod cursor;
pub mod dataset;
pub mod error;
pub mod geometry;
pub mod io;
pub mod logging;
pub mod metadata;
pub mod pipeline;
pub mod progress;
pub mod region;
pub mod slab;
mod strategy;
pub mod stored;
pub mod tiling;
pub mod types;
pub mod utils;

// Re-exports
pub use block::{Block, Column, ColumnSet, Neighborhood, Slice};
pub use compression::{CompressionLevel, CompressionMethod};
pub use config::TraversalConfig;
pub use cursor::{
    BlockCursor, BlockSource, ColumnCursor, CursorBuilder, NeighborhoodCursor, SliceCursor,
};
pub use dataset::{Dataset, MemoryDataset, SampleColumn};
pub use error::{BlockError, Result};
pub use geometry::{GridGeometry, GridTransform};
pub use io::{IOManager, StorageBackend};
pub use metadata::VolumeMetadata;
pub use pipeline::{CancellationToken, Fetched, FillState, Pipeline};
pub use progress::ProgressHandle;
pub use region::{PolygonRegion, RegionFilter, SpatialExtent};
pub use slab::{Direction, TraversalStats};
pub use stored::{StoredVolume, VolumeWriter};
pub use tiling::{AxisTiling, TilingPlan};
pub use types::{AxisRange, TraversalOrder};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
