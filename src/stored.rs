//! Stored volumes - a [`Dataset`] backed by an [`IOManager`]
//!
//! Layout under the volume root:
//!
//! ```text
//! metadata.json        VolumeMetadata (serde_json)
//! rows/00000000.row    row A=0: compressed little-endian f32, B x samples
//! rows/00000001.row    ...
//! ```
//!
//! Storage is async; the [`Dataset`] methods are not. A volume remembers the
//! tokio runtime it was opened on and blocks on that runtime for each read,
//! so traversals must run on a plain thread (a pipeline production thread or
//! `tokio::task::spawn_blocking`), never directly on an async worker.

use crate::dataset::{check_request, Dataset, SampleColumn};
use crate::error::{BlockError, Result};
use crate::geometry::GridGeometry;
use crate::io::{create_io_manager, IOManager};
use crate::metadata::{RowMetadata, VolumeMetadata};
use crate::types::TraversalOrder;
use crate::utils::{calculate_checksum, decode_samples, encode_samples, row_path, METADATA_PATH};
use futures::future::try_join_all;
use ndarray::{Array3, Axis};
use std::ops::Range;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Read-only stored volume
pub struct StoredVolume {
    metadata: VolumeMetadata,
    io_manager: Arc<dyn IOManager>,
    runtime: Handle,
}

impl StoredVolume {
    /// Open the volume at `url` (`file://...` or a plain path)
    pub async fn open(url: &str) -> Result<Self> {
        let io_manager: Arc<dyn IOManager> = Arc::from(create_io_manager(url)?);
        Self::open_with(io_manager).await
    }

    /// Open a volume through an existing I/O manager
    pub async fn open_with(io_manager: Arc<dyn IOManager>) -> Result<Self> {
        let metadata_bytes = io_manager.read(METADATA_PATH).await?;
        let json = std::str::from_utf8(&metadata_bytes)
            .map_err(|e| BlockError::Serialization(e.to_string()))?;
        let metadata = VolumeMetadata::from_json(json)?;
        let runtime = Handle::try_current()
            .map_err(|e| BlockError::Configuration(format!("No tokio runtime: {}", e)))?;

        debug!(
            name = %metadata.name,
            volume_id = %metadata.volume_id,
            geometry = %metadata.geometry.summary(),
            compression = ?metadata.compression,
            "opened stored volume"
        );

        Ok(Self {
            metadata,
            io_manager,
            runtime,
        })
    }

    pub fn metadata(&self) -> &VolumeMetadata {
        &self.metadata
    }

    /// Read and decode one full row (B x samples)
    pub async fn read_row_samples(&self, a_index: usize) -> Result<Vec<f32>> {
        let row = self.metadata.row(a_index)?;
        let compressed = self.io_manager.read(&row_path(a_index)).await?;
        verify_row(&self.metadata.name, row, &compressed)?;

        let compressor = self.metadata.compression.compressor();
        let bytes = compressor.decompress(&compressed, row.uncompressed_size)?;
        decode_samples(&bytes)
    }

    /// Read several full rows concurrently
    pub async fn read_rows(&self, rows: Range<usize>) -> Result<Vec<Vec<f32>>> {
        try_join_all(rows.map(|a| self.read_row_samples(a))).await
    }

    fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        let _guard = self.runtime.enter();
        futures::executor::block_on(future)
    }

    fn column(&self, a_index: usize, b_index: usize, row: &[f32], samples: &Range<usize>) -> SampleColumn {
        let g = &self.metadata.geometry;
        let offset = b_index * g.num_samples();
        let (x, y) = g.xy_at(a_index, b_index);
        SampleColumn {
            a_index,
            b_index,
            x,
            y,
            z_start: g.sample_axis.value_at(samples.start),
            z_delta: g.sample_axis.delta,
            samples: row[offset + samples.start..offset + samples.end].to_vec(),
        }
    }
}

fn verify_row(volume: &str, row: &RowMetadata, compressed: &[u8]) -> Result<()> {
    if compressed.len() != row.compressed_size {
        warn!(volume, row = row.index, "stored row has the wrong size");
        return Err(BlockError::Corrupt(format!(
            "Row {} of {} is {} bytes, expected {}",
            row.index,
            volume,
            compressed.len(),
            row.compressed_size
        )));
    }
    let checksum = calculate_checksum(compressed);
    if checksum != row.checksum {
        warn!(volume, row = row.index, "stored row failed its checksum");
        return Err(BlockError::Corrupt(format!(
            "Row {} of {} has checksum {:08x}, expected {:08x}",
            row.index, volume, checksum, row.checksum
        )));
    }
    Ok(())
}

impl Dataset for StoredVolume {
    fn name(&self) -> &str {
        &self.metadata.name
    }

    fn geometry(&self) -> &GridGeometry {
        &self.metadata.geometry
    }

    fn preferred_order(&self) -> TraversalOrder {
        self.metadata.preferred_order
    }

    fn read_row(
        &self,
        a_index: usize,
        b_range: Range<usize>,
        samples: Range<usize>,
    ) -> Result<Vec<SampleColumn>> {
        let g = self.geometry();
        check_request(g, a_index, g.num_a(), &b_range, g.num_b(), &samples)?;

        let row = self.block_on(self.read_row_samples(a_index))?;
        Ok(b_range
            .map(|b| self.column(a_index, b, &row, &samples))
            .collect())
    }

    /// Reads every row the column crosses; prefer A-major traversal
    fn read_column(
        &self,
        b_index: usize,
        a_range: Range<usize>,
        samples: Range<usize>,
    ) -> Result<Vec<SampleColumn>> {
        let g = self.geometry();
        check_request(g, b_index, g.num_b(), &a_range, g.num_a(), &samples)?;

        let rows = self.block_on(self.read_rows(a_range.clone()))?;
        Ok(a_range
            .zip(rows)
            .map(|(a, row)| self.column(a, b_index, &row, &samples))
            .collect())
    }
}

/// Writes a volume row by row, then its metadata
pub struct VolumeWriter {
    metadata: VolumeMetadata,
    io_manager: Arc<dyn IOManager>,
}

impl VolumeWriter {
    /// Start a volume at `url`; any existing volume there is overwritten
    pub fn create(url: &str, metadata: VolumeMetadata) -> Result<Self> {
        let io_manager: Arc<dyn IOManager> = Arc::from(create_io_manager(url)?);
        Self::with_io_manager(io_manager, metadata)
    }

    pub fn with_io_manager(io_manager: Arc<dyn IOManager>, mut metadata: VolumeMetadata) -> Result<Self> {
        metadata.geometry.validate()?;
        metadata.rows.clear();
        Ok(Self {
            metadata,
            io_manager,
        })
    }

    /// Rows written so far
    pub fn rows_written(&self) -> usize {
        self.metadata.rows.len()
    }

    /// Append the next row: `num_b * num_samples` values, B-major within the row
    pub async fn write_row(&mut self, samples: &[f32]) -> Result<()> {
        let g = &self.metadata.geometry;
        let a_index = self.metadata.rows.len();
        if a_index >= g.num_a() {
            return Err(BlockError::OutOfBounds(format!(
                "Volume {} already has all {} rows",
                self.metadata.name,
                g.num_a()
            )));
        }
        let expected = g.num_b() * g.num_samples();
        if samples.len() != expected {
            return Err(BlockError::InvalidArgument(format!(
                "Row {} has {} samples, expected {}",
                a_index,
                samples.len(),
                expected
            )));
        }

        let bytes = encode_samples(samples);
        let compressor = self.metadata.compression.compressor();
        let compressed = compressor.compress(&bytes, self.metadata.compression_level)?;
        self.io_manager.write(&row_path(a_index), &compressed).await?;

        self.metadata.rows.push(RowMetadata {
            index: a_index,
            compressed_size: compressed.len(),
            uncompressed_size: bytes.len(),
            checksum: calculate_checksum(&compressed),
        });
        Ok(())
    }

    /// Write every row of an array shaped (A, B, sample)
    pub async fn write_array(&mut self, data: &Array3<f32>) -> Result<()> {
        let g = &self.metadata.geometry;
        let expected = (g.num_a(), g.num_b(), g.num_samples());
        if data.dim() != expected {
            return Err(BlockError::InvalidArgument(format!(
                "Array shape {:?} does not match geometry {:?}",
                data.dim(),
                expected
            )));
        }
        for row in data.axis_iter(Axis(0)).skip(self.metadata.rows.len()) {
            let samples: Vec<f32> = row.iter().copied().collect();
            self.write_row(&samples).await?;
        }
        Ok(())
    }

    /// Write the metadata document; fails unless every row was written
    pub async fn finish(mut self) -> Result<VolumeMetadata> {
        if !self.metadata.is_complete() {
            return Err(BlockError::Storage(format!(
                "Volume {} has {} of {} rows",
                self.metadata.name,
                self.metadata.rows.len(),
                self.metadata.geometry.num_a()
            )));
        }
        self.metadata.touch();
        self.io_manager
            .write(METADATA_PATH, self.metadata.to_json()?.as_bytes())
            .await?;

        debug!(
            name = %self.metadata.name,
            rows = self.metadata.rows.len(),
            "stored volume written"
        );
        Ok(self.metadata)
    }
}
