//! Stored volume metadata (`metadata.json`)

use crate::compression::{CompressionLevel, CompressionMethod};
use crate::error::{BlockError, Result};
use crate::geometry::GridGeometry;
use crate::types::TraversalOrder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Bytes per stored sample (little-endian f32)
pub const SAMPLE_BYTES: usize = 4;

/// On-disk format version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatVersion {
    pub major: u16,
    pub minor: u16,
}

impl FormatVersion {
    pub const CURRENT: Self = Self { major: 1, minor: 0 };

    pub fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    pub fn is_compatible(&self, other: &Self) -> bool {
        self.major == other.major
    }
}

impl Default for FormatVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// Complete metadata for a stored volume
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeMetadata {
    pub version: FormatVersion,

    pub volume_id: Uuid,

    pub name: String,

    pub geometry: GridGeometry,

    /// Order the rows were written in; rows along A are cheapest to read
    pub preferred_order: TraversalOrder,

    pub compression: CompressionMethod,

    pub compression_level: CompressionLevel,

    pub created_at: DateTime<Utc>,

    pub modified_at: DateTime<Utc>,

    /// One entry per written row, indexed by A
    pub rows: Vec<RowMetadata>,

    #[serde(default)]
    pub custom_metadata: HashMap<String, String>,
}

impl VolumeMetadata {
    pub fn new(name: impl Into<String>, geometry: GridGeometry) -> Self {
        let now = Utc::now();
        Self {
            version: FormatVersion::default(),
            volume_id: Uuid::new_v4(),
            name: name.into(),
            geometry,
            preferred_order: TraversalOrder::AMajor,
            compression: CompressionMethod::default(),
            compression_level: CompressionLevel::default(),
            created_at: now,
            modified_at: now,
            rows: Vec::new(),
            custom_metadata: HashMap::new(),
        }
    }

    pub fn with_compression(mut self, method: CompressionMethod, level: CompressionLevel) -> Self {
        self.compression = method;
        self.compression_level = level;
        self
    }

    pub fn with_preferred_order(mut self, order: TraversalOrder) -> Self {
        self.preferred_order = order;
        self
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.custom_metadata.insert(key.into(), value.into());
    }

    pub fn get_metadata(&self, key: &str) -> Option<&str> {
        self.custom_metadata.get(key).map(|s| s.as_str())
    }

    /// Update modification timestamp
    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }

    /// Uncompressed size of one row: every B position, every sample
    pub fn row_bytes(&self) -> usize {
        self.geometry.num_b() * self.geometry.num_samples() * SAMPLE_BYTES
    }

    /// True once every row along A has been written
    pub fn is_complete(&self) -> bool {
        self.rows.len() == self.geometry.num_a()
    }

    pub fn row(&self, a_index: usize) -> Result<&RowMetadata> {
        self.rows.get(a_index).ok_or_else(|| {
            BlockError::OutOfBounds(format!(
                "Row {} not in volume {} ({} rows)",
                a_index,
                self.name,
                self.rows.len()
            ))
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and check a complete metadata document
    pub fn from_json(json: &str) -> Result<Self> {
        let metadata: Self = serde_json::from_str(json)?;

        if !metadata.version.is_compatible(&FormatVersion::CURRENT) {
            return Err(BlockError::Storage(format!(
                "Unsupported format version {}.{}",
                metadata.version.major, metadata.version.minor
            )));
        }
        metadata.geometry.validate()?;
        if !metadata.is_complete() {
            return Err(BlockError::Corrupt(format!(
                "Volume {} lists {} of {} rows",
                metadata.name,
                metadata.rows.len(),
                metadata.geometry.num_a()
            )));
        }
        let row_bytes = metadata.row_bytes();
        if let Some(row) = metadata.rows.iter().find(|r| r.uncompressed_size != row_bytes) {
            return Err(BlockError::Corrupt(format!(
                "Row {} declares {} bytes, geometry needs {}",
                row.index, row.uncompressed_size, row_bytes
            )));
        }

        Ok(metadata)
    }
}

/// Size and checksum of one stored row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowMetadata {
    pub index: usize,

    pub compressed_size: usize,

    pub uncompressed_size: usize,

    /// CRC32 of the compressed bytes
    pub checksum: u32,
}

impl RowMetadata {
    pub fn compression_ratio(&self) -> f64 {
        if self.compressed_size == 0 {
            0.0
        } else {
            self.uncompressed_size as f64 / self.compressed_size as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AxisRange;

    fn create_test_metadata() -> VolumeMetadata {
        let geometry = GridGeometry::new(
            AxisRange::with_count("Inline", 1000.0, 1.0, 2).unwrap(),
            AxisRange::with_count("Crossline", 2000.0, 1.0, 3).unwrap(),
            AxisRange::with_count("Time", 0.0, 4.0, 10).unwrap(),
        );
        let mut metadata = VolumeMetadata::new("survey", geometry);
        let row_bytes = metadata.row_bytes();
        metadata.rows = (0..2)
            .map(|index| RowMetadata {
                index,
                compressed_size: row_bytes / 4,
                uncompressed_size: row_bytes,
                checksum: 0,
            })
            .collect();
        metadata
    }

    #[test]
    fn test_version_compatibility() {
        assert!(FormatVersion::new(1, 0).is_compatible(&FormatVersion::new(1, 3)));
        assert!(!FormatVersion::new(1, 0).is_compatible(&FormatVersion::new(2, 0)));
    }

    #[test]
    fn test_json_round_trip_keeps_identity() {
        let mut metadata = create_test_metadata();
        metadata.add_metadata("project", "North Sea");
        assert_eq!(metadata.row_bytes(), 3 * 10 * SAMPLE_BYTES);

        let parsed = VolumeMetadata::from_json(&metadata.to_json().unwrap()).unwrap();
        assert_eq!(parsed.volume_id, metadata.volume_id);
        assert_eq!(parsed.geometry, metadata.geometry);
        assert_eq!(parsed.get_metadata("project"), Some("North Sea"));
        assert_eq!(parsed.row(1).unwrap().compression_ratio(), 4.0);
        assert!(parsed.row(2).is_err());
    }

    #[test]
    fn test_incomplete_volume_rejected() {
        let mut metadata = create_test_metadata();
        metadata.rows.pop();
        let err = VolumeMetadata::from_json(&metadata.to_json().unwrap()).unwrap_err();
        assert!(matches!(err, BlockError::Corrupt(_)));
    }

    #[test]
    fn test_wrong_row_size_rejected() {
        let mut metadata = create_test_metadata();
        metadata.rows[1].uncompressed_size += SAMPLE_BYTES;
        assert!(matches!(
            VolumeMetadata::from_json(&metadata.to_json().unwrap()),
            Err(BlockError::Corrupt(_))
        ));
    }
}
