//! Utility functions

use crate::error::{BlockError, Result};
use crate::metadata::SAMPLE_BYTES;

/// Path of the metadata document inside a volume
pub const METADATA_PATH: &str = "metadata.json";

/// Encode samples as little-endian f32 bytes
pub fn encode_samples(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Decode little-endian f32 bytes
pub fn decode_samples(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % SAMPLE_BYTES != 0 {
        return Err(BlockError::Corrupt(format!(
            "{} bytes is not a whole number of samples",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(SAMPLE_BYTES)
        .map(|word| f32::from_le_bytes([word[0], word[1], word[2], word[3]]))
        .collect())
}

/// Calculate checksum (CRC32) for data
pub fn calculate_checksum(data: &[u8]) -> u32 {
    let mut crc = 0xFFFFFFFFu32;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xEDB88320
            } else {
                crc >> 1
            };
        }
    }

    !crc
}

/// Format byte size in human-readable form
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", size, UNITS[unit])
    }
}

/// Storage path of the row at A index `a_index`
pub fn row_path(a_index: usize) -> String {
    format!("rows/{:08}.row", a_index)
}
