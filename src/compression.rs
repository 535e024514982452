//! Compression of stored rows

use crate::error::{BlockError, Result};
use flate2::read::{DeflateDecoder, DeflateEncoder};
use flate2::Compression as FlateCompression;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Compression applied to each stored row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionMethod {
    None,
    Deflate,
    #[default]
    Zstd,
    /// Run-length encoding of 4-byte sample words; suits dead (constant) columns
    Rle,
}

impl CompressionMethod {
    pub fn compressor(self) -> Box<dyn Compressor> {
        match self {
            CompressionMethod::None => Box::new(NoneCompressor),
            CompressionMethod::Deflate => Box::new(DeflateCompressor),
            CompressionMethod::Zstd => Box::new(ZstdCompressor),
            CompressionMethod::Rle => Box::new(RleCompressor),
        }
    }
}

/// Compression level (0-9)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    pub fn new(level: u8) -> Self {
        Self(level.min(9))
    }

    pub fn fast() -> Self {
        Self(1)
    }

    pub fn best() -> Self {
        Self(9)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self(3)
    }
}

pub trait Compressor: Send + Sync {
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>>;

    /// Decompress `data`; fails if the result is not `expected_size` bytes
    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>>;

    fn method(&self) -> CompressionMethod;
}

fn check_size(method: CompressionMethod, data: Vec<u8>, expected_size: usize) -> Result<Vec<u8>> {
    if data.len() != expected_size {
        return Err(BlockError::Decompression(format!(
            "{:?} row decoded to {} bytes, expected {}",
            method,
            data.len(),
            expected_size
        )));
    }
    Ok(data)
}

#[derive(Debug, Default)]
pub struct NoneCompressor;

impl Compressor for NoneCompressor {
    fn compress(&self, data: &[u8], _level: CompressionLevel) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        check_size(self.method(), data.to_vec(), expected_size)
    }

    fn method(&self) -> CompressionMethod {
        CompressionMethod::None
    }
}

#[derive(Debug, Default)]
pub struct DeflateCompressor;

impl Compressor for DeflateCompressor {
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(data, FlateCompression::new(level.value() as u32));
        let mut compressed = Vec::new();
        encoder
            .read_to_end(&mut compressed)
            .map_err(|e| BlockError::Compression(e.to_string()))?;
        Ok(compressed)
    }

    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        let mut decompressed = Vec::with_capacity(expected_size);
        DeflateDecoder::new(data)
            .read_to_end(&mut decompressed)
            .map_err(|e| BlockError::Decompression(e.to_string()))?;
        check_size(self.method(), decompressed, expected_size)
    }

    fn method(&self) -> CompressionMethod {
        CompressionMethod::Deflate
    }
}

#[derive(Debug, Default)]
pub struct ZstdCompressor;

impl Compressor for ZstdCompressor {
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
        zstd::encode_all(data, level.value() as i32)
            .map_err(|e| BlockError::Compression(e.to_string()))
    }

    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        let decompressed =
            zstd::decode_all(data).map_err(|e| BlockError::Decompression(e.to_string()))?;
        check_size(self.method(), decompressed, expected_size)
    }

    fn method(&self) -> CompressionMethod {
        CompressionMethod::Zstd
    }
}

/// Runs of identical 4-byte words, encoded as (run length, word)
#[derive(Debug, Default)]
pub struct RleCompressor;

const WORD: usize = 4;

impl Compressor for RleCompressor {
    fn compress(&self, data: &[u8], _level: CompressionLevel) -> Result<Vec<u8>> {
        if data.len() % WORD != 0 {
            return Err(BlockError::Compression(format!(
                "RLE input of {} bytes is not a whole number of samples",
                data.len()
            )));
        }

        let mut compressed = Vec::new();
        let mut words = data.chunks_exact(WORD).peekable();
        while let Some(word) = words.next() {
            let mut run = 1u8;
            while run < u8::MAX && words.peek() == Some(&word) {
                words.next();
                run += 1;
            }
            compressed.push(run);
            compressed.extend_from_slice(word);
        }
        Ok(compressed)
    }

    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        if data.len() % (WORD + 1) != 0 {
            return Err(BlockError::Decompression(
                "RLE stream is truncated".to_string(),
            ));
        }

        let mut decompressed = Vec::with_capacity(expected_size);
        for entry in data.chunks_exact(WORD + 1) {
            for _ in 0..entry[0] {
                decompressed.extend_from_slice(&entry[1..]);
            }
        }
        check_size(self.method(), decompressed, expected_size)
    }

    fn method(&self) -> CompressionMethod {
        CompressionMethod::Rle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bytes() -> Vec<u8> {
        let mut data: Vec<u8> = (0..64u32).flat_map(|i| (i as f32).to_le_bytes()).collect();
        data.extend(std::iter::repeat(0u8).take(4 * 300));
        data
    }

    #[test]
    fn test_all_methods_restore_input() {
        let data = sample_bytes();
        for method in [
            CompressionMethod::None,
            CompressionMethod::Deflate,
            CompressionMethod::Zstd,
            CompressionMethod::Rle,
        ] {
            let compressor = method.compressor();
            assert_eq!(compressor.method(), method);
            let compressed = compressor
                .compress(&data, CompressionLevel::default())
                .unwrap();
            let restored = compressor.decompress(&compressed, data.len()).unwrap();
            assert_eq!(restored, data, "{:?}", method);
        }
    }

    #[test]
    fn test_rle_collapses_dead_columns() {
        let dead = vec![0u8; 4 * 1000];
        let compressed = RleCompressor
            .compress(&dead, CompressionLevel::default())
            .unwrap();
        // 1000 words in runs of at most 255
        assert_eq!(compressed.len(), 4 * (WORD + 1));
        assert!(RleCompressor
            .compress(&[1, 2, 3], CompressionLevel::default())
            .is_err());
    }

    #[test]
    fn test_size_mismatch_detected() {
        let data = sample_bytes();
        let compressed = ZstdCompressor
            .compress(&data, CompressionLevel::fast())
            .unwrap();
        assert!(matches!(
            ZstdCompressor.decompress(&compressed, data.len() - 4),
            Err(BlockError::Decompression(_))
        ));
        assert!(RleCompressor.decompress(&[1, 0, 0], 4).is_err());
    }

    #[test]
    fn test_method_serde_names() {
        assert_eq!(
            serde_json::to_string(&CompressionMethod::Rle).unwrap(),
            "\"rle\""
        );
        assert_eq!(CompressionMethod::default(), CompressionMethod::Zstd);
    }
}
