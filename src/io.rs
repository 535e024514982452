//! I/O managers for stored volumes

use crate::error::{BlockError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Storage backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Local file system
    FileSystem,
    /// Process-local memory, mostly for tests
    Memory,
}

impl StorageBackend {
    /// Parse storage backend from URL scheme
    pub fn from_url(url: &str) -> Result<Self> {
        if let Some(scheme_end) = url.find("://") {
            let scheme = &url[..scheme_end];
            match scheme {
                "file" => Ok(StorageBackend::FileSystem),
                "memory" => Ok(StorageBackend::Memory),
                _ => Err(BlockError::InvalidUrl(format!(
                    "Unknown scheme: {}. Implement IOManager for other storage",
                    scheme
                ))),
            }
        } else {
            // Assume file system if no scheme
            Ok(StorageBackend::FileSystem)
        }
    }
}

/// Object-style storage used by stored volumes
///
/// Paths are relative to the volume root and use `/` separators.
#[async_trait]
pub trait IOManager: Send + Sync {
    /// Read data from a path
    async fn read(&self, path: &str) -> Result<Bytes>;

    /// Write data to a path, replacing any previous content
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Check if a path exists
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Get the size of data at a path
    async fn size(&self, path: &str) -> Result<usize>;

    /// Get the backend type
    fn backend(&self) -> StorageBackend;
}

/// File system I/O manager
pub struct FileSystemIOManager {
    base_path: PathBuf,
}

impl FileSystemIOManager {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }
}

#[async_trait]
impl IOManager for FileSystemIOManager {
    async fn read(&self, path: &str) -> Result<Bytes> {
        let full_path = self.full_path(path);
        let data = fs::read(&full_path).await?;
        Ok(Bytes::from(data))
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&full_path).await?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(fs::try_exists(self.full_path(path)).await?)
    }

    async fn size(&self, path: &str) -> Result<usize> {
        let metadata = fs::metadata(self.full_path(path)).await?;
        Ok(metadata.len() as usize)
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::FileSystem
    }
}

/// In-memory I/O manager
#[derive(Default)]
pub struct MemoryIOManager {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl MemoryIOManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl IOManager for MemoryIOManager {
    async fn read(&self, path: &str) -> Result<Bytes> {
        self.objects
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| BlockError::Storage(format!("No object at {}", path)))
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        self.objects
            .lock()
            .insert(path.to_string(), Bytes::copy_from_slice(data));
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.objects.lock().contains_key(path))
    }

    async fn size(&self, path: &str) -> Result<usize> {
        Ok(self.read(path).await?.len())
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

/// Parse URL and create the matching I/O manager
///
/// `memory://` URLs get a fresh, empty store on every call.
pub fn create_io_manager(url: &str) -> Result<Box<dyn IOManager>> {
    match StorageBackend::from_url(url)? {
        StorageBackend::FileSystem => {
            let path = url.strip_prefix("file://").unwrap_or(url);
            if path.is_empty() {
                return Err(BlockError::InvalidUrl("Empty file path".to_string()));
            }
            Ok(Box::new(FileSystemIOManager::new(path)))
        }
        StorageBackend::Memory => Ok(Box::new(MemoryIOManager::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_system_io() {
        let temp_dir = TempDir::new().unwrap();
        let io = FileSystemIOManager::new(temp_dir.path());

        let data = b"row bytes";
        io.write("rows/00000000.row", data).await.unwrap();

        let read_data = io.read("rows/00000000.row").await.unwrap();
        assert_eq!(&read_data[..], data);

        assert!(io.exists("rows/00000000.row").await.unwrap());
        assert!(!io.exists("rows/00000001.row").await.unwrap());
        assert_eq!(io.size("rows/00000000.row").await.unwrap(), data.len());
        assert!(matches!(
            io.read("missing.row").await,
            Err(BlockError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_io() {
        let io = MemoryIOManager::new();
        assert!(io.is_empty());
        io.write("metadata.json", b"{}").await.unwrap();
        assert_eq!(io.len(), 1);
        assert_eq!(io.size("metadata.json").await.unwrap(), 2);
        assert!(matches!(
            io.read("rows/00000000.row").await,
            Err(BlockError::Storage(_))
        ));
    }

    #[test]
    fn test_backend_from_url() {
        assert_eq!(
            StorageBackend::from_url("file:///data/volume").unwrap(),
            StorageBackend::FileSystem
        );
        assert_eq!(
            StorageBackend::from_url("/data/volume").unwrap(),
            StorageBackend::FileSystem
        );
        assert_eq!(
            StorageBackend::from_url("memory://scratch").unwrap(),
            StorageBackend::Memory
        );
        assert!(matches!(
            StorageBackend::from_url("s3://bucket/volume"),
            Err(BlockError::InvalidUrl(_))
        ));
        assert!(create_io_manager("file://").is_err());
    }
}
