//! Image handles owned by the pipeline stages.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

/// Reference to an image file on disk.
///
/// A handle is owned by whichever stage currently needs the image. Releasing
/// a handle deletes the underlying file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageHandle {
    path: PathBuf,
    size_bytes: u64,
}

impl ImageHandle {
    /// Build a handle for an existing file, reading its size.
    pub async fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let meta = tokio::fs::metadata(&path).await?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            ));
        }
        Ok(Self {
            path,
            size_bytes: meta.len(),
        })
    }

    /// Build a handle from already known metadata.
    pub fn from_parts(path: PathBuf, size_bytes: u64) -> Self {
        Self { path, size_bytes }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// File name component, used as the cache key for captures.
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    /// Check whether the underlying file still exists.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the image bytes.
    pub async fn read(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }

    /// Delete the underlying file. Best-effort: a missing file is fine and
    /// other failures are only logged.
    pub async fn release(self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!("Released image {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to delete image {}: {}", self.path.display(), e),
        }
    }
}

/// Output of the image normalizer. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedImage {
    pub location: ImageHandle,
    pub width: u32,
    pub height: u32,
    /// Compression quality in (0, 1].
    pub quality: f32,
}

impl NormalizedImage {
    /// Length of the longest edge in pixels.
    pub fn long_edge(&self) -> u32 {
        self.width.max(self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_reads_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, b"12345").unwrap();

        let handle = ImageHandle::open(&path).await.unwrap();
        assert_eq!(handle.size_bytes(), 5);
        assert_eq!(handle.file_name(), Some("photo.jpg"));
        assert!(handle.exists());
    }

    #[tokio::test]
    async fn test_open_rejects_directory() {
        let dir = tempdir().unwrap();
        assert!(ImageHandle::open(dir.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_release_deletes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, b"data").unwrap();

        let handle = ImageHandle::open(&path).await.unwrap();
        handle.release().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_release_missing_file_is_noop() {
        let dir = tempdir().unwrap();
        let handle = ImageHandle::from_parts(dir.path().join("gone.jpg"), 0);
        handle.release().await;
    }
}
