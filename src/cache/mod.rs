//! Bounded on-disk cache of normalized images.
//!
//! Entries live in a flat directory keyed by the source filename. Before each
//! admission the total size of the directory is checked against a ceiling;
//! when it is exceeded the whole directory is purged (there is no per-entry
//! eviction) and the new entry is written into the fresh directory.
//!
//! Writes go to a temporary file inside the cache directory and are published
//! with a rename, so [`CacheStore::resolve`] never sees a partial entry.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::models::ImageHandle;

/// Default cache ceiling (50 MiB).
pub const DEFAULT_MAX_CACHE_BYTES: u64 = 50 * 1024 * 1024;

/// Prefix of in-progress writes. Keys never start with a dot.
const PARTIAL_PREFIX: &str = ".partial-";

/// Errors from cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),

    #[error("Cache write failed for {key}: {source}")]
    Write {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// One published cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub location: ImageHandle,
    pub size_bytes: u64,
}

/// Bounded image cache rooted at a single directory.
pub struct CacheStore {
    dir: PathBuf,
    max_bytes: u64,
    /// Serializes admissions so purge-then-write is never interleaved.
    admit_guard: Mutex<()>,
}

impl CacheStore {
    /// Create a cache rooted at `dir`. The directory is created lazily.
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
            admit_guard: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Path an entry for `key` is published at.
    pub fn entry_path(&self, key: &str) -> Result<PathBuf, CacheError> {
        Ok(self.dir.join(sanitize_key(key)?))
    }

    /// Look up an existing entry without touching the normalizer or network.
    pub async fn resolve(&self, key: &str) -> Option<ImageHandle> {
        let path = self.entry_path(key).ok()?;
        match ImageHandle::open(&path).await {
            Ok(handle) => {
                debug!("Cache hit for {}", key);
                Some(handle)
            }
            Err(_) => None,
        }
    }

    /// Write `source` into the cache under `key`, purging the whole cache
    /// first if it has grown past the ceiling.
    pub async fn admit(&self, key: &str, source: &ImageHandle) -> Result<ImageHandle, CacheError> {
        let dest = self.entry_path(key)?;
        let _guard = self.admit_guard.lock().await;

        self.ensure_dir().await?;

        let current = self.total_size().await?;
        if current > self.max_bytes {
            info!(
                "Cache size {} bytes exceeds limit of {} bytes, purging {}",
                current,
                self.max_bytes,
                self.dir.display()
            );
            self.purge_unguarded().await;
            self.ensure_dir().await?;
        }

        let dir = self.dir.clone();
        let src = source.path().to_path_buf();
        let published = dest.clone();
        let size = tokio::task::spawn_blocking(move || publish_copy(&dir, &src, &published))
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
            .map_err(|e| CacheError::Write {
                key: key.to_string(),
                source: e,
            })?;

        debug!("Cached {} ({} bytes)", key, size);
        Ok(ImageHandle::from_parts(dest, size))
    }

    /// Total size in bytes of everything under the cache directory.
    /// A missing directory counts as an empty cache.
    pub async fn total_size(&self) -> Result<u64, CacheError> {
        let dir = self.dir.clone();
        let size = tokio::task::spawn_blocking(move || directory_size(&dir))
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))??;
        Ok(size)
    }

    /// List published entries.
    pub async fn entries(&self) -> Result<Vec<CacheEntry>, CacheError> {
        let mut entries = Vec::new();
        let mut read_dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = read_dir.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let Some(key) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if key.starts_with('.') {
                continue;
            }
            entries.push(CacheEntry {
                location: ImageHandle::from_parts(entry.path(), meta.len()),
                size_bytes: meta.len(),
                key,
            });
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    /// Delete the whole cache directory and recreate it empty.
    pub async fn purge(&self) -> Result<(), CacheError> {
        let _guard = self.admit_guard.lock().await;
        self.purge_unguarded().await;
        self.ensure_dir().await
    }

    /// Remove the directory. Failures are logged; the caller proceeds.
    async fn purge_unguarded(&self) {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to purge cache {}: {}", self.dir.display(), e),
        }
    }

    async fn ensure_dir(&self) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            CacheError::Io(io::Error::new(
                e.kind(),
                format!(
                    "Failed to create cache directory '{}': {}",
                    self.dir.display(),
                    e
                ),
            ))
        })
    }
}

/// Reduce a source filename to a flat cache key.
///
/// Hidden names are rejected: they would collide with in-progress writes and
/// never show up in [`CacheStore::entries`].
fn sanitize_key(key: &str) -> Result<String, CacheError> {
    let name = Path::new(key)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| CacheError::InvalidKey(key.to_string()))?;

    if name.is_empty() || name.starts_with('.') {
        return Err(CacheError::InvalidKey(key.to_string()));
    }
    Ok(name.to_string())
}

/// Copy `src` into a temporary file inside `dir`, then rename it to `dest`.
fn publish_copy(dir: &Path, src: &Path, dest: &Path) -> io::Result<u64> {
    let mut temp = tempfile::Builder::new()
        .prefix(PARTIAL_PREFIX)
        .tempfile_in(dir)?;
    let mut reader = std::fs::File::open(src)?;
    let size = io::copy(&mut reader, temp.as_file_mut())?;
    temp.as_file().sync_all()?;
    temp.persist(dest).map_err(|e| e.error)?;
    Ok(size)
}

fn directory_size(dir: &Path) -> io::Result<u64> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut total = 0;
    for entry in WalkDir::new(dir) {
        let entry = match entry {
            Ok(entry) => entry,
            // Entries can vanish while walking
            Err(e) if e.io_error().map(|io| io.kind()) == Some(io::ErrorKind::NotFound) => {
                continue
            }
            Err(e) => return Err(e.into()),
        };
        if entry.file_type().is_file() {
            total += entry.metadata().map_err(io::Error::from)?.len();
        }
    }
    Ok(total)
}
