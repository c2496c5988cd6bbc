use std::io;
use std::path::PathBuf;

use log::{debug, warn};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use super::key::CacheKey;

const ENTRY_EXTENSION: &str = "jpg";
const PARTIAL_SUFFIX: &str = ".part";

/// Disk-backed store for fetched images, one file per cache key.
///
/// Entries are written through a [`WriteSink`] that stages bytes in a
/// sibling `.part` file and renames it into place on commit, so a completed
/// entry path never holds a half-written body.
#[derive(Debug, Clone)]
pub struct ImageCache {
    root: PathBuf,
}

impl ImageCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let cache = Self { root: root.into() };
        cache.sweep_partials();
        cache
    }

    /// Path of the completed entry for `key`.
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(format!("{}.{}", key.as_str(), ENTRY_EXTENSION))
    }

    fn partial_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(format!(
            "{}.{}{}",
            key.as_str(),
            ENTRY_EXTENSION,
            PARTIAL_SUFFIX
        ))
    }

    /// Whether a completed entry exists for `key`.
    ///
    /// A zero-length file can only be the leftover of an interrupted write
    /// and is treated as absent.
    pub async fn exists(&self, key: &CacheKey) -> bool {
        match fs::metadata(self.entry_path(key)).await {
            Ok(meta) => meta.is_file() && meta.len() > 0,
            Err(_) => false,
        }
    }

    /// Opens the completed entry for `key`, returning the file and its size.
    pub async fn serve(&self, key: &CacheKey) -> io::Result<(File, u64)> {
        let file = File::open(self.entry_path(key)).await?;
        let len = file.metadata().await?.len();
        Ok((file, len))
    }

    /// Creates a write sink for `key`, creating the cache directory if
    /// needed. The entry only becomes visible to [`ImageCache::exists`] once
    /// the sink is committed.
    pub async fn open_write_sink(&self, key: &CacheKey) -> io::Result<WriteSink> {
        fs::create_dir_all(&self.root).await?;
        let partial = self.partial_path(key);
        let file = File::create(&partial).await?;
        Ok(WriteSink {
            file,
            partial,
            target: self.entry_path(key),
        })
    }

    /// Deletes the entry for `key` if present.
    pub async fn remove(&self, key: &CacheKey) {
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => debug!("removed cache entry {}", key),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!("failed to remove cache entry {}: {}", key, err),
        }
    }

    // Partial files survive a killed process; nothing will ever finish them.
    fn sweep_partials(&self) {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(_) => return,
        };
        let mut removed = 0usize;
        for entry in entries.flatten() {
            if entry.file_name().to_string_lossy().ends_with(PARTIAL_SUFFIX)
                && std::fs::remove_file(entry.path()).is_ok()
            {
                removed += 1;
            }
        }
        if removed > 0 {
            warn!(
                "removed {} stale partial files from {}",
                removed,
                self.root.display()
            );
        }
    }
}

/// Write handle for a cache entry under construction.
///
/// Must be consumed with [`WriteSink::commit`] or [`WriteSink::discard`];
/// the staged file is not published until commit.
pub struct WriteSink {
    file: File,
    partial: PathBuf,
    target: PathBuf,
}

impl WriteSink {
    pub async fn write_all(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.write_all(chunk).await
    }

    /// Flushes the staged file and atomically renames it to the entry path.
    pub async fn commit(self) -> io::Result<()> {
        let WriteSink {
            mut file,
            partial,
            target,
        } = self;
        let flushed = file.flush().await;
        drop(file);
        let result = match flushed {
            Ok(()) => fs::rename(&partial, &target).await,
            Err(err) => Err(err),
        };
        if result.is_err() {
            let _ = fs::remove_file(&partial).await;
        }
        result
    }

    /// Abandons the write and deletes the staged file.
    pub async fn discard(self) {
        let WriteSink { file, partial, .. } = self;
        drop(file);
        match fs::remove_file(&partial).await {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                "failed to remove partial file {}: {}",
                partial.display(),
                err
            ),
        }
    }
}
