use std::cell::RefCell;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::CacheError;

/// Durable URL → bytes store consulted alongside the network.
///
/// A miss is `Ok(None)`, not an error.
#[async_trait(?Send)]
pub trait CacheStore {
    async fn get(&self, url: &str) -> Result<Option<Arc<[u8]>>, CacheError>;
    async fn put(&self, url: &str, bytes: Arc<[u8]>) -> Result<(), CacheError>;
}

// ── Memory ────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RefCell<HashMap<String, Arc<[u8]>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.borrow().contains_key(url)
    }
}

#[async_trait(?Send)]
impl CacheStore for MemoryCache {
    async fn get(&self, url: &str) -> Result<Option<Arc<[u8]>>, CacheError> {
        Ok(self.entries.borrow().get(url).cloned())
    }

    async fn put(&self, url: &str, bytes: Arc<[u8]>) -> Result<(), CacheError> {
        self.entries.borrow_mut().insert(url.to_string(), bytes);
        Ok(())
    }
}

// ── Disk ──────────────────────────────────────────────────────────────────

/// One file per URL under `dir`, named by the BLAKE3 hash of the URL.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(blake3::hash(url.as_bytes()).to_hex().as_str())
    }
}

#[async_trait(?Send)]
impl CacheStore for DiskCache {
    async fn get(&self, url: &str) -> Result<Option<Arc<[u8]>>, CacheError> {
        let path = self.path_for(url);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes.into())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Read { path, source }),
        }
    }

    async fn put(&self, url: &str, bytes: Arc<[u8]>) -> Result<(), CacheError> {
        let path = self.path_for(url);
        let write = |source| CacheError::Write { path: path.clone(), source };
        tokio::fs::create_dir_all(&self.dir).await.map_err(write)?;
        // Write-then-rename so a concurrent reader never sees a partial file.
        let tmp = path.with_extension("part");
        tokio::fs::write(&tmp, &bytes).await.map_err(write)?;
        tokio::fs::rename(&tmp, &path).await.map_err(write)?;
        Ok(())
    }
}

// ── None ──────────────────────────────────────────────────────────────────

/// Always misses, drops every write.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

#[async_trait(?Send)]
impl CacheStore for NoCache {
    async fn get(&self, _url: &str) -> Result<Option<Arc<[u8]>>, CacheError> {
        Ok(None)
    }

    async fn put(&self, _url: &str, _bytes: Arc<[u8]>) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_cache_round_trip() {
        let cache = MemoryCache::new();
        assert!(cache.get("a").await.unwrap().is_none());
        cache.put("a", Arc::from(&b"xyz"[..])).await.unwrap();
        assert_eq!(cache.get("a").await.unwrap().as_deref(), Some(&b"xyz"[..]));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn disk_cache_miss_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("cache"));
        assert!(cache.get("https://example.com/a.glb").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn disk_cache_persists_under_hashed_name() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("cache"));
        let url = "https://example.com/a.glb";
        cache.put(url, Arc::from(&b"glb"[..])).await.unwrap();

        let path = cache.path_for(url);
        assert_eq!(path.file_name().unwrap().len(), 64);
        assert_eq!(std::fs::read(&path).unwrap(), b"glb");

        let reopened = DiskCache::new(dir.path().join("cache"));
        assert_eq!(reopened.get(url).await.unwrap().as_deref(), Some(&b"glb"[..]));
    }

    #[tokio::test]
    async fn no_cache_never_hits() {
        NoCache.put("a", Arc::from(&b"x"[..])).await.unwrap();
        assert!(NoCache.get("a").await.unwrap().is_none());
    }
}
