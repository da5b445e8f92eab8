//! LRU cache of directory layouts shared across handles.
//!
//! Opening the same file twice should not re-read offset tables or
//! re-validate JPEG tables. Layouts are keyed by file identifier and
//! directory index.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::RwLock;

use super::directory::DirectoryLayout;

/// Default number of directory layouts kept.
pub const DEFAULT_LAYOUT_CACHE_ENTRIES: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirectoryKey {
    pub path: Arc<str>,
    pub directory: usize,
}

impl DirectoryKey {
    pub fn new(path: impl Into<Arc<str>>, directory: usize) -> Self {
        Self {
            path: path.into(),
            directory,
        }
    }
}

pub struct LayoutCache {
    cache: RwLock<LruCache<DirectoryKey, Arc<DirectoryLayout>>>,
}

impl LayoutCache {
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: RwLock::new(LruCache::new(capacity)),
        }
    }

    pub async fn get(&self, key: &DirectoryKey) -> Option<Arc<DirectoryLayout>> {
        // LRU reordering needs the write lock
        self.cache.write().await.get(key).cloned()
    }

    pub async fn insert(&self, key: DirectoryKey, layout: Arc<DirectoryLayout>) {
        self.cache.write().await.put(key, layout);
    }

    /// Drop every layout for `path`, e.g. after the file was replaced.
    pub async fn invalidate(&self, path: &str) {
        let mut cache = self.cache.write().await;
        let stale: Vec<DirectoryKey> = cache
            .iter()
            .filter(|(k, _)| &*k.path == path)
            .map(|(k, _)| k.clone())
            .collect();
        for key in stale {
            cache.pop(&key);
        }
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }
}

impl Default for LayoutCache {
    fn default() -> Self {
        Self::new(DEFAULT_LAYOUT_CACHE_ENTRIES)
    }
}
