//! Size-bounded LRU cache for encoded tiles.
//!
//! Keys carry everything that changes the output bytes: the source, the
//! tile coordinate, the resolved encode options and whether the stored tile
//! was eligible for passthrough.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::RwLock;

use super::encoder::{EncodeOptions, EncodedImage};

/// Default cache capacity: 100MB
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 100 * 1024 * 1024;

const DEFAULT_MAX_ENTRIES: usize = 10_000;

// =============================================================================
// Cache Key
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileCacheKey {
    pub source: Arc<str>,
    pub level: u32,
    pub tile_x: u32,
    pub tile_y: u32,
    pub options: EncodeOptions,
    pub passthrough: bool,
}

impl TileCacheKey {
    pub fn new(
        source: impl Into<Arc<str>>,
        level: u32,
        tile_x: u32,
        tile_y: u32,
        options: EncodeOptions,
        passthrough: bool,
    ) -> Self {
        Self {
            source: source.into(),
            level,
            tile_x,
            tile_y,
            options,
            passthrough,
        }
    }
}

// =============================================================================
// Tile Cache
// =============================================================================

struct CacheState {
    entries: LruCache<TileCacheKey, EncodedImage>,
    size: usize,
}

/// LRU cache of encoded tiles, evicting by total byte size.
pub struct TileCache {
    state: RwLock<CacheState>,
    max_size: usize,
}

impl TileCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TILE_CACHE_CAPACITY)
    }

    /// Capacity in bytes.
    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity_and_entries(max_size: usize, max_entries: usize) -> Self {
        let entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: RwLock::new(CacheState {
                entries: LruCache::new(entries),
                size: 0,
            }),
            max_size,
        }
    }

    /// Marks the entry as recently used.
    pub async fn get(&self, key: &TileCacheKey) -> Option<EncodedImage> {
        self.state.write().await.entries.get(key).cloned()
    }

    pub async fn contains(&self, key: &TileCacheKey) -> bool {
        self.state.read().await.entries.contains(key)
    }

    /// Insert, then evict least-recently-used entries until the total size
    /// fits.
    pub async fn put(&self, key: TileCacheKey, image: EncodedImage) {
        let mut state = self.state.write().await;
        let added = image.data.len();

        // Either the replaced value for `key` or an entry dropped by the
        // entry-count cap
        if let Some((_, displaced)) = state.entries.push(key, image) {
            state.size = state.size.saturating_sub(displaced.data.len());
        }
        state.size += added;

        while state.size > self.max_size {
            match state.entries.pop_lru() {
                Some((_, evicted)) => {
                    state.size = state.size.saturating_sub(evicted.data.len());
                }
                None => break,
            }
        }
    }

    pub async fn remove(&self, key: &TileCacheKey) -> Option<EncodedImage> {
        let mut state = self.state.write().await;
        let removed = state.entries.pop(key)?;
        state.size = state.size.saturating_sub(removed.data.len());
        Some(removed)
    }

    /// Drop every tile of one source.
    pub async fn invalidate_source(&self, source: &str) {
        let mut state = self.state.write().await;
        let stale: Vec<TileCacheKey> = state
            .entries
            .iter()
            .filter(|(k, _)| &*k.source == source)
            .map(|(k, _)| k.clone())
            .collect();
        for key in stale {
            if let Some(removed) = state.entries.pop(&key) {
                state.size = state.size.saturating_sub(removed.data.len());
            }
        }
    }

    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.size = 0;
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    /// Total cached bytes.
    pub async fn size(&self) -> usize {
        self.state.read().await.size
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new()
    }
}
