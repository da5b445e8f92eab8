//! Tile service: the entry point hosts call.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       TileService                        │
//! │  get_tile():  open source -> validate -> cache -> render │
//! │  get_thumbnail() / get_region(): open source -> render   │
//! │         │                  │                             │
//! │         ▼                  ▼                             │
//! │   SourceRegistry       TileCache                         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Only tiles are cached; thumbnails and regions are rendered on every call.

use std::sync::Arc;

use tracing::debug;

use crate::error::TileError;
use crate::params::Params;
use crate::source::{SourceRegistry, TileCoord, TileMetadata, TileSource};

use super::cache::{TileCache, TileCacheKey};
use super::encoder::{EncodeOptions, EncodedImage};

// =============================================================================
// Requests and responses
// =============================================================================

#[derive(Debug, Clone)]
pub struct TileRequest {
    /// File identifier, or `test` / `dummy`
    pub source: String,
    pub coord: TileCoord,
    pub params: Params,
}

impl TileRequest {
    pub fn new(source: impl Into<String>, level: i64, x: i64, y: i64) -> Self {
        Self {
            source: source.into(),
            coord: TileCoord::new(level, x, y),
            params: Params::new(),
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

#[derive(Debug, Clone)]
pub struct TileResponse {
    pub image: EncodedImage,
    pub cache_hit: bool,
}

// =============================================================================
// Tile Service
// =============================================================================

pub struct TileService {
    registry: Arc<SourceRegistry>,
    cache: TileCache,
}

impl TileService {
    pub fn new(registry: SourceRegistry) -> Self {
        Self::with_shared_registry(Arc::new(registry))
    }

    pub fn with_shared_registry(registry: Arc<SourceRegistry>) -> Self {
        Self {
            registry,
            cache: TileCache::new(),
        }
    }

    /// `cache_capacity` is in bytes.
    pub fn with_cache_capacity(registry: SourceRegistry, cache_capacity: usize) -> Self {
        Self {
            registry: Arc::new(registry),
            cache: TileCache::with_capacity(cache_capacity),
        }
    }

    pub async fn source(&self, id: &str, params: &Params) -> Result<Arc<dyn TileSource>, TileError> {
        self.registry.open(id, params).await
    }

    pub async fn metadata(&self, id: &str, params: &Params) -> Result<TileMetadata, TileError> {
        Ok(self.source(id, params).await?.metadata())
    }

    /// Get a tile, serving repeats from the cache.
    ///
    /// The coordinate and encode options are validated before the cache is
    /// consulted, so invalid requests never hit it.
    pub async fn get_tile(&self, request: &TileRequest) -> Result<TileResponse, TileError> {
        let source = self.source(&request.source, &request.params).await?;
        let (level, x, y) = request.coord.validate(&source.metadata())?;
        let options = EncodeOptions::from_params(&request.params, &source.encode_defaults())?;

        let key = TileCacheKey::new(
            source.name(),
            level,
            x,
            y,
            options,
            options.allows_passthrough(&request.params),
        );
        if let Some(image) = self.cache.get(&key).await {
            return Ok(TileResponse {
                image,
                cache_hit: true,
            });
        }

        let image = source.get_tile(request.coord, &request.params).await?;
        debug!(
            source = source.name(),
            level,
            x,
            y,
            bytes = image.data.len(),
            "Rendered tile"
        );
        self.cache.put(key, image.clone()).await;

        Ok(TileResponse {
            image,
            cache_hit: false,
        })
    }

    pub async fn get_thumbnail(&self, id: &str, params: &Params) -> Result<EncodedImage, TileError> {
        self.source(id, params).await?.get_thumbnail(params).await
    }

    pub async fn get_region(&self, id: &str, params: &Params) -> Result<EncodedImage, TileError> {
        self.source(id, params).await?.get_region(params).await
    }

    /// Drop an opened file and everything cached for it.
    pub async fn invalidate(&self, id: &str) {
        if let Some(source) = self.registry.evict(id).await {
            self.cache.invalidate_source(source.name()).await;
        }
    }

    /// `(current_size, capacity, entry_count)`
    pub async fn cache_stats(&self) -> (usize, usize, usize) {
        (
            self.cache.size().await,
            self.cache.capacity(),
            self.cache.len().await,
        )
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }
}
