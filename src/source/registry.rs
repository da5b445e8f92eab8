//! Source registry: opens identifiers as tile sources and keeps them.
//!
//! File-backed identifiers are resolved through a [`StorageResolver`], their
//! leading bytes sniffed, and then handed to a fixed, ordered list of
//! probes. The first probe that accepts the container and opens it wins;
//! if every accepting probe fails, the first failure is returned.
//!
//! The names `test` and `dummy` select the synthetic and placeholder
//! sources. They are rebuilt per call since their options come with the
//! request.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::TileError;
use crate::format::tiff::{LayoutCache, DEFAULT_LAYOUT_CACHE_ENTRIES};
use crate::format::{sniff, ContainerFormat};
use crate::io::FileRangeReader;
use crate::params::Params;
use crate::tile::encoder::EncodeOptions;

use super::dummy::DummyTileSource;
use super::raster::{RasterTileSource, DEFAULT_RASTER_TILE_SIZE};
use super::storage::StorageResolver;
use super::synthetic::SyntheticTileSource;
use super::tiff::TiffTileSource;
use super::tile_source::TileSource;

/// Default number of open file sources kept.
pub const DEFAULT_SOURCE_CACHE_CAPACITY: usize = 64;

pub const TEST_SOURCE: &str = "test";

pub const DUMMY_SOURCE: &str = "dummy";

/// Settings applied to every source the registry opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceOptions {
    pub raster_tile_size: u32,
    pub encode: EncodeOptions,
    pub layout_cache_entries: usize,
    pub source_cache_entries: usize,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            raster_tile_size: DEFAULT_RASTER_TILE_SIZE,
            encode: EncodeOptions::default(),
            layout_cache_entries: DEFAULT_LAYOUT_CACHE_ENTRIES,
            source_cache_entries: DEFAULT_SOURCE_CACHE_CAPACITY,
        }
    }
}

// =============================================================================
// Probes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Tiff,
    Raster,
}

struct Probe {
    name: &'static str,
    accepts: fn(ContainerFormat) -> bool,
    kind: SourceKind,
}

fn is_tiff(format: ContainerFormat) -> bool {
    format == ContainerFormat::Tiff
}

fn is_raster(format: ContainerFormat) -> bool {
    format.is_raster()
}

/// Tried in order.
const FILE_PROBES: &[Probe] = &[
    Probe {
        name: "tiff",
        accepts: is_tiff,
        kind: SourceKind::Tiff,
    },
    Probe {
        name: "raster",
        accepts: is_raster,
        kind: SourceKind::Raster,
    },
];

// =============================================================================
// Registry
// =============================================================================

pub struct SourceRegistry {
    storage: Arc<dyn StorageResolver>,
    options: SourceOptions,
    layouts: LayoutCache,
    open: RwLock<LruCache<String, Arc<dyn TileSource>>>,
}

impl SourceRegistry {
    pub fn new(storage: Arc<dyn StorageResolver>, options: SourceOptions) -> Self {
        let capacity =
            NonZeroUsize::new(options.source_cache_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            storage,
            layouts: LayoutCache::new(options.layout_cache_entries),
            options,
            open: RwLock::new(LruCache::new(capacity)),
        }
    }

    pub fn options(&self) -> &SourceOptions {
        &self.options
    }

    pub fn layout_cache(&self) -> &LayoutCache {
        &self.layouts
    }

    /// Open `id` as a tile source. `params` configure the named sources and
    /// are ignored for files.
    pub async fn open(&self, id: &str, params: &Params) -> Result<Arc<dyn TileSource>, TileError> {
        match id {
            TEST_SOURCE => Ok(Arc::new(SyntheticTileSource::new(
                params,
                &self.options.encode,
            )?)),
            DUMMY_SOURCE => Ok(Arc::new(DummyTileSource)),
            _ => self.open_file(id).await,
        }
    }

    async fn open_file(&self, id: &str) -> Result<Arc<dyn TileSource>, TileError> {
        if let Some(source) = self.open.write().await.get(id) {
            return Ok(source.clone());
        }

        let resolved = self.storage.resolve(id).await?;
        let reader = Arc::new(FileRangeReader::open(&resolved.path).await?);
        let format = sniff(&*reader).await?;
        debug!(id, format = ?format, content_type = ?resolved.content_type, "Probing file");

        let mut first_error = None;
        for probe in FILE_PROBES {
            let Some(format) = format.filter(|f| (probe.accepts)(*f)) else {
                continue;
            };
            match self.open_with(probe.kind, reader.clone()).await {
                Ok(source) => {
                    info!(id, probe = probe.name, format = format.name(), "Opened tile source");
                    self.open.write().await.put(id.to_string(), source.clone());
                    return Ok(source);
                }
                Err(err) => {
                    warn!(id, probe = probe.name, error = %err, "Probe could not open file");
                    first_error.get_or_insert(err);
                }
            }
        }

        Err(first_error
            .unwrap_or_else(|| TileError::input(format!("No tile source can read {}", id))))
    }

    async fn open_with(
        &self,
        kind: SourceKind,
        reader: Arc<FileRangeReader>,
    ) -> Result<Arc<dyn TileSource>, TileError> {
        let source: Arc<dyn TileSource> = match kind {
            SourceKind::Tiff => Arc::new(
                TiffTileSource::open(reader, Some(&self.layouts), self.options.encode).await?,
            ),
            SourceKind::Raster => Arc::new(
                RasterTileSource::open(&*reader, self.options.raster_tile_size, self.options.encode)
                    .await?,
            ),
        };
        Ok(source)
    }

    /// Forget an opened file and its cached directory layouts.
    pub async fn evict(&self, id: &str) -> Option<Arc<dyn TileSource>> {
        let source = self.open.write().await.pop(id);
        if let Some(source) = &source {
            self.layouts.invalidate(source.name()).await;
        }
        source
    }

    pub async fn open_count(&self) -> usize {
        self.open.read().await.len()
    }
}
