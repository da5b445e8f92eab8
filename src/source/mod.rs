//! Tile sources.
//!
//! Every supported kind of image is exposed through the same
//! [`TileSource`] contract:
//!
//! ```text
//!                  SourceRegistry
//!          (storage, probes, open sources)
//!                        │
//!        ┌───────────┬───┴────────┬──────────────┐
//!        ▼           ▼            ▼              ▼
//!  TiffTileSource  Raster   SyntheticTile   DummyTile
//!  (JPEG tiles)   (decoded)    (pattern)     (empty)
//! ```
//!
//! Sources only describe their pyramid and fetch stored tiles; the request
//! operations live on the trait as shared default methods.

mod dummy;
mod raster;
mod registry;
mod storage;
mod synthetic;
mod tiff;
mod tile_source;

pub use dummy::DummyTileSource;
pub use raster::{RasterTileSource, DEFAULT_RASTER_TILE_SIZE};
pub use registry::{
    SourceOptions, SourceRegistry, DEFAULT_SOURCE_CACHE_CAPACITY, DUMMY_SOURCE, TEST_SOURCE,
};
pub use storage::{content_type_for, DirectPaths, LocalStorage, ResolvedFile, StorageResolver};
pub use synthetic::SyntheticTileSource;
pub use tiff::TiffTileSource;
pub use tile_source::{SourceTile, TileCoord, TileMetadata, TileSource};
