//! # Tile Pyramid
//!
//! A tile pyramid engine for very large images.
//!
//! Tiled, JPEG-compressed TIFF files are served by reading only the bytes
//! each tile needs: directory layouts are parsed once, tile frames are
//! merged with the shared JPEG tables and returned without re-encoding when
//! the caller asks for the stored format. Thumbnails and arbitrary regions
//! are composed from the best-fitting pyramid level.
//!
//! ## Features
//!
//! - **Range-based reads**: tile frames are fetched by offset, never the whole file
//! - **Format support**: classic and BigTIFF pyramids, plus flat PNG/JPEG rasters
//! - **Sparse pyramids**: missing levels are composed from the next finer level
//! - **Caching**: directory layouts, opened sources and encoded tiles
//! - **Synthetic sources**: `test` patterns and an empty `dummy` source
//!
//! ## Architecture
//!
//! - [`io`] - range readers over files and memory
//! - [`mod@format`] - TIFF parser, pyramid resolution and JPEG table handling
//! - [`source`] - the [`TileSource`] contract, its implementations and the registry
//! - [`tile`] - tile service, compositor, encoder and tile cache
//! - [`conversion`] - contract with the external pyramid conversion runner
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tile_pyramid::{LocalStorage, Params, SourceOptions, SourceRegistry, TileRequest, TileService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tile_pyramid::TileError> {
//!     let registry = SourceRegistry::new(
//!         Arc::new(LocalStorage::new("/data/slides")),
//!         SourceOptions::default(),
//!     );
//!     let service = TileService::new(registry);
//!
//!     let request = TileRequest::new("scan.tiff", 8, 0, 0)
//!         .with_params(Params::new().with("encoding", "PNG"));
//!     let tile = service.get_tile(&request).await?;
//!     println!("{} bytes of {}", tile.image.data.len(), tile.image.mime_type());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod conversion;
pub mod error;
pub mod format;
pub mod io;
pub mod params;
pub mod source;
pub mod tile;

// Re-export commonly used types
pub use config::{Cli, Command, Config};
pub use conversion::{verify_output, ConversionJobs, InMemoryJobBoard, JobRef, JobStatus};
pub use error::{ConversionError, IoError, JpegError, TiffError, TileError, ValidationError};
pub use format::tiff::{LayoutCache, PyramidLayout, TiffStructure, TiledDirectory};
pub use format::{detect_format, is_tiff_header, sniff, ContainerFormat};
pub use io::{FileRangeReader, MemoryRangeReader, RangeReader};
pub use params::Params;
pub use source::{
    DirectPaths, DummyTileSource, LocalStorage, RasterTileSource, ResolvedFile, SourceOptions,
    SourceRegistry, SourceTile, StorageResolver, SyntheticTileSource, TiffTileSource, TileCoord,
    TileMetadata, TileSource,
};
pub use tile::{
    fit_within, ChromaSubsampling, EncodeOptions, EncodedImage, Encoding, RegionRequest,
    TileCache, TileRequest, TileResponse, TileService, Units,
};
