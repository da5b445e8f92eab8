//! Tile rendering layer.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              TileService                │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  TileCache   │  │   compositor    │  │
//! │  │  (encoded    │  │  (stitch, crop, │  │
//! │  │   tiles)     │  │   resample)     │  │
//! │  └──────────────┘  └────────┬────────┘  │
//! │                    ┌────────▼────────┐  │
//! │                    │     encoder     │  │
//! │                    │   (JPEG/PNG)    │  │
//! │                    └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      ▼
//!               SourceRegistry
//! ```
//!
//! - [`TileService`]: opens sources, validates and caches tile requests
//! - [`compositor`]: region normalization, level choice and stitching
//! - [`encoder`]: output encoding options and JPEG/PNG encode/decode

mod cache;
pub mod compositor;
pub mod encoder;
mod service;

pub use cache::{TileCache, TileCacheKey, DEFAULT_TILE_CACHE_CAPACITY};
pub use compositor::{fit_within, PixelRect, RegionRequest, Units, DEFAULT_THUMBNAIL_SIZE};
pub use encoder::{
    clamp_quality, ChromaSubsampling, EncodeOptions, EncodedImage, Encoding,
    DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
pub use service::{TileRequest, TileResponse, TileService};
