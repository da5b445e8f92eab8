//! The `TileSource` contract shared by every backing variant.
//!
//! A source only has to describe itself ([`TileMetadata`]) and hand out the
//! tiles it actually stores. Tile validation, sparse-level synthesis,
//! thumbnails, regions and output encoding are default methods built on
//! [`crate::tile::compositor`], so every variant answers them the same way.

use std::fmt;

use async_trait::async_trait;
use image::RgbImage;
use serde::Serialize;

use crate::error::TileError;
use crate::params::Params;
use crate::tile::compositor;
use crate::tile::encoder::{self, EncodeOptions, EncodedImage};

// =============================================================================
// Metadata
// =============================================================================

/// Pyramid description reported by a source.
///
/// Level 0 is the coarsest level and `levels - 1` the full resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileMetadata {
    pub tile_width: u32,
    pub tile_height: u32,
    pub size_x: u32,
    pub size_y: u32,
    pub levels: u32,
    pub min_level: u32,
}

impl TileMetadata {
    /// Number of halvings between `level` and full resolution.
    pub fn downsample_shift(&self, level: u32) -> u32 {
        self.levels.saturating_sub(1).saturating_sub(level)
    }

    pub fn tiles_across(&self, level: u32) -> u32 {
        scaled_ceil(self.size_x, self.tile_width, self.downsample_shift(level))
    }

    pub fn tiles_down(&self, level: u32) -> u32 {
        scaled_ceil(self.size_y, self.tile_height, self.downsample_shift(level))
    }

    /// Pixel width of the whole image at `level`.
    pub fn level_width(&self, level: u32) -> u32 {
        scaled_ceil(self.size_x, 1, self.downsample_shift(level))
    }

    pub fn level_height(&self, level: u32) -> u32 {
        scaled_ceil(self.size_y, 1, self.downsample_shift(level))
    }

    pub fn has_level(&self, level: u32) -> bool {
        level >= self.min_level && level < self.levels
    }
}

/// `ceil(size / (unit << shift))` without overflow.
fn scaled_ceil(size: u32, unit: u32, shift: u32) -> u32 {
    if unit == 0 || size == 0 {
        return 0;
    }
    if shift >= 32 {
        return 1;
    }
    let denom = (unit as u64) << shift;
    (size as u64).div_ceil(denom) as u32
}

// =============================================================================
// Tile coordinates
// =============================================================================

/// Unvalidated `(level, x, y)` as received from a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub level: i64,
    pub x: i64,
    pub y: i64,
}

impl TileCoord {
    pub fn new(level: i64, x: i64, y: i64) -> Self {
        Self { level, x, y }
    }

    /// Parse textual coordinates, as they arrive in a URL path.
    pub fn parse(level: &str, x: &str, y: &str) -> Result<Self, TileError> {
        let parse = |v: &str| v.trim().parse::<i64>();
        match (parse(level), parse(x), parse(y)) {
            (Ok(level), Ok(x), Ok(y)) => Ok(Self { level, x, y }),
            _ => Err(TileError::input("x, y, and z must be integers")),
        }
    }

    /// Check the coordinate against `metadata` and return `(level, x, y)`.
    ///
    /// Negative values are input errors; a level outside
    /// `[minLevel, levels)` or a tile outside the level's grid is absent.
    pub fn validate(&self, metadata: &TileMetadata) -> Result<(u32, u32, u32), TileError> {
        if self.level < 0 || self.x < 0 || self.y < 0 {
            return Err(TileError::input("x, y, and z must be positive integers"));
        }
        let level = u32::try_from(self.level).unwrap_or(u32::MAX);
        if !metadata.has_level(level) {
            return Err(TileError::absent("z layer does not exist"));
        }
        if self.x >= metadata.tiles_across(level) as i64 {
            return Err(TileError::absent("x is outside layer"));
        }
        if self.y >= metadata.tiles_down(level) as i64 {
            return Err(TileError::absent("y is outside layer"));
        }
        Ok((level, self.x as u32, self.y as u32))
    }
}

// =============================================================================
// Source tiles
// =============================================================================

/// A tile as stored by the source.
#[derive(Debug, Clone)]
pub enum SourceTile {
    /// Already encoded; may be passed through untouched
    Encoded(EncodedImage),
    /// Raw pixels that still need encoding
    Pixels(RgbImage),
}

impl SourceTile {
    pub fn into_pixels(self) -> Result<RgbImage, TileError> {
        match self {
            SourceTile::Encoded(image) => encoder::decode(&image.data),
            SourceTile::Pixels(pixels) => Ok(pixels),
        }
    }
}

// =============================================================================
// TileSource trait
// =============================================================================

/// A pyramidal image addressed by level/x/y.
///
/// Implementors provide the four required methods; the request operations
/// (`get_tile`, `get_thumbnail`, `get_region`) are shared.
#[async_trait]
pub trait TileSource: Send + Sync {
    /// Identifier used in logs and cache keys.
    fn name(&self) -> &str;

    fn metadata(&self) -> TileMetadata;

    /// Output options used when a request does not set them.
    fn encode_defaults(&self) -> EncodeOptions;

    /// Whether `level` is stored by the source. Levels inside
    /// `[minLevel, levels)` that are not stored are composed from the next
    /// finer stored level.
    fn level_available(&self, level: u32) -> bool {
        self.metadata().has_level(level)
    }

    /// Return the stored tile. Only called for validated coordinates on an
    /// available level.
    async fn fetch_tile(&self, level: u32, x: u32, y: u32) -> Result<SourceTile, TileError>;

    async fn get_tile(&self, coord: TileCoord, params: &Params) -> Result<EncodedImage, TileError> {
        compositor::render_tile(self, coord, params).await
    }

    async fn get_thumbnail(&self, params: &Params) -> Result<EncodedImage, TileError> {
        compositor::render_thumbnail(self, params).await
    }

    async fn get_region(&self, params: &Params) -> Result<EncodedImage, TileError> {
        compositor::render_region(self, params).await
    }
}

impl fmt::Debug for dyn TileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileSource")
            .field("name", &self.name())
            .field("metadata", &self.metadata())
            .finish()
    }
}
