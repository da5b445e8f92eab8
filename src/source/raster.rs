//! Full-decode fallback for flat PNG and JPEG rasters.
//!
//! The whole image is decoded once at open and every pyramid level is built
//! by successive halving, so tiles are plain crops afterwards.

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::info;

use crate::error::TileError;
use crate::format::tiff::level_count;
use crate::io::RangeReader;
use crate::tile::encoder::{self, EncodeOptions};

use super::tile_source::{SourceTile, TileMetadata, TileSource};

/// Default tile edge for rasters, which carry no tiling of their own.
pub const DEFAULT_RASTER_TILE_SIZE: u32 = 256;

pub struct RasterTileSource {
    name: String,
    tile_size: u32,
    /// Indexed by level, coarsest first
    levels: Vec<RgbImage>,
    defaults: EncodeOptions,
}

impl RasterTileSource {
    pub async fn open<R: RangeReader + ?Sized>(
        reader: &R,
        tile_size: u32,
        defaults: EncodeOptions,
    ) -> Result<Self, TileError> {
        let bytes = reader.read_all().await?;
        let image = encoder::decode(&bytes)?;
        let source = Self::from_image(reader.identifier(), image, tile_size, defaults)?;
        info!(
            file = reader.identifier(),
            width = source.levels.last().map_or(0, |l| l.width()),
            height = source.levels.last().map_or(0, |l| l.height()),
            levels = source.levels.len(),
            "Opened raster tile source"
        );
        Ok(source)
    }

    pub fn from_image(
        name: impl Into<String>,
        image: RgbImage,
        tile_size: u32,
        defaults: EncodeOptions,
    ) -> Result<Self, TileError> {
        if tile_size == 0 {
            return Err(TileError::input("Tile size must be positive"));
        }
        let (width, height) = image.dimensions();
        let count = level_count(width, height, tile_size, tile_size) as usize;

        let mut levels = Vec::with_capacity(count);
        levels.push(image);
        while levels.len() < count {
            let Some(finer) = levels.last() else { break };
            let w = finer.width().div_ceil(2).max(1);
            let h = finer.height().div_ceil(2).max(1);
            let coarser = imageops::resize(finer, w, h, FilterType::Triangle);
            levels.push(coarser);
        }
        levels.reverse();

        Ok(Self {
            name: name.into(),
            tile_size,
            levels,
            defaults,
        })
    }
}

#[async_trait]
impl TileSource for RasterTileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn metadata(&self) -> TileMetadata {
        let (size_x, size_y) = self.levels.last().map_or((0, 0), |l| l.dimensions());
        TileMetadata {
            tile_width: self.tile_size,
            tile_height: self.tile_size,
            size_x,
            size_y,
            levels: self.levels.len() as u32,
            min_level: 0,
        }
    }

    fn encode_defaults(&self) -> EncodeOptions {
        self.defaults
    }

    async fn fetch_tile(&self, level: u32, x: u32, y: u32) -> Result<SourceTile, TileError> {
        let image = self
            .levels
            .get(level as usize)
            .ok_or_else(|| TileError::absent("z layer does not exist"))?;
        let left = x.saturating_mul(self.tile_size);
        let top = y.saturating_mul(self.tile_size);
        if left >= image.width() || top >= image.height() {
            return Err(TileError::absent(format!(
                "Tile x={}, y={} does not exist",
                x, y
            )));
        }
        let width = self.tile_size.min(image.width() - left);
        let height = self.tile_size.min(image.height() - top);

        // Edge tiles are padded to the full tile size
        let crop = imageops::crop_imm(image, left, top, width, height).to_image();
        let mut tile = RgbImage::new(self.tile_size, self.tile_size);
        imageops::replace(&mut tile, &crop, 0, 0);
        Ok(SourceTile::Pixels(tile))
    }
}
