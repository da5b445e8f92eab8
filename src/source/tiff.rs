//! Native tiled JPEG TIFF source.
//!
//! Tiles come straight out of the container as rebuilt JPEG streams, so a
//! plain JPEG tile request never decodes anything.

use std::sync::Arc;

use async_trait::async_trait;
use image::RgbImage;
use tracing::{debug, info};

use crate::error::TileError;
use crate::format::tiff::{LayoutCache, LevelDescriptor, PyramidLayout, TiledDirectory};
use crate::io::{FileRangeReader, RangeReader};
use crate::tile::encoder::{EncodeOptions, EncodedImage, Encoding};

use super::tile_source::{SourceTile, TileMetadata, TileSource};

pub struct TiffTileSource<R: RangeReader = FileRangeReader> {
    reader: Arc<R>,
    pyramid: PyramidLayout,
    defaults: EncodeOptions,
}

impl<R: RangeReader + 'static> TiffTileSource<R> {
    /// Resolve the pyramid of `reader`. Fails if no directory passes
    /// validation.
    pub async fn open(
        reader: Arc<R>,
        layouts: Option<&LayoutCache>,
        defaults: EncodeOptions,
    ) -> Result<Self, TileError> {
        let pyramid = PyramidLayout::resolve(&*reader, layouts).await?;
        info!(
            file = reader.identifier(),
            levels = pyramid.levels,
            backed = pyramid.descriptors().len(),
            "Opened TIFF tile source"
        );
        Ok(Self {
            reader,
            pyramid,
            defaults,
        })
    }

    /// The stored levels and the directories backing them.
    pub fn levels(&self) -> Vec<LevelDescriptor> {
        self.pyramid.descriptors()
    }
}

#[async_trait]
impl<R: RangeReader + 'static> TileSource for TiffTileSource<R> {
    fn name(&self) -> &str {
        self.reader.identifier()
    }

    fn metadata(&self) -> TileMetadata {
        TileMetadata {
            tile_width: self.pyramid.tile_size,
            tile_height: self.pyramid.tile_size,
            size_x: self.pyramid.size_x,
            size_y: self.pyramid.size_y,
            levels: self.pyramid.levels,
            min_level: self.pyramid.min_level,
        }
    }

    fn encode_defaults(&self) -> EncodeOptions {
        self.defaults
    }

    fn level_available(&self, level: u32) -> bool {
        self.pyramid.has_directory(level)
    }

    async fn fetch_tile(&self, level: u32, x: u32, y: u32) -> Result<SourceTile, TileError> {
        let layout = self
            .pyramid
            .directory(level)
            .ok_or_else(|| TileError::absent("z layer does not exist"))?;

        // Levels written with rounded-down sizes can be one tile short of the
        // level grid; the missing edge is blank.
        if x >= layout.tiles_across || y >= layout.tiles_down {
            debug!(
                file = self.reader.identifier(),
                level, x, y, "Tile past directory edge"
            );
            let size = self.pyramid.tile_size;
            return Ok(SourceTile::Pixels(RgbImage::new(size, size)));
        }

        let directory = TiledDirectory::from_layout(self.reader.clone(), layout.clone());
        let data = directory.tile(x, y).await?;
        Ok(SourceTile::Encoded(EncodedImage {
            data,
            encoding: Encoding::Jpeg,
        }))
    }
}
