use async_trait::async_trait;

use crate::error::TileError;
use crate::tile::encoder::{EncodeOptions, EncodedImage, Encoding};

use super::tile_source::{SourceTile, TileMetadata, TileSource};

/// Placeholder source with no levels. Every tile request fails validation
/// and thumbnails and regions come back empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct DummyTileSource;

#[async_trait]
impl TileSource for DummyTileSource {
    fn name(&self) -> &str {
        "dummy"
    }

    fn metadata(&self) -> TileMetadata {
        TileMetadata::default()
    }

    fn encode_defaults(&self) -> EncodeOptions {
        EncodeOptions::default()
    }

    async fn fetch_tile(&self, _level: u32, _x: u32, _y: u32) -> Result<SourceTile, TileError> {
        Ok(SourceTile::Encoded(EncodedImage::empty(Encoding::Jpeg)))
    }
}
