//! Mapping TIFF directories onto a tile pyramid.
//!
//! Level numbering runs from 0 (the coarsest, fitting in one tile) up to
//! `levels - 1` (full resolution). The level count comes from the full
//! resolution size alone:
//!
//! ```text
//! levels = ceil(log2(max(sizeX / tileWidth, sizeY / tileHeight))) + 1
//! ```
//!
//! Each directory is placed at `levels - 1 - k`, where `2^k` is its
//! downsample from full resolution. Directories that are not a clean
//! power-of-two reduction (labels, macros, thumbnails) are left out, and
//! levels with no directory are gaps. The lowest backed level is `minLevel`.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::TiffError;
use crate::io::RangeReader;

use super::directory::{DirectoryLayout, TiffStructure};
use super::layout_cache::{DirectoryKey, LayoutCache};

/// Number of pyramid levels needed for a `size_x` by `size_y` image cut into
/// `tile_width` by `tile_height` tiles. Always at least 1.
pub fn level_count(size_x: u32, size_y: u32, tile_width: u32, tile_height: u32) -> u32 {
    if tile_width == 0 || tile_height == 0 {
        return 1;
    }
    let mut halvings = 0u32;
    while halvings < 63
        && ((tile_width as u64) << halvings < size_x as u64
            || (tile_height as u64) << halvings < size_y as u64)
    {
        halvings += 1;
    }
    halvings + 1
}

/// One backed level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelDescriptor {
    pub level: u32,
    pub directory_index: usize,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub tile_size: u32,
}

/// Resolved pyramid of a tiled JPEG TIFF.
#[derive(Debug, Clone)]
pub struct PyramidLayout {
    pub size_x: u32,
    pub size_y: u32,
    pub tile_size: u32,
    pub levels: u32,
    pub min_level: u32,
    /// Indexed by level
    directories: Vec<Option<Arc<DirectoryLayout>>>,
}

impl PyramidLayout {
    /// Read every directory of `reader` and build the pyramid.
    ///
    /// Directories that fail validation are skipped. When none validate, the
    /// first directory's failure is returned.
    pub async fn resolve<R: RangeReader + ?Sized>(
        reader: &R,
        cache: Option<&LayoutCache>,
    ) -> Result<Self, TiffError> {
        let structure = TiffStructure::read(reader).await?;
        let mut layouts = Vec::with_capacity(structure.ifds.len());
        let mut first_error = None;

        for (index, ifd) in structure.ifds.iter().enumerate() {
            let key = DirectoryKey::new(reader.identifier(), index);
            if let Some(cache) = cache {
                if let Some(layout) = cache.get(&key).await {
                    layouts.push(layout);
                    continue;
                }
            }

            match DirectoryLayout::read(reader, &structure.header, index, ifd).await {
                Ok(layout) => {
                    let layout = Arc::new(layout);
                    if let Some(cache) = cache {
                        cache.insert(key, layout.clone()).await;
                    }
                    layouts.push(layout);
                }
                Err(err) => {
                    debug!(
                        file = reader.identifier(),
                        directory = index,
                        error = %err,
                        "Skipping directory"
                    );
                    first_error.get_or_insert(err);
                }
            }
        }

        let pyramid = Self::from_directories(layouts).ok_or_else(|| {
            first_error.unwrap_or(TiffError::MissingTag("ImageWidth"))
        })?;

        info!(
            file = reader.identifier(),
            size_x = pyramid.size_x,
            size_y = pyramid.size_y,
            levels = pyramid.levels,
            min_level = pyramid.min_level,
            "Resolved tile pyramid"
        );
        Ok(pyramid)
    }

    /// Arrange validated directories by level. `None` if the list is empty.
    pub fn from_directories(mut layouts: Vec<Arc<DirectoryLayout>>) -> Option<Self> {
        layouts.sort_by_key(|l| std::cmp::Reverse(l.width as u64 * l.height as u64));
        let base = layouts.first()?.clone();

        let size_x = base.width;
        let size_y = base.height;
        let tile_size = base.tile_size;
        let levels = level_count(size_x, size_y, tile_size, tile_size);
        let mut directories: Vec<Option<Arc<DirectoryLayout>>> = vec![None; levels as usize];

        for layout in layouts {
            let Some(level) = Self::level_for(&layout, size_x, size_y, tile_size, levels) else {
                debug!(
                    directory = layout.index,
                    width = layout.width,
                    height = layout.height,
                    "Directory is not a pyramid level"
                );
                continue;
            };
            let slot = &mut directories[level as usize];
            if slot.is_none() {
                *slot = Some(layout);
            }
        }

        let min_level = directories
            .iter()
            .position(Option::is_some)
            .unwrap_or(levels as usize - 1) as u32;

        Some(PyramidLayout {
            size_x,
            size_y,
            tile_size,
            levels,
            min_level,
            directories,
        })
    }

    fn level_for(
        layout: &DirectoryLayout,
        size_x: u32,
        size_y: u32,
        tile_size: u32,
        levels: u32,
    ) -> Option<u32> {
        if layout.tile_size != tile_size {
            return None;
        }
        let ratio = size_x as f64 / layout.width as f64;
        let k = ratio.log2().round();
        if !(0.0..levels as f64).contains(&k) {
            return None;
        }
        let k = k as u32;
        let expected_w = (size_x as u64).div_ceil(1u64 << k);
        let expected_h = (size_y as u64).div_ceil(1u64 << k);
        if expected_w.abs_diff(layout.width as u64) > 1
            || expected_h.abs_diff(layout.height as u64) > 1
        {
            return None;
        }
        Some(levels - 1 - k)
    }

    pub fn directory(&self, level: u32) -> Option<&Arc<DirectoryLayout>> {
        self.directories.get(level as usize)?.as_ref()
    }

    pub fn has_directory(&self, level: u32) -> bool {
        self.directory(level).is_some()
    }

    pub fn descriptors(&self) -> Vec<LevelDescriptor> {
        self.directories
            .iter()
            .enumerate()
            .filter_map(|(level, dir)| {
                dir.as_ref().map(|d| LevelDescriptor {
                    level: level as u32,
                    directory_index: d.index,
                    pixel_width: d.width,
                    pixel_height: d.height,
                    tile_size: d.tile_size,
                })
            })
            .collect()
    }
}
