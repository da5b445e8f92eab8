//! Generated test-pattern source.
//!
//! Produces a pyramid of any shape on demand, without a backing file. The
//! default pattern is a per-level checkerboard with tile borders; `fractal`
//! renders a Mandelbrot set across each level instead.

use async_trait::async_trait;
use image::{Rgb, RgbImage};

use crate::error::TileError;
use crate::params::Params;
use crate::tile::encoder::{EncodeOptions, Encoding};

use super::tile_source::{SourceTile, TileMetadata, TileSource};

pub const DEFAULT_MAX_LEVEL: u32 = 9;

pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Deepest pyramid the generator accepts.
pub const MAX_SYNTHETIC_LEVEL: u32 = 31;

const MANDELBROT_ITERATIONS: u32 = 64;

const BORDER: u32 = 2;

#[derive(Debug, Clone)]
pub struct SyntheticTileSource {
    name: String,
    metadata: TileMetadata,
    fractal: bool,
    defaults: EncodeOptions,
}

impl SyntheticTileSource {
    /// Build from `minLevel`, `maxLevel`, `tileWidth`, `tileHeight`, `sizeX`,
    /// `sizeY`, `fractal` and `encoding`.
    pub fn new(params: &Params, defaults: &EncodeOptions) -> Result<Self, TileError> {
        let min_level = params.get_u32("minLevel")?.unwrap_or(0);
        let max_level = params.get_u32("maxLevel")?.unwrap_or(DEFAULT_MAX_LEVEL);
        let tile_width = params.get_u32("tileWidth")?.unwrap_or(DEFAULT_TILE_SIZE);
        let tile_height = params.get_u32("tileHeight")?.unwrap_or(DEFAULT_TILE_SIZE);
        let size_x = params.get_u32("sizeX")?;
        let size_y = params.get_u32("sizeY")?;
        let fractal = params.get_bool("fractal")?.unwrap_or(false);

        if tile_width == 0 || tile_height == 0 {
            return Err(TileError::input("Invalid tileWidth or tileHeight"));
        }
        if max_level > MAX_SYNTHETIC_LEVEL {
            return Err(TileError::input(format!(
                "maxLevel must not exceed {}",
                MAX_SYNTHETIC_LEVEL
            )));
        }
        if min_level > max_level {
            return Err(TileError::input("minLevel must not exceed maxLevel"));
        }

        let full_size = |given: Option<u32>, tile: u32, axis: &str| match given {
            Some(0) => Err(TileError::input(format!("Invalid {}", axis))),
            Some(size) => Ok(size),
            None => u32::try_from((tile as u64) << max_level)
                .map_err(|_| TileError::input(format!("{} is too large", axis))),
        };
        let size_x = full_size(size_x, tile_width, "sizeX")?;
        let size_y = full_size(size_y, tile_height, "sizeY")?;

        let mut defaults = *defaults;
        defaults.encoding = match params.get_str("encoding") {
            Some(value) => Encoding::parse(value)?,
            None if fractal => Encoding::Png,
            None => defaults.encoding,
        };

        let metadata = TileMetadata {
            tile_width,
            tile_height,
            size_x,
            size_y,
            levels: max_level + 1,
            min_level,
        };
        let name = format!(
            "test?minLevel={}&maxLevel={}&tileWidth={}&tileHeight={}&sizeX={}&sizeY={}&fractal={}",
            min_level, max_level, tile_width, tile_height, size_x, size_y, fractal
        );

        Ok(Self {
            name,
            metadata,
            fractal,
            defaults,
        })
    }

    fn render(&self, level: u32, x: u32, y: u32) -> RgbImage {
        let (tw, th) = (self.metadata.tile_width, self.metadata.tile_height);
        if self.fractal {
            let lw = self.metadata.level_width(level).max(1) as f64;
            let lh = self.metadata.level_height(level).max(1) as f64;
            RgbImage::from_fn(tw, th, |i, j| {
                let px = (x as u64 * tw as u64 + i as u64) as f64 + 0.5;
                let py = (y as u64 * th as u64 + j as u64) as f64 + 0.5;
                mandelbrot(-2.5 + 3.5 * px / lw, -1.25 + 2.5 * py / lh)
            })
        } else {
            let light = level_color(level);
            let dark = Rgb(light.0.map(|c| c / 2));
            let cell_w = (tw / 8).max(1);
            let cell_h = (th / 8).max(1);
            RgbImage::from_fn(tw, th, |i, j| {
                if i < BORDER || j < BORDER || i >= tw - BORDER.min(tw) || j >= th - BORDER.min(th)
                {
                    Rgb([255, 255, 255])
                } else if (i / cell_w + j / cell_h + x + y) % 2 == 0 {
                    light
                } else {
                    dark
                }
            })
        }
    }
}

fn level_color(level: u32) -> Rgb<u8> {
    Rgb([
        ((level * 53 + 40) % 256) as u8,
        ((level * 97 + 80) % 256) as u8,
        ((level * 151 + 120) % 256) as u8,
    ])
}

fn mandelbrot(cx: f64, cy: f64) -> Rgb<u8> {
    let (mut zx, mut zy) = (0.0f64, 0.0f64);
    for n in 0..MANDELBROT_ITERATIONS {
        if zx * zx + zy * zy > 4.0 {
            return Rgb([(n * 4) as u8, (n * 8 % 256) as u8, (255 - n * 4) as u8]);
        }
        let next = zx * zx - zy * zy + cx;
        zy = 2.0 * zx * zy + cy;
        zx = next;
    }
    Rgb([0, 0, 0])
}

#[async_trait]
impl TileSource for SyntheticTileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn metadata(&self) -> TileMetadata {
        self.metadata
    }

    fn encode_defaults(&self) -> EncodeOptions {
        self.defaults
    }

    async fn fetch_tile(&self, level: u32, x: u32, y: u32) -> Result<SourceTile, TileError> {
        Ok(SourceTile::Pixels(self.render(level, x, y)))
    }
}
