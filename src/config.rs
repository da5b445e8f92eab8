//! Command-line configuration.
//!
//! Every engine setting can also come from a `TILE_PYRAMID_` environment
//! variable:
//!
//! - `TILE_PYRAMID_ROOT` - resolve file identifiers under this directory
//! - `TILE_PYRAMID_TILE_SIZE` - tile edge for flat rasters (default: 256)
//! - `TILE_PYRAMID_JPEG_QUALITY` - default JPEG quality (default: 95)
//! - `TILE_PYRAMID_JPEG_SUBSAMPLING` - default chroma subsampling, 0-2 (default: 0)
//! - `TILE_PYRAMID_CACHE_LAYOUTS` - directory layouts kept across opens (default: 256)
//! - `TILE_PYRAMID_CACHE_TILES` - encoded tile cache size in bytes (default: 100MB)
//!
//! ```text
//! tile-pyramid metadata slide.tif
//! tile-pyramid tile slide.tif 8 0 0 -p encoding=PNG -o tile.png
//! tile-pyramid region test -p maxLevel=6 -p regionWidth=500 -p width=100
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::format::tiff::DEFAULT_LAYOUT_CACHE_ENTRIES;
use crate::params::Params;
use crate::source::{SourceOptions, DEFAULT_RASTER_TILE_SIZE, DEFAULT_SOURCE_CACHE_CAPACITY};
use crate::tile::{
    ChromaSubsampling, EncodeOptions, DEFAULT_JPEG_QUALITY, DEFAULT_TILE_CACHE_CAPACITY,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Tile pyramid engine for very large images.
#[derive(Parser, Debug, Clone)]
#[command(name = "tile-pyramid")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Command,
}

/// Engine settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Directory file identifiers are resolved under. Without it,
    /// identifiers are used as filesystem paths.
    #[arg(long, env = "TILE_PYRAMID_ROOT", global = true)]
    pub root: Option<PathBuf>,

    /// Tile edge in pixels for flat PNG/JPEG rasters.
    #[arg(long, default_value_t = DEFAULT_RASTER_TILE_SIZE, env = "TILE_PYRAMID_TILE_SIZE", global = true)]
    pub tile_size: u32,

    /// Default JPEG quality (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "TILE_PYRAMID_JPEG_QUALITY", global = true)]
    pub jpeg_quality: u8,

    /// Default chroma subsampling: 0 = 4:4:4, 1 = 4:2:2, 2 = 4:2:0.
    #[arg(long, default_value_t = 0, env = "TILE_PYRAMID_JPEG_SUBSAMPLING", global = true)]
    pub jpeg_subsampling: u8,

    /// Directory layouts kept across opens.
    #[arg(long, default_value_t = DEFAULT_LAYOUT_CACHE_ENTRIES, env = "TILE_PYRAMID_CACHE_LAYOUTS", global = true)]
    pub cache_layouts: usize,

    /// Encoded tile cache size in bytes.
    #[arg(long, default_value_t = DEFAULT_TILE_CACHE_CAPACITY, env = "TILE_PYRAMID_CACHE_TILES", global = true)]
    pub cache_tiles: usize,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the pyramid metadata as JSON.
    Metadata(SourceArgs),

    /// Render one tile.
    Tile(TileArgs),

    /// Render a thumbnail.
    Thumbnail(RenderArgs),

    /// Render a region of the full-resolution image.
    Region(RenderArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// File identifier, or `test` / `dummy`.
    pub source: String,

    /// Request parameter as KEY=VALUE; repeatable.
    #[arg(short = 'p', long = "param", value_parser = parse_param)]
    pub params: Vec<(String, String)>,

    /// Request parameters as a URL query string, e.g. `left=-100&width=300`.
    /// `--param` values take precedence.
    #[arg(short = 'q', long)]
    pub query: Option<String>,
}

impl SourceArgs {
    pub fn params(&self) -> Params {
        let mut params = self
            .query
            .as_deref()
            .map(Params::parse_query)
            .unwrap_or_default();
        params.extend(self.params.iter().cloned().collect());
        params
    }
}

#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Write the image here instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct TileArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[arg(allow_hyphen_values = true)]
    pub level: String,

    #[arg(allow_hyphen_values = true)]
    pub x: String,

    #[arg(allow_hyphen_values = true)]
    pub y: String,

    /// Write the tile here instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

fn parse_param(value: &str) -> Result<(String, String), String> {
    value
        .split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got `{}`", value))
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.tile_size == 0 {
            return Err("tile_size must be greater than 0".to_string());
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }
        if self.jpeg_subsampling > 2 {
            return Err("jpeg_subsampling must be 0, 1 or 2".to_string());
        }
        if self.cache_layouts == 0 {
            return Err("cache_layouts must be greater than 0".to_string());
        }
        if self.cache_tiles == 0 {
            return Err("cache_tiles must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Output defaults; call [`Config::validate`] first.
    pub fn encode_defaults(&self) -> EncodeOptions {
        EncodeOptions {
            jpeg_quality: self.jpeg_quality,
            jpeg_subsampling: ChromaSubsampling::from_index(self.jpeg_subsampling as i64)
                .unwrap_or_default(),
            ..EncodeOptions::default()
        }
    }

    pub fn source_options(&self) -> SourceOptions {
        SourceOptions {
            raster_tile_size: self.tile_size,
            encode: self.encode_defaults(),
            layout_cache_entries: self.cache_layouts,
            source_cache_entries: DEFAULT_SOURCE_CACHE_CAPACITY,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
