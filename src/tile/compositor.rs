//! Region, thumbnail and tile composition over a [`TileSource`].
//!
//! All three requests end up as "some pixel rectangle of the full-resolution
//! image, rendered at some output size". The compositor picks the coarsest
//! level that still has at least the requested detail, stitches the covering
//! tiles of that level onto one canvas, crops, resamples with Lanczos3 and
//! encodes.
//!
//! ```text
//! Parse -> ValidateTypes -> ValidateBounds -> Resolve -> Fetch -> Compose -> Encode
//! ```
//!
//! Nothing is returned unless every step succeeds.

use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::debug;

use crate::error::TileError;
use crate::params::Params;
use crate::source::{SourceTile, TileCoord, TileMetadata, TileSource};

use super::encoder::{self, EncodeOptions, EncodedImage};

/// Bounding box used when a thumbnail request gives neither width nor height.
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 256;

// =============================================================================
// Region descriptors
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Units {
    /// Pixels of the full-resolution image
    #[default]
    BasePixels,
    /// 0.0 to 1.0 of the full image size
    Fraction,
}

impl Units {
    pub fn parse(value: &str) -> Result<Self, TileError> {
        match value {
            "base_pixels" | "pixels" => Ok(Units::BasePixels),
            "fraction" => Ok(Units::Fraction),
            _ => Err(TileError::input(format!("Invalid units \"{}\"", value))),
        }
    }
}

/// A region as requested: any combination of edges and extents.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RegionRequest {
    pub left: Option<f64>,
    pub top: Option<f64>,
    pub right: Option<f64>,
    pub bottom: Option<f64>,
    pub region_width: Option<f64>,
    pub region_height: Option<f64>,
    pub units: Units,
}

/// Absolute rectangle in full-resolution pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl RegionRequest {
    pub fn from_params(params: &Params) -> Result<Self, TileError> {
        let units = match params.get_str("units") {
            Some(value) => Units::parse(value)?,
            None => Units::BasePixels,
        };
        Ok(Self {
            left: params.get_float("left")?,
            top: params.get_float("top")?,
            right: params.get_float("right")?,
            bottom: params.get_float("bottom")?,
            region_width: params.get_float("regionWidth")?,
            region_height: params.get_float("regionHeight")?,
            units,
        })
    }

    /// Resolve to an absolute rectangle clamped to a `size_x` by `size_y`
    /// image.
    pub fn normalize(&self, size_x: u32, size_y: u32) -> PixelRect {
        let fraction = self.units == Units::Fraction;
        let (left, width) = normalize_axis(
            self.left,
            self.right,
            self.region_width,
            size_x,
            fraction,
        );
        let (top, height) = normalize_axis(
            self.top,
            self.bottom,
            self.region_height,
            size_y,
            fraction,
        );
        PixelRect {
            left,
            top,
            width,
            height,
        }
    }
}

/// One axis of region normalization. Returns `(start, length)`.
///
/// Edges are converted to pixels, then negative edges get the image size
/// added once. A missing start is derived from end and extent, a missing end
/// from start and extent, and the rest default to the full axis.
fn normalize_axis(
    start: Option<f64>,
    end: Option<f64>,
    extent: Option<f64>,
    size: u32,
    fraction: bool,
) -> (u32, u32) {
    let size_f = size as f64;
    let to_pixels = |v: f64| if fraction { (v * size_f).round() } else { v.round() };
    let wrap = |v: f64| if v < 0.0 { v + size_f } else { v };

    let start = start.map(to_pixels).map(wrap);
    let end = end.map(to_pixels).map(wrap);
    let extent = extent.map(to_pixels);

    let start = match (start, end, extent) {
        (Some(s), _, _) => s,
        (None, Some(e), Some(w)) => e - w,
        _ => 0.0,
    };
    let end = match (end, extent) {
        (Some(e), _) => e,
        (None, Some(w)) => start + w,
        (None, None) => size_f,
    };

    let start = start.clamp(0.0, size_f);
    let end = end.clamp(0.0, size_f);
    if end <= start {
        return (start as u32, 0);
    }
    (start as u32, (end - start) as u32)
}

// =============================================================================
// Output sizing
// =============================================================================

/// Read an optional positive `width`/`height` output parameter.
fn output_dimension(params: &Params, key: &str) -> Result<Option<u32>, TileError> {
    match params.get_int(key)? {
        None => Ok(None),
        Some(v) if v <= 0 => Err(TileError::input("Invalid width or height")),
        Some(v) => Ok(Some(u32::try_from(v).unwrap_or(u32::MAX))),
    }
}

/// Fit a `src_w` by `src_h` image into the requested bounds, keeping aspect.
///
/// With one bound the other side is `floor(bound * other / this)`; with both
/// the tighter one wins; with neither the source size is kept.
pub fn fit_within(src_w: u32, src_h: u32, width: Option<u32>, height: Option<u32>) -> (u32, u32) {
    if src_w == 0 || src_h == 0 {
        return (0, 0);
    }
    let (sw, sh) = (src_w as u64, src_h as u64);
    let by_width = |w: u32| (w, ((w as u64 * sh / sw) as u32).max(1));
    let by_height = |h: u32| (((h as u64 * sw / sh) as u32).max(1), h);

    match (width, height) {
        (None, None) => (src_w, src_h),
        (Some(w), None) => by_width(w),
        (None, Some(h)) => by_height(h),
        (Some(w), Some(h)) => {
            if w as u64 * sh <= h as u64 * sw {
                by_width(w)
            } else {
                by_height(h)
            }
        }
    }
}

// =============================================================================
// Request entry points
// =============================================================================

/// Validate and render one tile.
///
/// A stored JPEG tile requested as JPEG, without explicit quality or
/// subsampling, is returned byte-for-byte.
pub async fn render_tile<S: TileSource + ?Sized>(
    source: &S,
    coord: TileCoord,
    params: &Params,
) -> Result<EncodedImage, TileError> {
    let metadata = source.metadata();
    let (level, x, y) = coord.validate(&metadata)?;
    let options = EncodeOptions::from_params(params, &source.encode_defaults())?;

    let pixels = if source.level_available(level) {
        match source.fetch_tile(level, x, y).await? {
            SourceTile::Encoded(stored)
                if stored.encoding == options.encoding && options.allows_passthrough(params) =>
            {
                return Ok(stored);
            }
            tile => tile.into_pixels()?,
        }
    } else {
        compose_tile(source, &metadata, level, x, y).await?
    };
    encoder::encode(&pixels, &options)
}

pub async fn render_thumbnail<S: TileSource + ?Sized>(
    source: &S,
    params: &Params,
) -> Result<EncodedImage, TileError> {
    let mut width = output_dimension(params, "width")?;
    let mut height = output_dimension(params, "height")?;
    let options = EncodeOptions::from_params(params, &source.encode_defaults())?;

    let metadata = source.metadata();
    let full = PixelRect {
        left: 0,
        top: 0,
        width: metadata.size_x,
        height: metadata.size_y,
    };
    if full.is_empty() {
        return Ok(EncodedImage::empty(options.encoding));
    }
    if width.is_none() && height.is_none() {
        width = Some(DEFAULT_THUMBNAIL_SIZE);
        height = Some(DEFAULT_THUMBNAIL_SIZE);
    }
    let (out_w, out_h) = fit_within(full.width, full.height, width, height);

    let pixels = compose_rect(source, &metadata, full, out_w, out_h).await?;
    encoder::encode(&pixels, &options)
}

pub async fn render_region<S: TileSource + ?Sized>(
    source: &S,
    params: &Params,
) -> Result<EncodedImage, TileError> {
    let region = RegionRequest::from_params(params)?;
    let width = output_dimension(params, "width")?;
    let height = output_dimension(params, "height")?;
    let options = EncodeOptions::from_params(params, &source.encode_defaults())?;

    let metadata = source.metadata();
    let rect = region.normalize(metadata.size_x, metadata.size_y);
    if rect.is_empty() {
        return Ok(EncodedImage::empty(options.encoding));
    }
    let (out_w, out_h) = fit_within(rect.width, rect.height, width, height);

    let pixels = compose_rect(source, &metadata, rect, out_w, out_h).await?;
    encoder::encode(&pixels, &options)
}

// =============================================================================
// Composition
// =============================================================================

/// Coarsest level whose downsample does not exceed the output scale, moved
/// to the next finer stored level when it has no data.
pub fn choose_level<S: TileSource + ?Sized>(
    source: &S,
    metadata: &TileMetadata,
    rect: PixelRect,
    out_w: u32,
    out_h: u32,
) -> u32 {
    let top = metadata.levels.saturating_sub(1);
    let scale = (out_w as f64 / rect.width as f64).max(out_h as f64 / rect.height as f64);
    let halvings = if scale >= 1.0 {
        0
    } else {
        ((1.0 / scale).log2() + 1e-9).floor() as u32
    };
    let mut level = top.saturating_sub(halvings).max(metadata.min_level).min(top);
    while level < top && !source.level_available(level) {
        level += 1;
    }
    level
}

/// Render the full-resolution `rect` at `out_w` by `out_h`.
async fn compose_rect<S: TileSource + ?Sized>(
    source: &S,
    metadata: &TileMetadata,
    rect: PixelRect,
    out_w: u32,
    out_h: u32,
) -> Result<RgbImage, TileError> {
    let level = choose_level(source, metadata, rect, out_w, out_h);
    let shift = metadata.downsample_shift(level);
    let factor = 1u64 << shift.min(63);

    let x0 = rect.left as u64 / factor;
    let y0 = rect.top as u64 / factor;
    let x1 = ((rect.left as u64 + rect.width as u64).div_ceil(factor))
        .min(metadata.level_width(level) as u64)
        .max(x0 + 1);
    let y1 = ((rect.top as u64 + rect.height as u64).div_ceil(factor))
        .min(metadata.level_height(level) as u64)
        .max(y0 + 1);

    debug!(
        source = source.name(),
        level,
        left = rect.left,
        top = rect.top,
        width = rect.width,
        height = rect.height,
        out_w,
        out_h,
        "Composing region"
    );

    let canvas = stitch(
        source,
        metadata,
        level,
        x0 as u32,
        y0 as u32,
        (x1 - x0) as u32,
        (y1 - y0) as u32,
    )
    .await?;

    Ok(resize_to(canvas, out_w, out_h))
}

/// Synthesize a tile of an unstored level from the next finer stored level.
async fn compose_tile<S: TileSource + ?Sized>(
    source: &S,
    metadata: &TileMetadata,
    level: u32,
    x: u32,
    y: u32,
) -> Result<RgbImage, TileError> {
    let finer = (level + 1..metadata.levels)
        .find(|&l| source.level_available(l))
        .ok_or_else(|| TileError::absent("z layer does not exist"))?;
    let shift = finer - level;
    let (tw, th) = (metadata.tile_width, metadata.tile_height);

    // Footprint of the tile at the finer level
    let span_w = (tw as u64) << shift;
    let span_h = (th as u64) << shift;
    let left = x as u64 * span_w;
    let top = y as u64 * span_h;
    let width = span_w.min(metadata.level_width(finer) as u64 - left);
    let height = span_h.min(metadata.level_height(finer) as u64 - top);

    debug!(source = source.name(), level, finer, x, y, "Composing sparse tile");

    let canvas = stitch(
        source,
        metadata,
        finer,
        left as u32,
        top as u32,
        width as u32,
        height as u32,
    )
    .await?;

    let scaled = resize_to(
        canvas,
        (width.div_ceil(1 << shift) as u32).max(1),
        (height.div_ceil(1 << shift) as u32).max(1),
    );
    let mut tile = RgbImage::new(tw, th);
    imageops::replace(&mut tile, &scaled, 0, 0);
    Ok(tile)
}

/// Stitch the tiles of a stored `level` covering the level-pixel rectangle
/// and crop to it.
async fn stitch<S: TileSource + ?Sized>(
    source: &S,
    metadata: &TileMetadata,
    level: u32,
    left: u32,
    top: u32,
    width: u32,
    height: u32,
) -> Result<RgbImage, TileError> {
    let (tw, th) = (metadata.tile_width, metadata.tile_height);
    let mut canvas = RgbImage::new(width, height);

    let first_x = left / tw;
    let first_y = top / th;
    let last_x = ((left + width - 1) / tw).min(metadata.tiles_across(level).saturating_sub(1));
    let last_y = ((top + height - 1) / th).min(metadata.tiles_down(level).saturating_sub(1));

    for ty in first_y..=last_y {
        for tx in first_x..=last_x {
            let tile = source.fetch_tile(level, tx, ty).await?.into_pixels()?;
            let offset_x = tx as i64 * tw as i64 - left as i64;
            let offset_y = ty as i64 * th as i64 - top as i64;
            imageops::replace(&mut canvas, &tile, offset_x, offset_y);
        }
    }
    Ok(canvas)
}

fn resize_to(image: RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        image
    } else {
        imageops::resize(&image, width, height, FilterType::Lanczos3)
    }
}
