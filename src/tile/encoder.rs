//! Output encoding for tiles, thumbnails and regions.
//!
//! Native JPEG tiles can go out untouched; everything else is an RGB canvas
//! encoded here as JPEG or PNG.
//!
//! The `image` JPEG encoder always writes full-resolution chroma, so
//! `jpegSubsampling` is honoured by averaging Cb/Cr over 2x1 (4:2:2) or 2x2
//! (4:2:0) blocks before encoding. The stream stays 4:4:4 but carries the
//! reduced chroma detail, and compresses accordingly.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageReader, RgbImage};

use crate::error::TileError;
use crate::params::Params;

pub const DEFAULT_JPEG_QUALITY: u8 = 95;

pub const MIN_JPEG_QUALITY: u8 = 1;

pub const MAX_JPEG_QUALITY: u8 = 100;

// =============================================================================
// Encoding options
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Jpeg,
    Png,
}

impl Encoding {
    /// Case-insensitive `JPEG` / `PNG`.
    pub fn parse(value: &str) -> Result<Self, TileError> {
        match value.trim().to_ascii_uppercase().as_str() {
            "JPEG" | "JPG" => Ok(Encoding::Jpeg),
            "PNG" => Ok(Encoding::Png),
            _ => Err(TileError::input(format!("Invalid encoding \"{}\"", value))),
        }
    }

    pub const fn mime_type(&self) -> &'static str {
        match self {
            Encoding::Jpeg => "image/jpeg",
            Encoding::Png => "image/png",
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Encoding::Jpeg => "JPEG",
            Encoding::Png => "PNG",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChromaSubsampling {
    #[default]
    Full,
    /// 4:2:2
    Horizontal,
    /// 4:2:0
    Both,
}

impl ChromaSubsampling {
    /// 0 = 4:4:4, 1 = 4:2:2, 2 = 4:2:0
    pub fn from_index(value: i64) -> Result<Self, TileError> {
        match value {
            0 => Ok(ChromaSubsampling::Full),
            1 => Ok(ChromaSubsampling::Horizontal),
            2 => Ok(ChromaSubsampling::Both),
            _ => Err(TileError::input(format!(
                "Invalid jpegSubsampling {}; expected 0, 1 or 2",
                value
            ))),
        }
    }

    pub const fn index(&self) -> u8 {
        match self {
            ChromaSubsampling::Full => 0,
            ChromaSubsampling::Horizontal => 1,
            ChromaSubsampling::Both => 2,
        }
    }

    const fn block(&self) -> (u32, u32) {
        match self {
            ChromaSubsampling::Full => (1, 1),
            ChromaSubsampling::Horizontal => (2, 1),
            ChromaSubsampling::Both => (2, 2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncodeOptions {
    pub encoding: Encoding,
    pub jpeg_quality: u8,
    pub jpeg_subsampling: ChromaSubsampling,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            encoding: Encoding::Jpeg,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            jpeg_subsampling: ChromaSubsampling::Full,
        }
    }
}

impl EncodeOptions {
    /// Read `encoding`, `jpegQuality` and `jpegSubsampling`, falling back to
    /// `defaults` for whatever is absent.
    pub fn from_params(params: &Params, defaults: &EncodeOptions) -> Result<Self, TileError> {
        let encoding = match params.get_str("encoding") {
            Some(value) => Encoding::parse(value)?,
            None => defaults.encoding,
        };
        let jpeg_quality = match params.get_int("jpegQuality")? {
            Some(q) => clamp_quality(q.clamp(0, u8::MAX as i64) as u8),
            None => defaults.jpeg_quality,
        };
        let jpeg_subsampling = match params.get_int("jpegSubsampling")? {
            Some(s) => ChromaSubsampling::from_index(s)?,
            None => defaults.jpeg_subsampling,
        };
        Ok(EncodeOptions {
            encoding,
            jpeg_quality,
            jpeg_subsampling,
        })
    }

    /// Whether a native JPEG tile can be returned byte-for-byte: JPEG output
    /// with no explicit re-encoding request.
    pub fn allows_passthrough(&self, params: &Params) -> bool {
        self.encoding == Encoding::Jpeg
            && !params.contains("jpegQuality")
            && !params.contains("jpegSubsampling")
    }
}

/// Encoded bytes plus their format. Empty `data` is a valid, empty result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub data: Bytes,
    pub encoding: Encoding,
}

impl EncodedImage {
    pub fn empty(encoding: Encoding) -> Self {
        Self {
            data: Bytes::new(),
            encoding,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        self.encoding.mime_type()
    }
}

// =============================================================================
// Encode / decode
// =============================================================================

pub fn encode(image: &RgbImage, options: &EncodeOptions) -> Result<EncodedImage, TileError> {
    let mut output = Vec::new();
    match options.encoding {
        Encoding::Jpeg => {
            let quality = clamp_quality(options.jpeg_quality);
            let mut encoder = JpegEncoder::new_with_quality(&mut output, quality);
            let result = if options.jpeg_subsampling == ChromaSubsampling::Full {
                encoder.encode_image(image)
            } else {
                encoder.encode_image(&decimate_chroma(image, options.jpeg_subsampling))
            };
            result.map_err(|e| TileError::encode(e.to_string()))?;
        }
        Encoding::Png => {
            PngEncoder::new(&mut output)
                .write_image(
                    image.as_raw(),
                    image.width(),
                    image.height(),
                    ExtendedColorType::Rgb8,
                )
                .map_err(|e| TileError::encode(e.to_string()))?;
        }
    }
    Ok(EncodedImage {
        data: Bytes::from(output),
        encoding: options.encoding,
    })
}

/// Decode JPEG or PNG bytes to RGB.
pub fn decode(data: &[u8]) -> Result<RgbImage, TileError> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| TileError::encode(format!("cannot identify tile image: {}", e)))?;
    let image = reader
        .decode()
        .map_err(|e| TileError::encode(format!("cannot decode tile image: {}", e)))?;
    Ok(image.to_rgb8())
}

/// Average chroma over `subsampling` blocks, keeping per-pixel luma.
fn decimate_chroma(image: &RgbImage, subsampling: ChromaSubsampling) -> RgbImage {
    let (bw, bh) = subsampling.block();
    let (width, height) = image.dimensions();
    let mut out = image.clone();

    for by in (0..height).step_by(bh as usize) {
        for bx in (0..width).step_by(bw as usize) {
            let x_end = (bx + bw).min(width);
            let y_end = (by + bh).min(height);

            let mut cb_sum = 0.0;
            let mut cr_sum = 0.0;
            let mut n = 0.0;
            for y in by..y_end {
                for x in bx..x_end {
                    let (_, cb, cr) = rgb_to_ycbcr(image.get_pixel(x, y).0);
                    cb_sum += cb;
                    cr_sum += cr;
                    n += 1.0;
                }
            }
            let (cb, cr) = (cb_sum / n, cr_sum / n);

            for y in by..y_end {
                for x in bx..x_end {
                    let (luma, _, _) = rgb_to_ycbcr(image.get_pixel(x, y).0);
                    out.put_pixel(x, y, image::Rgb(ycbcr_to_rgb(luma, cb, cr)));
                }
            }
        }
    }
    out
}

// JFIF conversion
fn rgb_to_ycbcr([r, g, b]: [u8; 3]) -> (f32, f32, f32) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
    (y, cb, cr)
}

fn ycbcr_to_rgb(y: f32, cb: f32, cr: f32) -> [u8; 3] {
    let r = y + 1.402 * (cr - 128.0);
    let g = y - 0.344_136 * (cb - 128.0) - 0.714_136 * (cr - 128.0);
    let b = y + 1.772 * (cb - 128.0);
    [to_u8(r), to_u8(g), to_u8(b)]
}

#[inline]
fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}
