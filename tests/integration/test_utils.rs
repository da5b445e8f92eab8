//! Test utilities for integration tests.
//!
//! Builds real tiled JPEG TIFF pyramids on disk. Every tile of a directory
//! shares one encoded frame, which keeps very large pyramids cheap to write.

use std::path::Path;
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};

use tile_pyramid::{LocalStorage, SourceOptions, SourceRegistry, TileService};

// =============================================================================
// Test JPEG Creation
// =============================================================================

/// Encode a `size` by `size` tile filled with `color`.
pub fn create_solid_jpeg(size: u32, color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(size, size, Rgb(color));
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, 90)
        .encode_image(&img)
        .unwrap();
    buf
}

/// Collect the DQT and DHT segments of a JPEG into a JPEGTables blob.
pub fn extract_tables(jpeg: &[u8]) -> Vec<u8> {
    let mut tables = vec![0xFF, 0xD8];
    let mut i = 2;
    while i + 4 <= jpeg.len() && jpeg[i] == 0xFF {
        let marker = jpeg[i + 1];
        if marker == 0xDA {
            break;
        }
        let len = u16::from_be_bytes([jpeg[i + 2], jpeg[i + 3]]) as usize;
        if marker == 0xDB || marker == 0xC4 {
            tables.extend_from_slice(&jpeg[i..i + 2 + len]);
        }
        i += 2 + len;
    }
    tables.extend_from_slice(&[0xFF, 0xD9]);
    tables
}

pub fn is_jpeg(data: &[u8]) -> bool {
    data.len() > 4 && data[..2] == [0xFF, 0xD8] && data[data.len() - 2..] == [0xFF, 0xD9]
}

pub fn is_png(data: &[u8]) -> bool {
    data.starts_with(&[0x89, b'P', b'N', b'G'])
}

pub fn decoded_size(data: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(data).unwrap();
    (img.width(), img.height())
}

// =============================================================================
// TIFF Pyramid Builder
// =============================================================================

const SHORT: u16 = 3;
const LONG: u16 = 4;
const UNDEFINED: u16 = 7;
const LONG8: u16 = 16;

/// Builder for tiled JPEG TIFF pyramids.
pub struct PyramidBuilder {
    width: u32,
    height: u32,
    tile_size: u32,
    bigtiff: bool,
    /// Downsample exponents of the directories to write
    halvings: Vec<u32>,
    color: [u8; 3],
    compression: u16,
    /// Reduced levels use `size >> k` instead of `ceil(size / 2^k)`
    rounded_down: bool,
}

impl PyramidBuilder {
    /// A pyramid with a directory for every halving down to one tile.
    pub fn new(width: u32, height: u32, tile_size: u32) -> Self {
        let mut halvings = vec![0];
        while (tile_size << halvings.len().saturating_sub(1)) < width.max(height) {
            halvings.push(halvings.len() as u32);
        }
        Self {
            width,
            height,
            tile_size,
            bigtiff: false,
            halvings,
            color: [200, 40, 40],
            compression: 7,
            rounded_down: false,
        }
    }

    /// Keep only the directories with these downsample exponents.
    pub fn with_halvings(mut self, halvings: &[u32]) -> Self {
        self.halvings = halvings.to_vec();
        self
    }

    pub fn with_bigtiff(mut self, bigtiff: bool) -> Self {
        self.bigtiff = bigtiff;
        self
    }

    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = color;
        self
    }

    /// Declare a different Compression tag; the frames stay JPEG.
    pub fn with_compression(mut self, compression: u16) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_rounded_down(mut self, rounded_down: bool) -> Self {
        self.rounded_down = rounded_down;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let frame = create_solid_jpeg(self.tile_size, self.color);
        let tables = extract_tables(&frame);
        let word = if self.bigtiff { 8 } else { 4 };

        let mut data = Vec::new();
        data.extend_from_slice(b"II");
        if self.bigtiff {
            data.extend_from_slice(&43u16.to_le_bytes());
            data.extend_from_slice(&8u16.to_le_bytes());
            data.extend_from_slice(&0u16.to_le_bytes());
        } else {
            data.extend_from_slice(&42u16.to_le_bytes());
        }
        let mut next_pointer = data.len();
        data.extend(vec![0u8; word]);

        let frame_offset = data.len() as u64;
        data.extend_from_slice(&frame);

        for &k in &self.halvings {
            let (width, height) = if self.rounded_down {
                ((self.width >> k).max(1), (self.height >> k).max(1))
            } else {
                (self.width.div_ceil(1 << k), self.height.div_ceil(1 << k))
            };
            let tiles = (width.div_ceil(self.tile_size) * height.div_ceil(self.tile_size)) as usize;

            let offsets_type = if self.bigtiff { LONG8 } else { LONG };
            let offsets: Vec<u8> = (0..tiles)
                .flat_map(|_| le_word(frame_offset, word))
                .collect();
            let counts: Vec<u8> = (0..tiles)
                .flat_map(|_| (frame.len() as u32).to_le_bytes())
                .collect();
            let bits: Vec<u8> = [8u16, 8, 8].iter().flat_map(|v| v.to_le_bytes()).collect();

            let mut entries: Vec<(u16, u16, u64, Vec<u8>)> = vec![
                (256, LONG, 1, width.to_le_bytes().to_vec()),
                (257, LONG, 1, height.to_le_bytes().to_vec()),
                (258, SHORT, 3, bits),
                (259, SHORT, 1, self.compression.to_le_bytes().to_vec()),
                (262, SHORT, 1, 6u16.to_le_bytes().to_vec()),
                (277, SHORT, 1, 3u16.to_le_bytes().to_vec()),
                (284, SHORT, 1, 1u16.to_le_bytes().to_vec()),
                (322, SHORT, 1, (self.tile_size as u16).to_le_bytes().to_vec()),
                (323, SHORT, 1, (self.tile_size as u16).to_le_bytes().to_vec()),
                (324, offsets_type, tiles as u64, offsets),
                (325, LONG, tiles as u64, counts),
                (347, UNDEFINED, tables.len() as u64, tables.clone()),
            ];

            // Spill values that do not fit in the entry
            for entry in entries.iter_mut() {
                if entry.3.len() > word {
                    if data.len() % 2 == 1 {
                        data.push(0);
                    }
                    let at = data.len() as u64;
                    data.extend_from_slice(&entry.3);
                    entry.3 = le_word(at, word);
                } else {
                    entry.3.resize(word, 0);
                }
            }

            if data.len() % 2 == 1 {
                data.push(0);
            }
            let ifd_offset = data.len() as u64;
            data[next_pointer..next_pointer + word].copy_from_slice(&le_word(ifd_offset, word));

            if self.bigtiff {
                data.extend_from_slice(&(entries.len() as u64).to_le_bytes());
            } else {
                data.extend_from_slice(&(entries.len() as u16).to_le_bytes());
            }
            for (tag, field_type, count, value) in &entries {
                data.extend_from_slice(&tag.to_le_bytes());
                data.extend_from_slice(&field_type.to_le_bytes());
                data.extend(le_word(*count, word));
                data.extend_from_slice(value);
            }
            next_pointer = data.len();
            data.extend(vec![0u8; word]);
        }

        data
    }
}

fn le_word(value: u64, word: usize) -> Vec<u8> {
    value.to_le_bytes()[..word].to_vec()
}

// =============================================================================
// Service helpers
// =============================================================================

pub fn write_file(dir: &Path, name: &str, data: &[u8]) {
    std::fs::write(dir.join(name), data).unwrap();
}

pub fn create_service(dir: &Path) -> TileService {
    TileService::new(create_registry(dir))
}

pub fn create_registry(dir: &Path) -> SourceRegistry {
    SourceRegistry::new(Arc::new(LocalStorage::new(dir)), SourceOptions::default())
}
