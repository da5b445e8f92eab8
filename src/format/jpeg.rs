//! Rebuilding standalone JPEG streams from TIFF tile payloads.
//!
//! Tiled JPEG TIFFs store the quantization and Huffman tables once, in the
//! `JPEGTables` tag, as an abbreviated stream (`SOI tables EOI`). Each tile
//! is a frame that may or may not repeat its own tables. A decodable stream
//! is assembled as:
//!
//! ```text
//! SOI | tables without SOI/EOI | FF FF FF FF | frame from SOF, without EOI | EOI
//! ```
//!
//! The four `FF` bytes are marker fill bytes, which every JPEG decoder skips.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::JpegError;

pub const SOI: [u8; 2] = [0xFF, 0xD8];
pub const EOI: [u8; 2] = [0xFF, 0xD9];
/// Baseline DCT
pub const SOF0: [u8; 2] = [0xFF, 0xC0];
/// Progressive DCT
pub const SOF2: [u8; 2] = [0xFF, 0xC2];
pub const DHT: [u8; 2] = [0xFF, 0xC4];
pub const DQT: [u8; 2] = [0xFF, 0xDB];

const FILL: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];

/// Check a raw JPEGTables blob and return its interior (without SOI/EOI).
pub fn strip_tables(tables: &[u8]) -> Result<Bytes, JpegError> {
    if !tables.starts_with(&SOI) {
        return Err(JpegError::TablesMissingStartOfImage);
    }
    if tables.len() < 4 || !tables.ends_with(&EOI) {
        return Err(JpegError::TablesMissingEndOfImage);
    }
    let first = &tables[2..4];
    if first != DHT && first != DQT {
        return Err(JpegError::TablesMissingTableMarker);
    }
    Ok(Bytes::copy_from_slice(&tables[2..tables.len() - 2]))
}

/// Locate the Start Of Frame marker in a tile frame.
///
/// Fast path when SOF directly follows SOI. Otherwise baseline is searched
/// for before progressive, so a stream containing both resolves to baseline.
pub fn find_start_of_frame(frame: &[u8]) -> Result<usize, JpegError> {
    if frame.len() >= 4 && (frame[2..4] == SOF0 || frame[2..4] == SOF2) {
        return Ok(2);
    }
    let end = frame.len().saturating_sub(2);
    if end <= 2 {
        return Err(JpegError::FrameMissingStartOfFrame);
    }
    let body = &frame[2..end];
    [SOF0, SOF2]
        .iter()
        .find_map(|marker| body.windows(2).position(|w| w == marker))
        .map(|pos| pos + 2)
        .ok_or(JpegError::FrameMissingStartOfFrame)
}

/// Assemble a standalone JPEG from stripped tables and one tile frame.
pub fn rebuild_tile(tables_interior: &[u8], frame: &[u8]) -> Result<Bytes, JpegError> {
    if !frame.starts_with(&SOI) {
        return Err(JpegError::FrameMissingStartOfImage);
    }
    if frame.len() < 4 || !frame.ends_with(&EOI) {
        return Err(JpegError::FrameMissingEndOfImage);
    }
    let sof = find_start_of_frame(frame)?;
    let scan = &frame[sof..frame.len() - 2];

    let mut out = BytesMut::with_capacity(2 + tables_interior.len() + FILL.len() + scan.len() + 2);
    out.put_slice(&SOI);
    out.put_slice(tables_interior);
    out.put_slice(&FILL);
    out.put_slice(scan);
    out.put_slice(&EOI);
    Ok(out.freeze())
}

/// Whether `data` starts like a JPEG stream.
#[inline]
pub fn is_jpeg(data: &[u8]) -> bool {
    data.len() >= 3 && data[..3] == [0xFF, 0xD8, 0xFF]
}
