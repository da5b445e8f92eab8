use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IoError;

/// Positional reads over an image container.
///
/// The TIFF parser only ever asks for specific byte ranges (header, IFDs,
/// value arrays, tile payloads), so a container handle is anything that can
/// answer `read_exact_at`. Implementations decide how concurrent callers are
/// serialized.
#[async_trait]
pub trait RangeReader: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// Fails with [`IoError::RangeOutOfBounds`] when the range runs past the
    /// end of the resource.
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError>;

    /// Total size of the resource in bytes.
    fn size(&self) -> u64;

    /// Stable identifier (the path for files), used for logs and cache keys.
    fn identifier(&self) -> &str;

    /// Read the whole resource.
    async fn read_all(&self) -> Result<Bytes, IoError> {
        self.read_exact_at(0, self.size() as usize).await
    }
}

/// Reject ranges that run past `size`.
pub(crate) fn check_range(offset: u64, len: usize, size: u64) -> Result<(), IoError> {
    let end = offset.checked_add(len as u64);
    match end {
        Some(end) if end <= size => Ok(()),
        _ => Err(IoError::RangeOutOfBounds {
            offset,
            requested: len as u64,
            size,
        }),
    }
}

// =============================================================================
// Endian helpers
// =============================================================================
//
// Callers guarantee slice length; every call site slices exactly 2, 4 or 8
// bytes out of a buffer whose length was checked first.

#[inline]
pub fn read_u16_le(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

#[inline]
pub fn read_u16_be(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

#[inline]
pub fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[inline]
pub fn read_u32_be(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[inline]
pub fn read_u64_le(bytes: &[u8]) -> u64 {
    u64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}

#[inline]
pub fn read_u64_be(bytes: &[u8]) -> u64 {
    u64::from_be_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}
