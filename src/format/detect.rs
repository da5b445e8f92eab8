//! Container format sniffing from leading magic bytes.
//!
//! The source registry asks each candidate implementation "can you open
//! this?" in order; the cheap first question is what the file claims to be.

use crate::error::IoError;
use crate::io::RangeReader;

use super::tiff::BIGTIFF_HEADER_SIZE;

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    /// Classic TIFF or BigTIFF, either byte order
    Tiff,
    Png,
    Jpeg,
}

impl ContainerFormat {
    pub const fn name(&self) -> &'static str {
        match self {
            ContainerFormat::Tiff => "TIFF",
            ContainerFormat::Png => "PNG",
            ContainerFormat::Jpeg => "JPEG",
        }
    }

    /// Whether the container is a flat raster the full-decode source handles.
    pub const fn is_raster(&self) -> bool {
        matches!(self, ContainerFormat::Png | ContainerFormat::Jpeg)
    }
}

/// Check for `II*\0`, `MM\0*`, `II+\0` or `MM\0+`.
pub fn is_tiff_header(bytes: &[u8]) -> bool {
    if bytes.len() < 4 {
        return false;
    }
    matches!(
        &bytes[..4],
        [0x49, 0x49, 0x2A, 0x00]
            | [0x4D, 0x4D, 0x00, 0x2A]
            | [0x49, 0x49, 0x2B, 0x00]
            | [0x4D, 0x4D, 0x00, 0x2B]
    )
}

pub fn detect_format(bytes: &[u8]) -> Option<ContainerFormat> {
    if is_tiff_header(bytes) {
        Some(ContainerFormat::Tiff)
    } else if bytes.starts_with(&PNG_SIGNATURE) {
        Some(ContainerFormat::Png)
    } else if bytes.len() >= 3 && bytes[..3] == [0xFF, 0xD8, 0xFF] {
        Some(ContainerFormat::Jpeg)
    } else {
        None
    }
}

/// Read the first bytes of `reader` and identify the container.
pub async fn sniff<R: RangeReader + ?Sized>(
    reader: &R,
) -> Result<Option<ContainerFormat>, IoError> {
    let len = (BIGTIFF_HEADER_SIZE as u64).min(reader.size()) as usize;
    let head = reader.read_exact_at(0, len).await?;
    Ok(detect_format(&head))
}
