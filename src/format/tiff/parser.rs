//! TIFF header and IFD parsing.
//!
//! Operates on byte slices that the caller has already fetched; all async I/O
//! lives in [`super::directory`].
//!
//! ```text
//! Classic TIFF header (8 bytes)     BigTIFF header (16 bytes)
//!   0-1  byte order (II / MM)         0-1   byte order
//!   2-3  42                           2-3   43
//!   4-7  first IFD offset             4-5   offset size (8)
//!                                     6-7   reserved
//!                                     8-15  first IFD offset
//!
//! IFD: entry count (2 | 8), entries (12 | 20 bytes each), next offset (4 | 8)
//! Entry: tag (2), type (2), count (4 | 8), value or offset (4 | 8)
//! ```

use std::collections::HashMap;

use super::tags::{FieldType, TiffTag};
use crate::error::TiffError;
use crate::io::{read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le};

const BYTE_ORDER_LITTLE_ENDIAN: u16 = 0x4949;
const BYTE_ORDER_BIG_ENDIAN: u16 = 0x4D4D;

const VERSION_TIFF: u16 = 42;
const VERSION_BIGTIFF: u16 = 43;

pub const TIFF_HEADER_SIZE: usize = 8;
pub const BIGTIFF_HEADER_SIZE: usize = 16;

/// Upper bound on entries in one IFD; real files carry a few dozen.
pub const MAX_IFD_ENTRIES: u64 = 4096;

// =============================================================================
// ByteOrder
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// "II"
    LittleEndian,
    /// "MM"
    BigEndian,
}

impl ByteOrder {
    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            ByteOrder::LittleEndian => read_u16_le(bytes),
            ByteOrder::BigEndian => read_u16_be(bytes),
        }
    }

    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            ByteOrder::LittleEndian => read_u32_le(bytes),
            ByteOrder::BigEndian => read_u32_be(bytes),
        }
    }

    #[inline]
    pub fn read_u64(self, bytes: &[u8]) -> u64 {
        match self {
            ByteOrder::LittleEndian => read_u64_le(bytes),
            ByteOrder::BigEndian => read_u64_be(bytes),
        }
    }
}

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed TIFF file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    pub byte_order: ByteOrder,
    pub is_bigtiff: bool,
    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Parse a header from the first bytes of a file.
    ///
    /// Pass at least [`BIGTIFF_HEADER_SIZE`] bytes when the file is large
    /// enough, so BigTIFF headers can be read in one go. The first IFD offset
    /// is checked against `file_size`.
    pub fn parse(bytes: &[u8], file_size: u64) -> Result<Self, TiffError> {
        if bytes.len() < TIFF_HEADER_SIZE {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        // Byte order marker is a palindrome, so reading it either way works
        let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
        let byte_order = match magic {
            BYTE_ORDER_LITTLE_ENDIAN => ByteOrder::LittleEndian,
            BYTE_ORDER_BIG_ENDIAN => ByteOrder::BigEndian,
            _ => return Err(TiffError::InvalidMagic(magic)),
        };

        let version = byte_order.read_u16(&bytes[2..4]);
        let (is_bigtiff, first_ifd_offset) = match version {
            VERSION_TIFF => (false, byte_order.read_u32(&bytes[4..8]) as u64),
            VERSION_BIGTIFF => {
                if bytes.len() < BIGTIFF_HEADER_SIZE {
                    return Err(TiffError::FileTooSmall {
                        required: BIGTIFF_HEADER_SIZE as u64,
                        actual: bytes.len() as u64,
                    });
                }
                let offset_size = byte_order.read_u16(&bytes[4..6]);
                if offset_size != 8 {
                    return Err(TiffError::InvalidBigTiffOffsetSize(offset_size));
                }
                (true, byte_order.read_u64(&bytes[8..16]))
            }
            _ => return Err(TiffError::InvalidVersion(version)),
        };

        if first_ifd_offset >= file_size {
            return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
        }

        Ok(TiffHeader {
            byte_order,
            is_bigtiff,
            first_ifd_offset,
        })
    }

    /// 12 bytes in classic TIFF, 20 in BigTIFF.
    #[inline]
    pub const fn ifd_entry_size(&self) -> usize {
        if self.is_bigtiff {
            20
        } else {
            12
        }
    }

    #[inline]
    pub const fn ifd_count_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            2
        }
    }

    #[inline]
    pub const fn ifd_next_offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }

    /// Width of an entry's count field and of its value/offset field.
    #[inline]
    pub const fn value_offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }

    /// Decode the entry-count field at the start of an IFD.
    pub fn parse_entry_count(&self, bytes: &[u8]) -> Result<u64, TiffError> {
        let needed = self.ifd_count_size();
        if bytes.len() < needed {
            return Err(TiffError::FileTooSmall {
                required: needed as u64,
                actual: bytes.len() as u64,
            });
        }
        Ok(if self.is_bigtiff {
            self.byte_order.read_u64(&bytes[..8])
        } else {
            self.byte_order.read_u16(&bytes[..2]) as u64
        })
    }
}

// =============================================================================
// IFD entries
// =============================================================================

/// One 12- or 20-byte IFD entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfdEntry {
    pub tag_id: u16,
    /// `None` when the type code is unknown
    pub field_type: Option<FieldType>,
    pub field_type_raw: u16,
    pub count: u64,
    /// The raw value/offset field, 4 or 8 bytes
    pub value_offset_bytes: Vec<u8>,
    /// Whether the values live in `value_offset_bytes` rather than at an offset
    pub is_inline: bool,
}

impl IfdEntry {
    fn parse(bytes: &[u8], header: &TiffHeader) -> Self {
        let bo = header.byte_order;
        let tag_id = bo.read_u16(&bytes[0..2]);
        let field_type_raw = bo.read_u16(&bytes[2..4]);
        let field_type = FieldType::from_u16(field_type_raw);

        let (count, value_start) = if header.is_bigtiff {
            (bo.read_u64(&bytes[4..12]), 12)
        } else {
            (bo.read_u32(&bytes[4..8]) as u64, 8)
        };
        let value_offset_bytes = bytes[value_start..value_start + header.value_offset_size()].to_vec();

        let is_inline = field_type
            .map(|ft| ft.fits_inline(count, header.is_bigtiff))
            .unwrap_or(false);

        IfdEntry {
            tag_id,
            field_type,
            field_type_raw,
            count,
            value_offset_bytes,
            is_inline,
        }
    }

    /// Total size of the entry's values in bytes, if the type is known.
    pub fn value_byte_size(&self) -> Option<u64> {
        self.field_type
            .and_then(|ft| (ft.size_in_bytes() as u64).checked_mul(self.count))
    }

    /// Interpret the value field as a file offset.
    pub fn value_offset(&self, byte_order: ByteOrder) -> u64 {
        if self.value_offset_bytes.len() == 8 {
            byte_order.read_u64(&self.value_offset_bytes)
        } else {
            byte_order.read_u32(&self.value_offset_bytes) as u64
        }
    }

    /// The inline value bytes, trimmed to the value size.
    pub fn inline_bytes(&self) -> Option<&[u8]> {
        if !self.is_inline {
            return None;
        }
        let size = self.value_byte_size()? as usize;
        Some(&self.value_offset_bytes[..size])
    }

    /// First value of an inline unsigned integer entry.
    pub fn inline_u64(&self, byte_order: ByteOrder) -> Option<u64> {
        if self.count == 0 {
            return None;
        }
        let bytes = self.inline_bytes()?;
        match self.field_type? {
            FieldType::Byte => Some(bytes[0] as u64),
            FieldType::Short => Some(byte_order.read_u16(bytes) as u64),
            FieldType::Long => Some(byte_order.read_u32(bytes) as u64),
            FieldType::Long8 => Some(byte_order.read_u64(bytes)),
            _ => None,
        }
    }

    pub fn inline_u32(&self, byte_order: ByteOrder) -> Option<u32> {
        self.inline_u64(byte_order)
            .and_then(|v| u32::try_from(v).ok())
    }
}

// =============================================================================
// Ifd
// =============================================================================

/// A parsed Image File Directory.
#[derive(Debug, Clone)]
pub struct Ifd {
    pub entries: Vec<IfdEntry>,
    entries_by_tag: HashMap<u16, usize>,
    /// 0 when this is the last directory
    pub next_ifd_offset: u64,
}

impl Ifd {
    /// Bytes occupied by an IFD with `entry_count` entries, count field and
    /// next-offset field included.
    pub fn byte_size(entry_count: u64, header: &TiffHeader) -> u64 {
        header.ifd_count_size() as u64
            + entry_count * header.ifd_entry_size() as u64
            + header.ifd_next_offset_size() as u64
    }

    /// Parse an IFD from bytes starting at its entry-count field.
    pub fn parse(bytes: &[u8], header: &TiffHeader) -> Result<Self, TiffError> {
        let count = header.parse_entry_count(bytes)?;
        if count > MAX_IFD_ENTRIES {
            return Err(TiffError::InvalidTagValue {
                tag: "IFD",
                message: format!("entry count {} exceeds {}", count, MAX_IFD_ENTRIES),
            });
        }

        let needed = Self::byte_size(count, header);
        if (bytes.len() as u64) < needed {
            return Err(TiffError::FileTooSmall {
                required: needed,
                actual: bytes.len() as u64,
            });
        }

        let entry_size = header.ifd_entry_size();
        let mut pos = header.ifd_count_size();
        let mut entries = Vec::with_capacity(count as usize);
        let mut entries_by_tag = HashMap::with_capacity(count as usize);

        for i in 0..count as usize {
            let entry = IfdEntry::parse(&bytes[pos..pos + entry_size], header);
            // First occurrence wins on duplicate tags
            entries_by_tag.entry(entry.tag_id).or_insert(i);
            entries.push(entry);
            pos += entry_size;
        }

        let next_ifd_offset = if header.is_bigtiff {
            header.byte_order.read_u64(&bytes[pos..pos + 8])
        } else {
            header.byte_order.read_u32(&bytes[pos..pos + 4]) as u64
        };

        Ok(Ifd {
            entries,
            entries_by_tag,
            next_ifd_offset,
        })
    }

    pub fn get_entry_by_tag(&self, tag: TiffTag) -> Option<&IfdEntry> {
        self.entries_by_tag
            .get(&tag.as_u16())
            .map(|&i| &self.entries[i])
    }

    pub fn has_tag(&self, tag: TiffTag) -> bool {
        self.entries_by_tag.contains_key(&tag.as_u16())
    }

    /// Single inline integer value of `tag`, if present and readable inline.
    pub fn inline_value(&self, tag: TiffTag, byte_order: ByteOrder) -> Option<u64> {
        self.get_entry_by_tag(tag)
            .and_then(|e| e.inline_u64(byte_order))
    }

    pub fn image_width(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_entry_by_tag(TiffTag::ImageWidth)
            .and_then(|e| e.inline_u32(byte_order))
    }

    pub fn image_height(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_entry_by_tag(TiffTag::ImageLength)
            .and_then(|e| e.inline_u32(byte_order))
    }

    pub fn tile_width(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_entry_by_tag(TiffTag::TileWidth)
            .and_then(|e| e.inline_u32(byte_order))
    }

    pub fn tile_height(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_entry_by_tag(TiffTag::TileLength)
            .and_then(|e| e.inline_u32(byte_order))
    }
}
