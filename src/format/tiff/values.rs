//! Reading tag values that may live inline in an IFD entry or at an offset.
//!
//! Arrays (TileOffsets, TileByteCounts, JPEGTables) are fetched with a single
//! ranged read each.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, Ifd, IfdEntry, TiffHeader};
use super::tags::{FieldType, TiffTag};

/// Reads tag values for one container.
pub struct ValueReader<'a, R: RangeReader + ?Sized> {
    reader: &'a R,
    header: &'a TiffHeader,
}

impl<'a, R: RangeReader + ?Sized> ValueReader<'a, R> {
    pub fn new(reader: &'a R, header: &'a TiffHeader) -> Self {
        Self { reader, header }
    }

    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    /// Raw value bytes of an entry.
    pub async fn read_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        if let Some(inline) = entry.inline_bytes() {
            return Ok(Bytes::copy_from_slice(inline));
        }
        let size = entry
            .value_byte_size()
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;
        if size > self.reader.size() {
            return Err(TiffError::FileTooSmall {
                required: size,
                actual: self.reader.size(),
            });
        }
        let offset = entry.value_offset(self.header.byte_order);
        Ok(self.reader.read_exact_at(offset, size as usize).await?)
    }

    /// All values of an unsigned integer entry, widened to u64.
    pub async fn read_u64_array(
        &self,
        tag: TiffTag,
        entry: &IfdEntry,
    ) -> Result<Vec<u64>, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;
        if entry.count == 0 {
            return Ok(Vec::new());
        }
        let bytes = self.read_bytes(entry).await?;
        parse_u64_array(&bytes, entry.count as usize, field_type, self.byte_order()).ok_or_else(
            || TiffError::InvalidTagValue {
                tag: tag.name(),
                message: format!("expected an unsigned integer type, got {:?}", field_type),
            },
        )
    }

    /// First value of `tag`, or `None` when the tag is absent.
    pub async fn read_first(&self, ifd: &Ifd, tag: TiffTag) -> Result<Option<u64>, TiffError> {
        let Some(entry) = ifd.get_entry_by_tag(tag) else {
            return Ok(None);
        };
        if let Some(value) = entry.inline_u64(self.byte_order()) {
            return Ok(Some(value));
        }
        let values = self.read_u64_array(tag, entry).await?;
        Ok(values.first().copied())
    }

    pub async fn read_string(&self, entry: &IfdEntry) -> Result<String, TiffError> {
        if entry.field_type != Some(FieldType::Ascii) {
            return Err(TiffError::InvalidTagValue {
                tag: "ASCII",
                message: format!("expected Ascii, got type {}", entry.field_type_raw),
            });
        }
        let bytes = self.read_bytes(entry).await?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}

/// Decode `count` unsigned values. Returns `None` for non-integer types;
/// a short buffer yields fewer values.
pub fn parse_u64_array(
    bytes: &[u8],
    count: usize,
    field_type: FieldType,
    byte_order: ByteOrder,
) -> Option<Vec<u64>> {
    let width = match field_type {
        FieldType::Byte | FieldType::Short | FieldType::Long | FieldType::Long8 => {
            field_type.size_in_bytes()
        }
        _ => return None,
    };

    let values = bytes
        .chunks_exact(width)
        .take(count)
        .map(|chunk| match field_type {
            FieldType::Byte => chunk[0] as u64,
            FieldType::Short => byte_order.read_u16(chunk) as u64,
            FieldType::Long => byte_order.read_u32(chunk) as u64,
            _ => byte_order.read_u64(chunk),
        })
        .collect();
    Some(values)
}
