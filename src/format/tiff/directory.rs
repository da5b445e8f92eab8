//! Raw tile extraction from one TIFF directory.
//!
//! [`DirectoryLayout`] is everything derived from an IFD that tile reads need:
//! geometry, the offset and byte-count tables, and the shared JPEG tables.
//! It is computed once, never mutated, and can be shared between handles to
//! the same file. [`TiledDirectory`] pairs a layout with a reader and hands
//! out standalone JPEG tiles.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::error::{IoError, JpegError, TiffError};
use crate::format::jpeg;
use crate::io::RangeReader;

use super::parser::{Ifd, TiffHeader, BIGTIFF_HEADER_SIZE};
use super::tags::{FieldType, TiffTag};
use super::validation::DirectoryFields;
use super::values::ValueReader;

/// Directories beyond this are ignored.
pub const MAX_DIRECTORIES: usize = 1024;

// =============================================================================
// Container structure
// =============================================================================

/// Header plus every IFD in chain order.
#[derive(Debug, Clone)]
pub struct TiffStructure {
    pub header: TiffHeader,
    pub ifds: Vec<Ifd>,
}

impl TiffStructure {
    /// Walk the IFD chain. Cycles and chains longer than
    /// [`MAX_DIRECTORIES`] stop the walk without failing it.
    pub async fn read<R: RangeReader + ?Sized>(reader: &R) -> Result<Self, TiffError> {
        let size = reader.size();
        let header_len = (BIGTIFF_HEADER_SIZE as u64).min(size) as usize;
        let header_bytes = reader.read_exact_at(0, header_len).await?;
        let header = TiffHeader::parse(&header_bytes, size)?;

        let mut ifds = Vec::new();
        let mut visited = HashSet::new();
        let mut offset = header.first_ifd_offset;

        while offset != 0 && ifds.len() < MAX_DIRECTORIES {
            if !visited.insert(offset) {
                debug!(
                    file = reader.identifier(),
                    offset, "IFD chain loops back, stopping"
                );
                break;
            }

            let count_size = header.ifd_count_size() as u64;
            if offset.saturating_add(count_size) > size {
                return Err(TiffError::InvalidIfdOffset(offset));
            }
            let count_bytes = reader.read_exact_at(offset, count_size as usize).await?;
            let entry_count = header.parse_entry_count(&count_bytes)?;

            let ifd_size = Ifd::byte_size(entry_count, &header);
            if offset.saturating_add(ifd_size) > size {
                return Err(TiffError::InvalidIfdOffset(offset));
            }
            let ifd_bytes = reader.read_exact_at(offset, ifd_size as usize).await?;
            let ifd = Ifd::parse(&ifd_bytes, &header)?;

            offset = ifd.next_ifd_offset;
            ifds.push(ifd);
        }

        Ok(TiffStructure { header, ifds })
    }
}

// =============================================================================
// DirectoryLayout
// =============================================================================

/// Immutable per-directory metadata for tile extraction.
#[derive(Debug, Clone)]
pub struct DirectoryLayout {
    pub index: usize,
    pub width: u32,
    pub height: u32,
    /// Tiles are square; validated at construction
    pub tile_size: u32,
    pub tiles_across: u32,
    pub tiles_down: u32,
    tile_offsets: Vec<u64>,
    tile_byte_counts: Vec<u64>,
    /// Table interior, or why the tables can't be used. Checked once here
    /// and reported on every tile read, leaving the directory usable for
    /// metadata.
    tables: Result<Bytes, JpegError>,
}

impl DirectoryLayout {
    /// Validate directory `index` and derive its layout.
    pub async fn read<R: RangeReader + ?Sized>(
        reader: &R,
        header: &TiffHeader,
        index: usize,
        ifd: &Ifd,
    ) -> Result<Self, TiffError> {
        let values = ValueReader::new(reader, header);

        let fields = DirectoryFields::read(&values, ifd).await?;
        fields.validate()?;

        let width = read_dimension(&values, ifd, TiffTag::ImageWidth).await?;
        let height = read_dimension(&values, ifd, TiffTag::ImageLength).await?;
        let tile_size = read_dimension(&values, ifd, TiffTag::TileWidth).await?;

        let offsets_entry = ifd
            .get_entry_by_tag(TiffTag::TileOffsets)
            .ok_or(TiffError::MissingTag("TileOffsets"))?;
        let tile_offsets = values
            .read_u64_array(TiffTag::TileOffsets, offsets_entry)
            .await?;

        let counts_entry = ifd
            .get_entry_by_tag(TiffTag::TileByteCounts)
            .ok_or(TiffError::MissingTag("TileByteCounts"))?;
        match counts_entry.field_type {
            Some(FieldType::Short) | Some(FieldType::Long) | Some(FieldType::Long8) => {}
            _ => return Err(TiffError::InvalidByteCountType(counts_entry.field_type_raw)),
        }
        let tile_byte_counts = values
            .read_u64_array(TiffTag::TileByteCounts, counts_entry)
            .await?;

        let tables = match ifd.get_entry_by_tag(TiffTag::JpegTables) {
            Some(entry) => match values.read_bytes(entry).await {
                Ok(raw) => jpeg::strip_tables(&raw),
                Err(_) => Err(JpegError::TablesUnreadable),
            },
            None => Err(JpegError::TablesUnreadable),
        };

        Ok(DirectoryLayout {
            index,
            width,
            height,
            tile_size,
            tiles_across: width.div_ceil(tile_size),
            tiles_down: height.div_ceil(tile_size),
            tile_offsets,
            tile_byte_counts,
            tables,
        })
    }

    pub fn tile_count(&self) -> usize {
        self.tile_offsets.len().min(self.tile_byte_counts.len())
    }

    /// Shared JPEG tables without their SOI/EOI markers.
    pub fn tables(&self) -> Result<&Bytes, JpegError> {
        self.tables.as_ref().map_err(|e| *e)
    }

    /// File location of tile `(x, y)`.
    pub fn tile_location(&self, x: u32, y: u32) -> Result<(u64, u64), TiffError> {
        let ts = self.tile_size as u64;
        if x as u64 * ts >= self.width as u64 || y as u64 * ts >= self.height as u64 {
            return Err(TiffError::TileNotFound { x, y });
        }
        let number = y as usize * self.tiles_across as usize + x as usize;
        match (
            self.tile_offsets.get(number),
            self.tile_byte_counts.get(number),
        ) {
            (Some(&offset), Some(&count)) => Ok((offset, count)),
            _ => Err(TiffError::TileNumberOutOfRange),
        }
    }
}

async fn read_dimension<R: RangeReader + ?Sized>(
    values: &ValueReader<'_, R>,
    ifd: &Ifd,
    tag: TiffTag,
) -> Result<u32, TiffError> {
    let value = values
        .read_first(ifd, tag)
        .await?
        .ok_or(TiffError::MissingTag(tag.name()))?;
    match u32::try_from(value) {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(TiffError::InvalidTagValue {
            tag: tag.name(),
            message: format!("expected a positive 32-bit value, got {}", value),
        }),
    }
}

// =============================================================================
// TiledDirectory
// =============================================================================

/// An open handle on one validated directory.
pub struct TiledDirectory<R: RangeReader + ?Sized> {
    reader: Arc<R>,
    layout: Arc<DirectoryLayout>,
}

impl<R: RangeReader + ?Sized> TiledDirectory<R> {
    /// Open directory `index`. A directory that fails validation yields no
    /// handle.
    pub async fn open(reader: Arc<R>, index: usize) -> Result<Self, TiffError> {
        let structure = TiffStructure::read(&*reader).await?;
        let ifd = structure
            .ifds
            .get(index)
            .ok_or(TiffError::DirectoryNotFound(index))?;
        let layout = DirectoryLayout::read(&*reader, &structure.header, index, ifd).await?;
        Ok(Self::from_layout(reader, Arc::new(layout)))
    }

    /// Reuse a layout computed earlier for the same file.
    pub fn from_layout(reader: Arc<R>, layout: Arc<DirectoryLayout>) -> Self {
        Self { reader, layout }
    }

    pub fn layout(&self) -> &DirectoryLayout {
        &self.layout
    }

    /// Read tile `(x, y)` as a standalone JPEG.
    ///
    /// Failures affect this tile only; the handle stays usable.
    pub async fn tile(&self, x: u32, y: u32) -> Result<Bytes, TiffError> {
        let (offset, count) = self.layout.tile_location(x, y)?;
        let tables = self.layout.tables()?;

        let frame = self
            .reader
            .read_exact_at(offset, count as usize)
            .await
            .map_err(|e| match e {
                IoError::RangeOutOfBounds { .. } => TiffError::BufferUnderflow,
                other => TiffError::Io(other),
            })?;

        Ok(jpeg::rebuild_tile(tables, &frame)?)
    }
}
