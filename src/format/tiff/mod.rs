//! Tiled JPEG TIFF reading.
//!
//! - [`parser`], [`tags`], [`values`]: header, IFD and tag value decoding
//!   for classic TIFF and BigTIFF in either byte order.
//! - [`validation`]: the strict checks a directory must pass before its
//!   tiles can be passed through without decoding.
//! - [`directory`]: per-directory layout and raw tile extraction.
//! - [`pyramid`]: arranging directories into pyramid levels.

mod directory;
#[cfg(test)]
pub(crate) mod fixtures;
mod layout_cache;
mod parser;
mod pyramid;
mod tags;
mod validation;
mod values;

pub use directory::{DirectoryLayout, TiffStructure, TiledDirectory, MAX_DIRECTORIES};
pub use layout_cache::{DirectoryKey, LayoutCache, DEFAULT_LAYOUT_CACHE_ENTRIES};
pub use parser::{
    ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, MAX_IFD_ENTRIES, TIFF_HEADER_SIZE,
};
pub use pyramid::{level_count, LevelDescriptor, PyramidLayout};
pub use tags::{FieldType, TiffTag};
pub use validation::DirectoryFields;
pub use values::{parse_u64_array, ValueReader};
