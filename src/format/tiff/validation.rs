//! Strict directory validation for the tile extractor.
//!
//! Only tiled, JPEG-compressed, 8-bit RGB/YCbCr directories with shared
//! JPEGTables can have their tiles passed through without decoding. Anything
//! else is refused with a [`ValidationError`] naming the first failed check.

use crate::error::{TiffError, ValidationError};
use crate::io::RangeReader;

use super::parser::Ifd;
use super::tags::{
    TiffTag, COMPRESSION_JPEG, COMPRESSION_NONE, ORIENTATION_TOP_LEFT, PHOTOMETRIC_RGB,
    PHOTOMETRIC_YCBCR, PLANAR_CONTIGUOUS, SAMPLE_FORMAT_UINT,
};
use super::values::ValueReader;

/// Tag values the validator looks at, with TIFF defaults applied for
/// absent tags (Photometric has none).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryFields {
    pub samples_per_pixel: u64,
    /// First BitsPerSample value
    pub bits_per_sample: u64,
    pub sample_format: u64,
    pub planar_configuration: u64,
    pub photometric: Option<u64>,
    pub orientation: u64,
    pub compression: u64,
    pub tile_width: Option<u64>,
    pub tile_length: Option<u64>,
    pub has_jpeg_tables: bool,
}

impl DirectoryFields {
    /// Collect the fields from an IFD, fetching out-of-line values as needed.
    pub async fn read<R: RangeReader + ?Sized>(
        values: &ValueReader<'_, R>,
        ifd: &Ifd,
    ) -> Result<Self, TiffError> {
        Ok(DirectoryFields {
            samples_per_pixel: values
                .read_first(ifd, TiffTag::SamplesPerPixel)
                .await?
                .unwrap_or(1),
            bits_per_sample: values
                .read_first(ifd, TiffTag::BitsPerSample)
                .await?
                .unwrap_or(1),
            sample_format: values
                .read_first(ifd, TiffTag::SampleFormat)
                .await?
                .unwrap_or(SAMPLE_FORMAT_UINT as u64),
            planar_configuration: values
                .read_first(ifd, TiffTag::PlanarConfiguration)
                .await?
                .unwrap_or(PLANAR_CONTIGUOUS as u64),
            photometric: values
                .read_first(ifd, TiffTag::PhotometricInterpretation)
                .await?,
            orientation: values
                .read_first(ifd, TiffTag::Orientation)
                .await?
                .unwrap_or(ORIENTATION_TOP_LEFT as u64),
            compression: values
                .read_first(ifd, TiffTag::Compression)
                .await?
                .unwrap_or(COMPRESSION_NONE as u64),
            tile_width: values.read_first(ifd, TiffTag::TileWidth).await?,
            tile_length: values.read_first(ifd, TiffTag::TileLength).await?,
            has_jpeg_tables: ifd.has_tag(TiffTag::JpegTables),
        })
    }

    /// Run the checks in order; the first failure is returned.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.samples_per_pixel != 3 {
            return Err(ValidationError::NotRgb);
        }
        if self.bits_per_sample != 8 {
            return Err(ValidationError::NotSingleByteSampled);
        }
        if self.sample_format != SAMPLE_FORMAT_UINT as u64 {
            return Err(ValidationError::NotUnsignedSamples);
        }
        if self.planar_configuration != PLANAR_CONTIGUOUS as u64 {
            return Err(ValidationError::NotContiguous);
        }
        match self.photometric {
            Some(p) if p == PHOTOMETRIC_RGB as u64 || p == PHOTOMETRIC_YCBCR as u64 => {}
            _ => return Err(ValidationError::UnsupportedPhotometric),
        }
        if self.orientation != ORIENTATION_TOP_LEFT as u64 {
            return Err(ValidationError::NotTopLeft);
        }
        if self.compression != COMPRESSION_JPEG as u64 {
            return Err(ValidationError::NotJpeg);
        }
        let (Some(width), Some(length)) = (self.tile_width, self.tile_length) else {
            return Err(ValidationError::NotTiled);
        };
        if width != length {
            return Err(ValidationError::NonSquareTiles);
        }
        if !self.has_jpeg_tables {
            return Err(ValidationError::MissingJpegTables);
        }
        Ok(())
    }
}
