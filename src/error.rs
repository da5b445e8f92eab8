use http::StatusCode;
use thiserror::Error;

/// I/O errors raised by the byte-range readers
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// File does not exist or cannot be opened
    #[error("File not found: {0}")]
    NotFound(String),

    /// Underlying read or seek failed
    #[error("Read error on {path}: {message}")]
    Read { path: String, message: String },

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },
}

/// Marker failures found while rebuilding a standalone JPEG stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum JpegError {
    #[error("Missing JPEG Start Of Image marker in tables")]
    TablesMissingStartOfImage,

    #[error("Missing JPEG End Of Image marker in tables")]
    TablesMissingEndOfImage,

    #[error("Missing JPEG Huffman or Quantization Table marker")]
    TablesMissingTableMarker,

    #[error("Could not get JPEG Huffman / quantization tables")]
    TablesUnreadable,

    #[error("Missing JPEG Start Of Image marker in frame")]
    FrameMissingStartOfImage,

    #[error("Missing JPEG End Of Image marker in frame")]
    FrameMissingEndOfImage,

    #[error("Missing JPEG Start Of Frame marker")]
    FrameMissingStartOfFrame,
}

/// Reasons a TIFF directory is refused by the tile extractor.
///
/// Checked in declaration order; the first failing check is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Only RGB TIFF files are supported")]
    NotRgb,

    #[error("Only single-byte sampled TIFF files are supported")]
    NotSingleByteSampled,

    #[error("Only unsigned int sampled TIFF files are supported")]
    NotUnsignedSamples,

    #[error("Only contiguous planar configuration TIFF files are supported")]
    NotContiguous,

    #[error("Only RGB and YCbCr photometric interpretation TIFF files are supported")]
    UnsupportedPhotometric,

    #[error("Only top-left orientation TIFF files are supported")]
    NotTopLeft,

    #[error("Only JPEG compression TIFF files are supported")]
    NotJpeg,

    #[error("Only tiled TIFF files are supported")]
    NotTiled,

    #[error("Non-square TIFF tiles are not supported")]
    NonSquareTiles,

    #[error("Only TIFF files with separate Huffman and quantization tables are supported")]
    MissingJpegTables,
}

/// Errors that can occur when parsing TIFF files and extracting tiles
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain the structure being read
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// IFD offset points outside the file
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Requested directory index is past the end of the IFD chain
    #[error("Could not set TIFF directory to {0}")]
    DirectoryNotFound(usize),

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Field type code not known to the parser
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),

    /// Directory refused by the strict validator
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Tile coordinate lies outside the directory's image
    #[error("Tile x={x}, y={y} does not exist")]
    TileNotFound { x: u32, y: u32 },

    /// Tile number past the end of the offsets table
    #[error("Tile number out of range")]
    TileNumberOutOfRange,

    /// TileByteCounts stored with a field type other than Short, Long or Long8
    #[error("Invalid type for TileByteCounts: {0}")]
    InvalidByteCountType(u16),

    /// Tile data extends past the end of the file
    #[error("Buffer underflow when reading tile")]
    BufferUnderflow,

    /// JPEG marker failure while rebuilding a tile
    #[error(transparent)]
    Jpeg(#[from] JpegError),
}

/// Failures reported by the external conversion job runner
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// The converter ran but produced nothing servable
    #[error("Conversion produced no usable pyramid levels")]
    NoUsableLevels,

    /// The converter reported an error
    #[error("Conversion failed: {0}")]
    Failed(String),

    /// The job reference is unknown to the runner
    #[error("Unknown conversion job: {0}")]
    UnknownJob(String),
}

/// Errors surfaced by tile sources to their callers.
///
/// Every failure a host sees falls into one of these buckets; use
/// [`TileError::status_code`] to map them onto HTTP responses.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// Malformed or out-of-type request parameters
    #[error("{message}")]
    Input { message: String },

    /// Requested level or tile does not exist
    #[error("{message}")]
    ResourceAbsent { message: String },

    /// The file cannot be served by this engine
    #[error(transparent)]
    FormatValidation(ValidationError),

    /// Corrupt bytes, truncated reads or missing markers
    #[error(transparent)]
    Io(TiffError),

    /// Pixel decode or output encode failed
    #[error("Image encoding failed: {message}")]
    Encode { message: String },

    /// External conversion job failed
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl TileError {
    pub fn input(message: impl Into<String>) -> Self {
        TileError::Input {
            message: message.into(),
        }
    }

    pub fn absent(message: impl Into<String>) -> Self {
        TileError::ResourceAbsent {
            message: message.into(),
        }
    }

    pub fn encode(message: impl Into<String>) -> Self {
        TileError::Encode {
            message: message.into(),
        }
    }

    /// HTTP status a host should answer with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            TileError::Input { .. } => StatusCode::BAD_REQUEST,
            TileError::ResourceAbsent { .. } => StatusCode::NOT_FOUND,
            TileError::FormatValidation(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            TileError::Io(_) | TileError::Encode { .. } | TileError::Conversion(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<TiffError> for TileError {
    fn from(err: TiffError) -> Self {
        match err {
            TiffError::TileNotFound { .. } | TiffError::TileNumberOutOfRange => {
                TileError::absent(err.to_string())
            }
            TiffError::Io(IoError::NotFound(ref path)) => {
                TileError::absent(format!("File not found: {}", path))
            }
            TiffError::Validation(reason) => TileError::FormatValidation(reason),
            other => TileError::Io(other),
        }
    }
}

impl From<IoError> for TileError {
    fn from(err: IoError) -> Self {
        TileError::from(TiffError::Io(err))
    }
}
