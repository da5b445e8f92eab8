//! Container parsing.
//!
//! - [`tiff`]: tiled JPEG TIFF directories and pyramids
//! - [`jpeg`]: rebuilding standalone JPEG tiles from TIFF payloads
//! - [`detect`]: identifying a container from its magic bytes

pub mod detect;
pub mod jpeg;
pub mod tiff;

pub use detect::{detect_format, is_tiff_header, sniff, ContainerFormat};
