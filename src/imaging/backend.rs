//! Image engine trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations every engine must
//! support: probing metadata and executing a compiled [`Pipeline`].
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), with no system
//! libraries. Everything is statically linked into the binary.

use super::params::{ImageFormat, Pipeline};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Input file is missing or of an unsupported image format: {}", .0.display())]
    UnsupportedInput(PathBuf),
    #[error("Failed to decode {}: {message}", .path.display())]
    Decode { path: PathBuf, message: String },
    #[error("{0}")]
    Geometry(String),
    #[error("Failed to encode {format}: {message}")]
    Encode {
        format: ImageFormat,
        message: String,
    },
}

impl BackendError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        BackendError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result of a metadata probe. No pixels are decoded to produce it.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    /// Bits per channel.
    pub bit_depth: u8,
    /// `"srgb"` for colour images, `"b-w"` for greyscale.
    pub color_space: &'static str,
    pub has_alpha: bool,
    /// Pixels per inch, when the container records it.
    pub density: Option<f64>,
}

/// Trait for image engines.
///
/// Implementations must be `Sync`: batch items may execute on a thread pool.
pub trait ImageBackend: Sync {
    /// Read format, dimensions and pixel layout without decoding the image.
    fn probe(&self, path: &Path) -> Result<ImageInfo, BackendError>;

    /// Decode `pipeline.source`, apply every step in order, and encode to
    /// `pipeline.destination`.
    fn execute(&self, pipeline: &Pipeline) -> Result<(), BackendError>;
}
