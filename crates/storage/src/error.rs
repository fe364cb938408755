//! Error types for tile persistence.

use thiserror::Error;

use raster_common::RasterError;

/// Errors that can occur while writing or reading tiles.
#[derive(Error, Debug)]
pub enum StorageError {
    /// TIFF encode/decode failure.
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A GeoTIFF that decodes but cannot be interpreted as a raster tile.
    #[error("invalid raster metadata: {0}")]
    InvalidMetadata(String),

    /// A tile failed validation when reassembled.
    #[error("invalid raster tile: {0}")]
    InvalidTile(#[from] RasterError),
}

impl StorageError {
    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }
}

/// A storage failure is a data problem for the tile that needed it.
impl From<StorageError> for RasterError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidTile(inner) => inner,
            other => RasterError::data(other.to_string()),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
